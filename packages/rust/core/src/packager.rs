//! Procedure packager.
//!
//! Turns procedural sections into ordered, scenario-tagged packages:
//! 1. Index repaired units by the `(document, section)` pairs they were cut from
//! 2. For every section under a procedural heading, collect its procedure
//!    steps, verbatim warnings, tools, and background prerequisites
//! 3. Merge drafts that share `(make, model, scenario)`, renumbering steps
//!
//! Step 2 runs per document in parallel; step 3 is a single sequential pass
//! in document order.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, instrument};

use keypearls_lexicon::Lexicon;
use keypearls_shared::{
    AttributionStatus, CanonicalUnit, Document, PackageConfig, Prerequisite, ProcedurePackage,
    ProcedureStep, Scenario, Section, SectionRef, SemanticType,
};

use crate::text;

/// A unit as it appears inside one source section.
#[derive(Debug, Clone, Copy)]
struct Placement<'a> {
    unit: &'a CanonicalUnit,
    ordinal: usize,
    step_number: Option<u32>,
}

type SectionIndex<'a> = HashMap<(&'a str, usize), Vec<Placement<'a>>>;

#[derive(Debug, Default, PartialEq)]
struct VehicleScope {
    make: Option<String>,
    model: Option<String>,
    year_start: Option<u16>,
    year_end: Option<u16>,
}

/// Build procedure packages from loaded documents and repaired units.
#[instrument(skip_all, fields(documents = docs.len(), units = units.len()))]
pub fn build_packages(
    docs: &[Document],
    units: &[CanonicalUnit],
    lexicon: &Lexicon,
    cfg: &PackageConfig,
) -> Vec<ProcedurePackage> {
    let index = index_by_section(units);

    let drafts: Vec<ProcedurePackage> = docs
        .par_iter()
        .flat_map_iter(|doc| package_document(doc, &index, lexicon, cfg))
        .collect();

    let draft_count = drafts.len();
    let packages = merge_packages(drafts);
    debug!(drafts = draft_count, packages = packages.len(), "packages merged");
    packages
}

fn index_by_section(units: &[CanonicalUnit]) -> SectionIndex<'_> {
    let mut index: SectionIndex<'_> = HashMap::new();
    for unit in units {
        for (_, source) in unit.members() {
            let placed = index
                .entry((source.doc_id.as_str(), source.section_index))
                .or_default();
            // Near-duplicates inside one section collapse to a single step.
            if placed.iter().any(|p| p.unit.id == unit.id) {
                continue;
            }
            placed.push(Placement {
                unit,
                ordinal: source.block_ordinal,
                step_number: source.step_number,
            });
        }
    }
    index
}

fn package_document(
    doc: &Document,
    index: &SectionIndex<'_>,
    lexicon: &Lexicon,
    cfg: &PackageConfig,
) -> Vec<ProcedurePackage> {
    let mut out = Vec::new();

    for section in &doc.sections {
        let Some(heading) = section.heading.as_deref() else {
            continue;
        };
        if !lexicon.is_procedural_heading(heading) {
            continue;
        }

        let placements = index
            .get(&(doc.id.as_str(), section.index))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let steps = ordered_steps(placements);
        if steps.is_empty() {
            debug!(doc = %doc.id, section = section.index, "procedural section has no usable steps");
            continue;
        }

        let scenario = lexicon
            .scenario_for(heading)
            .or_else(|| lexicon.scenario_for(&doc.section_text(section.index)))
            .unwrap_or(Scenario::Generic);
        let vehicle = vehicle_scope(doc, &steps);

        let steps: Vec<ProcedureStep> = steps
            .iter()
            .enumerate()
            .map(|(i, p)| ProcedureStep {
                order: i as u32 + 1,
                unit_id: p.unit.id.clone(),
                content: p.unit.content.clone(),
                step_number: p.step_number,
                tools: lexicon
                    .tools_in(&p.unit.content)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                doc_id: doc.id.clone(),
                section_index: section.index,
            })
            .collect();

        let mut tools: Vec<String> = Vec::new();
        for tool in steps.iter().flat_map(|s| &s.tools) {
            if !tools.contains(tool) {
                tools.push(tool.clone());
            }
        }

        let mut warnings: Vec<&Placement<'_>> = placements
            .iter()
            .filter(|p| p.unit.semantic_type == SemanticType::Warning && !p.unit.tier.is_discard())
            .collect();
        warnings.sort_by_key(|p| p.ordinal);

        let mut id = package_id(vehicle.make.as_deref(), vehicle.model.as_deref(), scenario);
        if vehicle.make.is_none() && vehicle.model.is_none() {
            id = format!("{id}-{}", text::slugify(&doc.id));
        }

        out.push(ProcedurePackage {
            id,
            scenario,
            make: vehicle.make,
            model: vehicle.model,
            year_start: vehicle.year_start,
            year_end: vehicle.year_end,
            title: heading.to_string(),
            steps,
            prerequisites: prerequisites_for(doc, section, cfg.prerequisite_window, lexicon),
            warnings: warnings.iter().map(|p| p.unit.content.clone()).collect(),
            tools,
            sections: vec![SectionRef {
                doc_id: doc.id.clone(),
                section_index: section.index,
                heading: heading.to_string(),
            }],
        });
    }
    out
}

/// Procedure units in step order.
///
/// A numbered list item is a step whatever its tier; an unnumbered unit needs
/// a non-discard tier. Steps follow their list numbers when every step has
/// one, otherwise source order.
fn ordered_steps<'a>(placements: &[Placement<'a>]) -> Vec<Placement<'a>> {
    let mut steps: Vec<Placement<'a>> = placements
        .iter()
        .copied()
        .filter(|p| p.unit.semantic_type == SemanticType::Procedure)
        .filter(|p| p.step_number.is_some() || !p.unit.tier.is_discard())
        .collect();
    if steps.iter().all(|p| p.step_number.is_some()) {
        steps.sort_by_key(|p| (p.step_number, p.ordinal));
    } else {
        steps.sort_by_key(|p| p.ordinal);
    }
    steps
}

/// Background sections among the `window` sections before `section`.
fn prerequisites_for(
    doc: &Document,
    section: &Section,
    window: usize,
    lexicon: &Lexicon,
) -> Vec<Prerequisite> {
    let from = section.index.saturating_sub(window);
    doc.sections
        .iter()
        .filter(|s| s.index >= from && s.index < section.index)
        .filter_map(|s| {
            let heading = s.heading.as_deref()?;
            if !lexicon.is_background_heading(heading) {
                return None;
            }
            let text = doc.section_text(s.index);
            (!text.is_empty()).then(|| Prerequisite {
                doc_id: doc.id.clone(),
                heading: heading.to_string(),
                text,
            })
        })
        .collect()
}

/// Majority make/model of the resolved steps, falling back to the
/// document's own hint.
fn vehicle_scope(doc: &Document, steps: &[Placement<'_>]) -> VehicleScope {
    let resolved: Vec<_> = steps
        .iter()
        .map(|p| &p.unit.attribution)
        .filter(|a| a.status == AttributionStatus::Resolved)
        .collect();

    let make = majority(resolved.iter().filter_map(|a| a.make.as_deref()))
        .map(str::to_string)
        .or_else(|| doc.vehicle.make.clone());
    let same_make: Vec<_> = resolved
        .iter()
        .filter(|a| a.make.is_some() && a.make == make)
        .collect();
    let hint_matches = doc.vehicle.make.is_none() || doc.vehicle.make == make;

    let model = majority(same_make.iter().filter_map(|a| a.model.as_deref()))
        .map(str::to_string)
        .or_else(|| hint_matches.then(|| doc.vehicle.model.clone()).flatten());

    let (year_start, year_end) = if hint_matches && doc.vehicle.year_start.is_some() {
        (doc.vehicle.year_start, doc.vehicle.year_end)
    } else {
        (
            same_make.iter().filter_map(|a| a.year_start).min(),
            same_make.iter().filter_map(|a| a.year_end).max(),
        )
    };

    VehicleScope {
        make,
        model,
        year_start,
        year_end,
    }
}

/// Most frequent value; ties go to the value seen first.
fn majority<'a>(values: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, n) in counts {
        if best.is_none_or(|(_, b)| n > b) {
            best = Some((value, n));
        }
    }
    best.map(|(value, _)| value)
}

pub fn package_id(make: Option<&str>, model: Option<&str>, scenario: Scenario) -> String {
    let key = format!(
        "{}-{}-{}",
        make.unwrap_or("unknown"),
        model.unwrap_or("any"),
        scenario.as_str()
    );
    format!("pkg-{}", text::slugify(&key))
}

/// Fold drafts sharing `(make, model, scenario)` into the first one.
fn merge_packages(drafts: Vec<ProcedurePackage>) -> Vec<ProcedurePackage> {
    let mut merged: Vec<ProcedurePackage> = Vec::new();
    for draft in drafts {
        let existing = merged.iter_mut().find(|p| same_key(p, &draft));
        match existing {
            Some(package) => absorb(package, draft),
            None => merged.push(draft),
        }
    }
    merged
}

/// Equal `(make, model, scenario)`. Drafts with no vehicle at all only
/// match drafts from the same document.
fn same_key(a: &ProcedurePackage, b: &ProcedurePackage) -> bool {
    if a.make != b.make || a.model != b.model || a.scenario != b.scenario {
        return false;
    }
    if a.make.is_some() || a.model.is_some() {
        return true;
    }
    a.sections.first().map(|s| &s.doc_id) == b.sections.first().map(|s| &s.doc_id)
}

fn absorb(package: &mut ProcedurePackage, draft: ProcedurePackage) {
    for step in draft.steps {
        if package.steps.iter().any(|s| s.unit_id == step.unit_id) {
            continue;
        }
        package.steps.push(ProcedureStep {
            order: package.steps.len() as u32 + 1,
            ..step
        });
    }
    for prerequisite in draft.prerequisites {
        if !package.prerequisites.contains(&prerequisite) {
            package.prerequisites.push(prerequisite);
        }
    }
    for warning in draft.warnings {
        if !package.warnings.contains(&warning) {
            package.warnings.push(warning);
        }
    }
    for tool in draft.tools {
        if !package.tools.contains(&tool) {
            package.tools.push(tool);
        }
    }
    package.sections.extend(draft.sections);
    package.year_start = min_some(package.year_start, draft.year_start);
    package.year_end = package.year_end.max(draft.year_end);
}

fn min_some(a: Option<u16>, b: Option<u16>) -> Option<u16> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
