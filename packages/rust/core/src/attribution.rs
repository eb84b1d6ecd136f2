//! Attributor: resolves a make (and, when possible, model and years) for
//! every canonical unit from weighted signal votes.
//!
//! Signal families, strongest first:
//! - explicit year+make tags cut from the unit text
//! - a make named in a source document's file name or title
//! - a model named there, looked up to its make
//! - make mentions in the unit's own heading and content (capped)
//!
//! A make is accepted only when it alone holds the top total and that total
//! clears `min_confidence`. Everything else is `Unresolved`; there is no
//! default make.

use std::path::Path;

use rayon::prelude::*;
use tracing::instrument;

use keypearls_lexicon::Lexicon;
use keypearls_shared::{
    Attribution, AttributionConfig, AttributionMethod, AttributionStatus, CanonicalUnit,
    SignalVote, SourceRef,
};

use crate::text;

const YEAR_MAKE_TAG_WEIGHT: f64 = 10.0;
const SOURCE_DOCUMENT_WEIGHT: f64 = 6.0;
const MODEL_LOOKUP_WEIGHT: f64 = 4.0;
const CONTENT_KEYWORD_WEIGHT: f64 = 1.0;
const CONTENT_KEYWORD_CAP: usize = 5;

const METHOD_ORDER: [AttributionMethod; 4] = [
    AttributionMethod::YearMakeTag,
    AttributionMethod::SourceDocument,
    AttributionMethod::ModelLookup,
    AttributionMethod::ContentKeywords,
];

#[instrument(skip_all, fields(units = units.len()))]
pub fn attribute_all(
    units: Vec<CanonicalUnit>,
    lexicon: &Lexicon,
    cfg: &AttributionConfig,
) -> Vec<CanonicalUnit> {
    units
        .into_par_iter()
        .map(|unit| CanonicalUnit {
            attribution: attribute(&unit, lexicon, cfg),
            ..unit
        })
        .collect()
}

pub fn attribute(unit: &CanonicalUnit, lexicon: &Lexicon, cfg: &AttributionConfig) -> Attribution {
    let signals = collect_signals(unit, lexicon);

    // Totals per make in first-vote order.
    let mut totals: Vec<(&str, f64)> = Vec::new();
    for vote in &signals {
        match totals.iter_mut().find(|(make, _)| *make == vote.make) {
            Some((_, total)) => *total += vote.weight,
            None => totals.push((vote.make.as_str(), vote.weight)),
        }
    }

    let top = totals.iter().map(|&(_, t)| t).fold(0.0, f64::max);
    let leaders: Vec<&str> = totals
        .iter()
        .filter(|&&(_, t)| t > 0.0 && (t - top).abs() < f64::EPSILON)
        .map(|&(make, _)| make)
        .collect();

    let winner = match leaders.as_slice() {
        [make] if top >= cfg.min_confidence => *make,
        _ => {
            return Attribution {
                status: AttributionStatus::Unresolved,
                confidence: top,
                signals,
                ..Attribution::default()
            };
        }
    };

    let (year_start, year_end) = years_for(unit, winner);
    Attribution {
        status: AttributionStatus::Resolved,
        make: Some(winner.to_string()),
        model: model_for(unit, winner, lexicon),
        year_start,
        year_end,
        method: dominant_method(&signals, winner),
        confidence: top,
        signals,
    }
}

/// Every weighted vote for the unit, in signal-family order.
pub fn collect_signals(unit: &CanonicalUnit, lexicon: &Lexicon) -> Vec<SignalVote> {
    let mut votes: Vec<SignalVote> = Vec::new();
    let mut push = |make: &str, method: AttributionMethod, weight: f64| {
        votes.push(SignalVote {
            make: make.to_string(),
            method,
            weight,
        });
    };

    let mut tagged: Vec<&str> = Vec::new();
    for (_, make) in vehicle_tags(&unit.tags, lexicon) {
        if !tagged.contains(&make) {
            tagged.push(make);
            push(make, AttributionMethod::YearMakeTag, YEAR_MAKE_TAG_WEIGHT);
        }
    }

    let mut seen_docs: Vec<&str> = Vec::new();
    for source in &unit.sources {
        if seen_docs.contains(&source.doc_id.as_str()) {
            continue;
        }
        seen_docs.push(&source.doc_id);

        let naming = source_naming(source);
        for (make, _) in lexicon.make_counts(&naming) {
            push(make, AttributionMethod::SourceDocument, SOURCE_DOCUMENT_WEIGHT);
        }
        let mut model_makes: Vec<&str> = Vec::new();
        for (make, _) in lexicon.models_in(&naming) {
            if !model_makes.contains(&make) {
                model_makes.push(make);
                push(make, AttributionMethod::ModelLookup, MODEL_LOOKUP_WEIGHT);
            }
        }
    }

    for (make, count) in lexicon.make_counts(&unit_scope(unit)) {
        let hits = count.min(CONTENT_KEYWORD_CAP) as f64;
        push(make, AttributionMethod::ContentKeywords, hits * CONTENT_KEYWORD_WEIGHT);
    }

    votes
}

/// File stem (underscores as spaces) plus title of a source document.
fn source_naming(source: &SourceRef) -> String {
    let stem = Path::new(&source.source_path)
        .file_stem()
        .map(|s| s.to_string_lossy().replace('_', " "))
        .unwrap_or_default();
    format!("{stem} {}", source.source_title)
}

fn unit_scope(unit: &CanonicalUnit) -> String {
    match &unit.heading {
        Some(h) => format!("{h}\n{}", unit.content),
        None => unit.content.clone(),
    }
}

/// `(year, canonical make)` from `vehicle:<year>:<make-slug>` tags.
fn vehicle_tags<'l>(tags: &[String], lexicon: &'l Lexicon) -> Vec<(u16, &'l str)> {
    tags.iter()
        .filter_map(|tag| {
            let (year, slug) = tag.strip_prefix("vehicle:")?.split_once(':')?;
            let year: u16 = year.parse().ok()?;
            let make = lexicon
                .makes()
                .iter()
                .find(|m| text::slugify(&m.name) == slug)?;
            Some((year, make.name.as_str()))
        })
        .collect()
}

fn dominant_method(signals: &[SignalVote], make: &str) -> Option<AttributionMethod> {
    let mut best: Option<(AttributionMethod, f64)> = None;
    for method in METHOD_ORDER {
        let sum: f64 = signals
            .iter()
            .filter(|v| v.make == make && v.method == method)
            .map(|v| v.weight)
            .sum();
        if sum > 0.0 && best.is_none_or(|(_, b)| sum > b) {
            best = Some((method, sum));
        }
    }
    best.map(|(method, _)| method)
}

/// First model of `make` named in the unit, then in its source documents,
/// then in the loader's hints.
fn model_for(unit: &CanonicalUnit, make: &str, lexicon: &Lexicon) -> Option<String> {
    let of_make = |text: &str| -> Option<String> {
        lexicon
            .models_in(text)
            .into_iter()
            .find(|&(mk, _)| mk == make)
            .map(|(_, model)| model.to_string())
    };

    of_make(&unit_scope(unit))
        .or_else(|| unit.sources.iter().find_map(|s| of_make(&source_naming(s))))
        .or_else(|| {
            unit.sources
                .iter()
                .filter(|s| s.vehicle.make.as_deref() == Some(make))
                .find_map(|s| s.vehicle.model.clone())
        })
}

/// Span of the tagged years for `make`, else the first matching source hint.
fn years_for(unit: &CanonicalUnit, make: &str) -> (Option<u16>, Option<u16>) {
    let years: Vec<u16> = unit
        .tags
        .iter()
        .filter_map(|tag| {
            let (year, slug) = tag.strip_prefix("vehicle:")?.split_once(':')?;
            (slug == text::slugify(make)).then(|| year.parse().ok())?
        })
        .collect();
    if let (Some(&start), Some(&end)) = (years.iter().min(), years.iter().max()) {
        return (Some(start), Some(end));
    }

    unit.sources
        .iter()
        .map(|s| &s.vehicle)
        .find(|v| v.make.as_deref() == Some(make) && v.year_start.is_some())
        .map_or((None, None), |v| (v.year_start, v.year_end))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
