//! Pipeline driver: runs stages against the artifact store.
//!
//! Every stage reads the artifact(s) of the stage(s) before it, runs its
//! transform, and replaces its own artifact wholesale:
//!
//! ```text
//! load → extract → score → classify → dedup → attribute → repair → package
//! ```
//!
//! The packager additionally reads the `documents` artifact for section
//! structure.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, instrument};

use keypearls_artifacts::{
    ArtifactHeader, Loaded, StageSummary, artifact_path, read_artifact, read_header,
    validate_revision, write_artifact,
};
use keypearls_lexicon::Lexicon;
use keypearls_shared::{
    AppConfig, AttributionStatus, CandidateUnit, CanonicalUnit, ClassifiedUnit, Document,
    PearlError, ProcedurePackage, Result, ScoredUnit, StageSettings, Tier,
};

use crate::{attribution, classifier, dedup, extractor, loader, packager, repair, scorer};

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Extract,
    Score,
    Classify,
    Dedup,
    Attribute,
    Repair,
    Package,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 8] = [
        Stage::Load,
        Stage::Extract,
        Stage::Score,
        Stage::Classify,
        Stage::Dedup,
        Stage::Attribute,
        Stage::Repair,
        Stage::Package,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Extract => "extract",
            Self::Score => "score",
            Self::Classify => "classify",
            Self::Dedup => "dedup",
            Self::Attribute => "attribute",
            Self::Repair => "repair",
            Self::Package => "package",
        }
    }

    /// Stage name used in the artifact file name.
    pub fn artifact(self) -> &'static str {
        match self {
            Self::Load => "documents",
            Self::Extract => "candidates",
            Self::Score => "scored",
            Self::Classify => "classified",
            Self::Dedup => "canonical",
            Self::Attribute => "attributed",
            Self::Repair => "repaired",
            Self::Package => "packages",
        }
    }

    /// Stages whose artifacts this stage reads.
    pub fn inputs(self) -> &'static [Stage] {
        match self {
            Self::Load => &[],
            Self::Extract => &[Self::Load],
            Self::Score => &[Self::Extract],
            Self::Classify => &[Self::Score],
            Self::Dedup => &[Self::Classify],
            Self::Attribute => &[Self::Dedup],
            Self::Repair => &[Self::Attribute],
            Self::Package => &[Self::Load, Self::Repair],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = PearlError;

    /// Accepts a stage name (`dedup`) or its artifact name (`canonical`).
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == wanted || stage.artifact() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Stage::ALL.iter().map(|s| s.name()).collect();
                PearlError::validation(format!(
                    "unknown stage {s:?} (expected one of: {})",
                    names.join(", ")
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Context and reports
// ---------------------------------------------------------------------------

/// Everything a stage run needs: locations, tunables, and the compiled lexicon.
#[derive(Debug)]
pub struct StageContext {
    pub input_dir: PathBuf,
    pub artifact_dir: PathBuf,
    pub revision: String,
    pub settings: StageSettings,
    pub lexicon: Lexicon,
}

impl StageContext {
    /// Build a context from configuration, compiling the configured lexicon.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let lexicon = Lexicon::resolve(&config.lexicon)?;
        Self::with_lexicon(config, lexicon)
    }

    pub fn with_lexicon(config: &AppConfig, lexicon: Lexicon) -> Result<Self> {
        validate_revision(&config.paths.revision)?;
        Ok(Self {
            input_dir: PathBuf::from(&config.paths.input_dir),
            artifact_dir: PathBuf::from(&config.paths.artifact_dir),
            revision: config.paths.revision.clone(),
            settings: StageSettings::from(config),
            lexicon,
        })
    }

    /// Path of a stage's artifact for this revision.
    pub fn artifact_path(&self, stage: Stage) -> PathBuf {
        artifact_path(&self.artifact_dir, stage.artifact(), &self.revision)
    }

    fn read<T: DeserializeOwned>(&self, stage: Stage) -> Result<Loaded<T>> {
        read_artifact(&self.artifact_dir, stage.artifact(), &self.revision)
    }

    fn write<T: Serialize>(
        &self,
        stage: Stage,
        summary: StageSummary,
        records: &[T],
    ) -> Result<ArtifactHeader> {
        write_artifact(&self.artifact_dir, stage.artifact(), &self.revision, summary, records)
    }
}

/// Outcome of one stage run.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub summary: StageSummary,
    /// Artifact written.
    pub path: PathBuf,
    /// Input records that failed to deserialize and were skipped.
    pub skipped: usize,
    pub elapsed: Duration,
}

/// A stage and the header of its current artifact, if any.
#[derive(Debug, Clone, Serialize)]
pub struct StageStatus {
    pub stage: Stage,
    pub path: PathBuf,
    pub header: Option<ArtifactHeader>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a stage starts.
    fn phase(&self, stage: Stage);
    /// Called after a stage wrote its artifact.
    fn stage_done(&self, report: &StageReport);
    /// Called once the requested range completed.
    fn done(&self, reports: &[StageReport]);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _stage: Stage) {}
    fn stage_done(&self, _report: &StageReport) {}
    fn done(&self, _reports: &[StageReport]) {}
}

// ---------------------------------------------------------------------------
// Running
// ---------------------------------------------------------------------------

/// Run every stage from `from` through `to`, inclusive.
pub fn run_range(
    from: Stage,
    to: Stage,
    ctx: &StageContext,
    progress: &dyn ProgressReporter,
) -> Result<Vec<StageReport>> {
    if from > to {
        return Err(PearlError::validation(format!(
            "stage range is backwards: {from} comes after {to}"
        )));
    }

    let started = Instant::now();
    let mut reports = Vec::new();
    for stage in Stage::ALL.into_iter().filter(|s| (from..=to).contains(s)) {
        progress.phase(stage);
        let report = run_stage(stage, ctx)?;
        progress.stage_done(&report);
        reports.push(report);
    }
    progress.done(&reports);

    info!(
        from = %from,
        to = %to,
        stages = reports.len(),
        elapsed_ms = started.elapsed().as_millis(),
        "pipeline range complete"
    );
    Ok(reports)
}

/// Run a single stage: read its inputs, transform, write its artifact.
#[instrument(skip_all, fields(stage = %stage, revision = %ctx.revision))]
pub fn run_stage(stage: Stage, ctx: &StageContext) -> Result<StageReport> {
    let started = Instant::now();

    let (summary, skipped) = match stage {
        Stage::Load => run_load(ctx)?,
        Stage::Extract => run_extract(ctx)?,
        Stage::Score => run_score(ctx)?,
        Stage::Classify => run_classify(ctx)?,
        Stage::Dedup => run_dedup(ctx)?,
        Stage::Attribute => run_attribute(ctx)?,
        Stage::Repair => run_repair(ctx)?,
        Stage::Package => run_package(ctx)?,
    };

    let report = StageReport {
        stage,
        path: ctx.artifact_path(stage),
        skipped,
        elapsed: started.elapsed(),
        summary,
    };

    info!(
        input = report.summary.input,
        output = report.summary.output,
        discarded = report.summary.discarded,
        skipped = report.skipped,
        elapsed_ms = report.elapsed.as_millis(),
        "stage complete"
    );
    Ok(report)
}

type StageOutcome = Result<(StageSummary, usize)>;

fn run_load(ctx: &StageContext) -> StageOutcome {
    let outcome = loader::load_corpus(&ctx.input_dir, &ctx.lexicon, &ctx.settings.extract)?;

    let mut summary = StageSummary::new(outcome.discovered, outcome.documents.len());
    summary.discarded = outcome.discovered - outcome.documents.len();
    ctx.write(Stage::Load, summary.clone(), &outcome.documents)?;
    Ok((summary, 0))
}

fn run_extract(ctx: &StageContext) -> StageOutcome {
    let docs = ctx.read::<Document>(Stage::Load)?;
    let candidates = extractor::extract_all(&docs.records, &ctx.lexicon, &ctx.settings.extract);

    let mut summary = StageSummary::new(docs.records.len(), candidates.len());
    for c in &candidates {
        summary.count_category(c.category);
    }
    ctx.write(Stage::Extract, summary.clone(), &candidates)?;
    Ok((summary, docs.skipped))
}

fn run_score(ctx: &StageContext) -> StageOutcome {
    let candidates = ctx.read::<CandidateUnit>(Stage::Extract)?;
    let input = candidates.records.len();
    let scored = scorer::score_all(candidates.records, &ctx.lexicon, &ctx.settings);

    let mut summary = StageSummary::new(input, scored.len());
    for unit in &scored {
        summary.count_category(unit.candidate.category);
        tally_tier(&mut summary, unit.tier);
    }
    ctx.write(Stage::Score, summary.clone(), &scored)?;
    Ok((summary, candidates.skipped))
}

fn run_classify(ctx: &StageContext) -> StageOutcome {
    let scored = ctx.read::<ScoredUnit>(Stage::Score)?;
    let input = scored.records.len();
    let classified = classifier::classify_all(scored.records, &ctx.lexicon, &ctx.settings.classify);

    let mut summary = StageSummary::new(input, classified.len());
    for unit in &classified {
        summary.count_semantic_type(unit.semantic_type);
        tally_tier(&mut summary, unit.scored.tier);
    }
    ctx.write(Stage::Classify, summary.clone(), &classified)?;
    Ok((summary, scored.skipped))
}

fn run_dedup(ctx: &StageContext) -> StageOutcome {
    let classified = ctx.read::<ClassifiedUnit>(Stage::Classify)?;
    let input = classified.records.len();
    let canonical = dedup::deduplicate(classified.records, &ctx.settings.dedup);

    let summary = canonical_summary(input, &canonical);
    ctx.write(Stage::Dedup, summary.clone(), &canonical)?;
    Ok((summary, classified.skipped))
}

fn run_attribute(ctx: &StageContext) -> StageOutcome {
    let canonical = ctx.read::<CanonicalUnit>(Stage::Dedup)?;
    let input = canonical.records.len();
    let attributed =
        attribution::attribute_all(canonical.records, &ctx.lexicon, &ctx.settings.attribution);

    let summary = canonical_summary(input, &attributed);
    ctx.write(Stage::Attribute, summary.clone(), &attributed)?;
    Ok((summary, canonical.skipped))
}

fn run_repair(ctx: &StageContext) -> StageOutcome {
    let attributed = ctx.read::<CanonicalUnit>(Stage::Attribute)?;
    let input = attributed.records.len();
    let repaired = repair::repair_all(attributed.records, &ctx.lexicon, &ctx.settings.repair);

    let summary = canonical_summary(input, &repaired);
    ctx.write(Stage::Repair, summary.clone(), &repaired)?;
    Ok((summary, attributed.skipped))
}

fn run_package(ctx: &StageContext) -> StageOutcome {
    let docs = ctx.read::<Document>(Stage::Load)?;
    let repaired = ctx.read::<CanonicalUnit>(Stage::Repair)?;
    let packages: Vec<ProcedurePackage> = packager::build_packages(
        &docs.records,
        &repaired.records,
        &ctx.lexicon,
        &ctx.settings.package,
    );

    let mut summary = StageSummary::new(repaired.records.len(), packages.len());
    for package in &packages {
        summary.count_scenario(package.scenario);
    }
    ctx.write(Stage::Package, summary.clone(), &packages)?;
    Ok((summary, docs.skipped + repaired.skipped))
}

fn tally_tier(summary: &mut StageSummary, tier: Tier) {
    summary.count_tier(tier);
    if tier.is_discard() {
        summary.discarded += 1;
    }
}

fn canonical_summary(input: usize, units: &[CanonicalUnit]) -> StageSummary {
    let mut summary = StageSummary::new(input, units.len());
    for unit in units {
        summary.count_category(unit.category);
        summary.count_semantic_type(unit.semantic_type);
        tally_tier(&mut summary, unit.tier);
        if unit.attribution.status == AttributionStatus::Unresolved {
            summary.unresolved += 1;
        }
    }
    summary
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Header of every stage's current artifact; `None` where none was written.
pub fn pipeline_stats(ctx: &StageContext) -> Result<Vec<StageStatus>> {
    Stage::ALL
        .into_iter()
        .map(|stage| {
            let path = ctx.artifact_path(stage);
            let header = if path.is_file() {
                Some(read_header(&ctx.artifact_dir, stage.artifact(), &ctx.revision)?)
            } else {
                None
            };
            Ok(StageStatus {
                stage,
                path,
                header,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
