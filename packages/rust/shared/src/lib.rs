//! Shared types, error model, and configuration for keypearls.
//!
//! This crate is the foundation depended on by all other keypearls crates.
//! It provides:
//! - [`PearlError`] — the unified error type
//! - One record type per pipeline stage ([`Document`], [`CandidateUnit`],
//!   [`ScoredUnit`], [`ClassifiedUnit`], [`CanonicalUnit`], [`ProcedurePackage`])
//! - Configuration ([`AppConfig`], [`StageSettings`], config loading)

pub mod config;
pub mod document;
pub mod error;
pub mod package;
pub mod types;
pub mod units;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AttributionConfig, ClassifyConfig, DedupConfig, ExtractConfig, LexiconConfig,
    PackageConfig, PathsConfig, RepairConfig, ScoreConfig, StageSettings, TierThresholds,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use document::{Block, Document, Section};
pub use error::{PearlError, Result};
pub use package::{Prerequisite, ProcedurePackage, ProcedureStep, SectionRef};
pub use types::{
    AttributionMethod, BlockKind, CURRENT_SCHEMA_VERSION, Category, Scenario, SemanticType, Tier,
    VehicleHint, YearSource,
};
pub use units::{
    Attribution, AttributionStatus, CandidateUnit, CanonicalUnit, ClassifiedUnit, RejectReason,
    RepairAction, RepairNote, ScoreFlags, ScoredUnit, SignalVote, SourceRef, SubScores,
    TruncationKind,
};
