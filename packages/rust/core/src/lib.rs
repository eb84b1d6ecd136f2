//! Stage implementations and orchestration for the keypearls pipeline.
//!
//! Each stage module exposes a pure function from the previous stage's
//! records to its own; [`pipeline`] wires them to the artifact store.

pub mod attribution;
pub mod classifier;
pub mod dedup;
pub mod extractor;
pub mod loader;
pub mod packager;
pub mod pipeline;
pub mod repair;
pub mod scorer;
pub mod text;

#[cfg(test)]
pub(crate) mod testutil;

pub use pipeline::{
    ProgressReporter, SilentProgress, Stage, StageContext, StageReport, StageStatus, pipeline_stats,
    run_range, run_stage,
};
