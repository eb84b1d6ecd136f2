//! Versioned inter-stage artifacts.
//!
//! Every stage writes one JSON file, `<stage>_<revision>.json`, holding an
//! envelope (schema version, stage, revision, run id, timestamp, checksum,
//! summary) around the record list. Writes replace the previous file
//! atomically; reads are strict about the envelope and lenient about
//! individual records, which are skipped with a warning when malformed.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use keypearls_shared::{CURRENT_SCHEMA_VERSION, PearlError, Result};

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Operator-facing counts for one stage run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub input: usize,
    pub output: usize,
    #[serde(default)]
    pub discarded: usize,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_category: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_tier: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_semantic_type: BTreeMap<String, usize>,
    /// Units whose vehicle attribution stayed unresolved.
    #[serde(default)]
    pub unresolved: usize,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_scenario: BTreeMap<String, usize>,
}

impl StageSummary {
    pub fn new(input: usize, output: usize) -> Self {
        Self {
            input,
            output,
            ..Self::default()
        }
    }

    pub fn count_category(&mut self, key: impl fmt::Display) {
        bump(&mut self.by_category, key);
    }

    pub fn count_tier(&mut self, key: impl fmt::Display) {
        bump(&mut self.by_tier, key);
    }

    pub fn count_semantic_type(&mut self, key: impl fmt::Display) {
        bump(&mut self.by_semantic_type, key);
    }

    pub fn count_scenario(&mut self, key: impl fmt::Display) {
        bump(&mut self.by_scenario, key);
    }
}

fn bump(map: &mut BTreeMap<String, usize>, key: impl fmt::Display) {
    *map.entry(key.to_string()).or_default() += 1;
}

impl fmt::Display for StageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in {} -> out {}", self.input, self.output)?;
        if self.discarded > 0 {
            write!(f, ", discarded {}", self.discarded)?;
        }
        if self.unresolved > 0 {
            write!(f, ", unresolved {}", self.unresolved)?;
        }
        for (label, map) in [
            ("category", &self.by_category),
            ("tier", &self.by_tier),
            ("type", &self.by_semantic_type),
            ("scenario", &self.by_scenario),
        ] {
            if map.is_empty() {
                continue;
            }
            let parts: Vec<String> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, " | {label}: {}", parts.join(" "))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Everything in an artifact except its records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub schema_version: u32,
    pub stage: String,
    pub revision: String,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// SHA-256 of the serialized record list.
    pub checksum: String,
    pub summary: StageSummary,
}

#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    #[serde(flatten)]
    header: &'a ArtifactHeader,
    records: &'a [T],
}

#[derive(Deserialize)]
struct EnvelopeIn {
    #[serde(flatten)]
    header: ArtifactHeader,
    records: Vec<serde_json::Value>,
}

/// Records read back from an artifact.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub header: ArtifactHeader,
    pub records: Vec<T>,
    /// Records that failed to deserialize and were skipped.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<dir>/<stage>_<revision>.json`
pub fn artifact_path(dir: &Path, stage: &str, revision: &str) -> PathBuf {
    dir.join(format!("{stage}_{revision}.json"))
}

/// Revisions become part of a file name, so only `[A-Za-z0-9._-]` is allowed.
pub fn validate_revision(revision: &str) -> Result<()> {
    let ok = !revision.is_empty()
        && !revision.starts_with('.')
        && revision
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if ok {
        Ok(())
    } else {
        Err(PearlError::validation(format!(
            "revision {revision:?} must be non-empty and use only letters, digits, '.', '_' or '-'"
        )))
    }
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Write a stage artifact, replacing any previous one atomically.
#[instrument(skip_all, fields(stage = %stage, revision = %revision, records = records.len()))]
pub fn write_artifact<T: Serialize>(
    dir: &Path,
    stage: &str,
    revision: &str,
    summary: StageSummary,
    records: &[T],
) -> Result<ArtifactHeader> {
    validate_revision(revision)?;
    std::fs::create_dir_all(dir).map_err(|e| PearlError::io(dir, e))?;

    let record_bytes = serde_json::to_vec(records)
        .map_err(|e| PearlError::Artifact(format!("{stage}: record serialization failed: {e}")))?;

    let header = ArtifactHeader {
        schema_version: CURRENT_SCHEMA_VERSION,
        stage: stage.to_string(),
        revision: revision.to_string(),
        run_id: Uuid::now_v7(),
        generated_at: Utc::now(),
        checksum: sha256_hex(&record_bytes),
        summary,
    };

    let json = serde_json::to_string_pretty(&EnvelopeOut {
        header: &header,
        records,
    })
    .map_err(|e| PearlError::Artifact(format!("{stage}: serialization failed: {e}")))?;

    let target = artifact_path(dir, stage, revision);
    let temp = dir.join(format!(".{stage}_{revision}.json.tmp"));

    // Write to temp file first, then rename over the target.
    std::fs::write(&temp, json.as_bytes()).map_err(|e| PearlError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| PearlError::io(&target, e))?;

    info!(
        path = %target.display(),
        records = records.len(),
        checksum = %&header.checksum[..12],
        "wrote artifact"
    );

    Ok(header)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// Read a stage artifact.
///
/// Fails when the file is missing, is not an envelope, names another stage,
/// or carries an unsupported schema version. Malformed records are skipped.
#[instrument(skip_all, fields(stage = %stage, revision = %revision))]
pub fn read_artifact<T: DeserializeOwned>(
    dir: &Path,
    stage: &str,
    revision: &str,
) -> Result<Loaded<T>> {
    let path = artifact_path(dir, stage, revision);
    let content = std::fs::read_to_string(&path).map_err(|e| PearlError::io(&path, e))?;

    let envelope: EnvelopeIn = serde_json::from_str(&content).map_err(|e| {
        PearlError::Artifact(format!("{} is not a valid artifact: {e}", path.display()))
    })?;
    check_header(&envelope.header, stage, &path)?;

    let mut records = Vec::with_capacity(envelope.records.len());
    let mut skipped = 0;
    for (index, value) in envelope.records.into_iter().enumerate() {
        match serde_json::from_value::<T>(value) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                warn!(path = %path.display(), index, error = %e, "skipping malformed record");
            }
        }
    }

    debug!(records = records.len(), skipped, "read artifact");

    Ok(Loaded {
        header: envelope.header,
        records,
        skipped,
    })
}

/// Read only the envelope header of an artifact.
pub fn read_header(dir: &Path, stage: &str, revision: &str) -> Result<ArtifactHeader> {
    let path = artifact_path(dir, stage, revision);
    let content = std::fs::read_to_string(&path).map_err(|e| PearlError::io(&path, e))?;
    let header: ArtifactHeader = serde_json::from_str(&content).map_err(|e| {
        PearlError::Artifact(format!("{} is not a valid artifact: {e}", path.display()))
    })?;
    check_header(&header, stage, &path)?;
    Ok(header)
}

fn check_header(header: &ArtifactHeader, stage: &str, path: &Path) -> Result<()> {
    if header.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(PearlError::validation(format!(
            "{}: schema_version {} not supported (expected {CURRENT_SCHEMA_VERSION})",
            path.display(),
            header.schema_version
        )));
    }
    if header.stage != stage {
        return Err(PearlError::Artifact(format!(
            "{}: expected stage {stage}, found {}",
            path.display(),
            header.stage
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
