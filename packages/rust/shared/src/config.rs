//! Application configuration for keypearls.
//!
//! User config lives at `~/.keypearls/keypearls.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PearlError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "keypearls.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".keypearls";

// ---------------------------------------------------------------------------
// Config structs (matching keypearls.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub extract: ExtractConfig,

    #[serde(default)]
    pub score: ScoreConfig,

    #[serde(default)]
    pub classify: ClassifyConfig,

    #[serde(default)]
    pub dedup: DedupConfig,

    #[serde(default)]
    pub attribution: AttributionConfig,

    #[serde(default)]
    pub repair: RepairConfig,

    #[serde(default)]
    pub package: PackageConfig,

    #[serde(default)]
    pub lexicon: LexiconConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory of source documents.
    #[serde(default = "default_input_dir")]
    pub input_dir: String,

    /// Directory the stage artifacts are written to.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,

    /// Pipeline revision, used as the artifact filename suffix.
    #[serde(default = "default_revision")]
    pub revision: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            artifact_dir: default_artifact_dir(),
            revision: default_revision(),
        }
    }
}

fn default_input_dir() -> String {
    "docs".into()
}
fn default_artifact_dir() -> String {
    "var/artifacts".into()
}
fn default_revision() -> String {
    "v1".into()
}

/// `[extract]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Blocks shorter than this are never candidates.
    #[serde(default = "default_min_block_chars")]
    pub min_block_chars: usize,

    /// Delimiter used to join table cells.
    #[serde(default = "default_table_delimiter")]
    pub table_delimiter: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_block_chars: default_min_block_chars(),
            table_delimiter: default_table_delimiter(),
        }
    }
}

fn default_min_block_chars() -> usize {
    20
}
fn default_table_delimiter() -> String {
    " | ".into()
}

/// `[score]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreConfig {
    /// Post-hoc multiplier applied after weighting and bonuses.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_gotcha_bonus")]
    pub gotcha_bonus: f64,

    #[serde(default = "default_structured_bonus")]
    pub structured_bonus: f64,

    #[serde(default = "default_min_chars")]
    pub min_chars: usize,

    #[serde(default = "default_min_unique_ratio")]
    pub min_unique_ratio: f64,

    #[serde(default)]
    pub thresholds: TierThresholds,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            multiplier: default_multiplier(),
            gotcha_bonus: default_gotcha_bonus(),
            structured_bonus: default_structured_bonus(),
            min_chars: default_min_chars(),
            min_unique_ratio: default_min_unique_ratio(),
            thresholds: TierThresholds::default(),
        }
    }
}

fn default_multiplier() -> f64 {
    1.15
}
fn default_gotcha_bonus() -> f64 {
    12.0
}
fn default_structured_bonus() -> f64 {
    15.0
}
fn default_min_chars() -> usize {
    20
}
fn default_min_unique_ratio() -> f64 {
    0.4
}

/// `[score.thresholds]` — lower bounds of each tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierThresholds {
    pub excellent: f64,
    pub good: f64,
    pub acceptable: f64,
    pub marginal: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            excellent: 75.0,
            good: 60.0,
            acceptable: 45.0,
            marginal: 30.0,
        }
    }
}

/// `[classify]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Procedural fragments at or under this length are flagged for summarization.
    #[serde(default = "default_summarize_max_chars")]
    pub summarize_max_chars: usize,

    /// How far around a platform mention to look for a specific model.
    #[serde(default = "default_platform_window_chars")]
    pub platform_window_chars: usize,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            summarize_max_chars: default_summarize_max_chars(),
            platform_window_chars: default_platform_window_chars(),
        }
    }
}

fn default_summarize_max_chars() -> usize {
    80
}
fn default_platform_window_chars() -> usize {
    120
}

/// `[dedup]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Length of the normalized content prefix used as the bucket key.
    #[serde(default = "default_prefix_chars")]
    pub prefix_chars: usize,

    /// Minimum similarity ratio for two units to merge.
    #[serde(default = "default_similarity")]
    pub similarity: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            prefix_chars: default_prefix_chars(),
            similarity: default_similarity(),
        }
    }
}

fn default_prefix_chars() -> usize {
    48
}
fn default_similarity() -> f64 {
    0.85
}

/// `[attribution]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionConfig {
    /// Weighted points a make needs before it is accepted.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
        }
    }
}

fn default_min_confidence() -> f64 {
    3.0
}

/// `[repair]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Preferred maximum length of repaired content.
    #[serde(default = "default_length_ceiling")]
    pub length_ceiling: usize,

    /// Content is never extended past this to keep an identifier.
    #[serde(default = "default_hard_max")]
    pub hard_max: usize,

    #[serde(default = "default_min_words")]
    pub min_words: usize,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            length_ceiling: default_length_ceiling(),
            hard_max: default_hard_max(),
            min_words: default_min_words(),
        }
    }
}

fn default_length_ceiling() -> usize {
    450
}
fn default_hard_max() -> usize {
    650
}
fn default_min_words() -> usize {
    6
}

/// `[package]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Number of preceding sections scanned for background material.
    #[serde(default = "default_prerequisite_window")]
    pub prerequisite_window: usize,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            prerequisite_window: default_prerequisite_window(),
        }
    }
}

fn default_prerequisite_window() -> usize {
    3
}

/// `[lexicon]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LexiconConfig {
    /// Pattern library overriding the built-in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

// ---------------------------------------------------------------------------
// Stage settings (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime tunables handed to every stage.
#[derive(Debug, Clone)]
pub struct StageSettings {
    pub extract: ExtractConfig,
    pub score: ScoreConfig,
    pub classify: ClassifyConfig,
    pub dedup: DedupConfig,
    pub attribution: AttributionConfig,
    pub repair: RepairConfig,
    pub package: PackageConfig,
}

impl From<&AppConfig> for StageSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            extract: config.extract.clone(),
            score: config.score.clone(),
            classify: config.classify.clone(),
            dedup: config.dedup.clone(),
            attribution: config.attribution.clone(),
            repair: config.repair.clone(),
            package: config.package.clone(),
        }
    }
}

impl Default for StageSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.keypearls/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PearlError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.keypearls/keypearls.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PearlError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PearlError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PearlError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PearlError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PearlError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("artifact_dir"));
        assert!(toml_str.contains("similarity"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.dedup.prefix_chars, 48);
        assert_eq!(parsed.paths.revision, "v1");
        assert_eq!(parsed.score.thresholds.excellent, 75.0);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[paths]
input_dir = "/srv/corpus"

[attribution]
min_confidence = 5.0
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.paths.input_dir, "/srv/corpus");
        assert_eq!(config.paths.artifact_dir, "var/artifacts");
        assert_eq!(config.attribution.min_confidence, 5.0);
        assert_eq!(config.repair.length_ceiling, 450);
        assert!(config.lexicon.path.is_none());
    }

    #[test]
    fn stage_settings_from_app_config() {
        let mut app = AppConfig::default();
        app.dedup.similarity = 0.9;
        let settings = StageSettings::from(&app);
        assert_eq!(settings.dedup.similarity, 0.9);
        assert_eq!(settings.package.prerequisite_window, 3);
        assert_eq!(settings.extract.table_delimiter, " | ");
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("keypearls.toml");
        std::fs::write(&path, "[score]\nmultiplier = 1.0\n").expect("write");
        let config = load_config_from(&path).expect("load");
        assert_eq!(config.score.multiplier, 1.0);
        assert_eq!(config.score.gotcha_bonus, 12.0);
    }

    #[test]
    fn load_config_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[score\nmultiplier = ").expect("write");
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }
}
