//! On-disk shape of the pattern library (`lexicon.toml`).
//!
//! These structs mirror the TOML one-to-one and carry raw pattern strings;
//! [`crate::Lexicon::compile`] turns them into matchers.

use serde::{Deserialize, Serialize};

use keypearls_shared::{Category, Scenario, SemanticType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconSpec {
    pub categories: Vec<CategorySpec>,

    #[serde(default)]
    pub extract: ExtractSpec,

    pub scoring: ScoringSpec,

    pub semantic_types: Vec<SemanticTypeSpec>,

    pub sections: SectionsSpec,

    #[serde(default)]
    pub makes: Vec<MakeSpec>,

    #[serde(default)]
    pub vehicles: VehiclesSpec,

    #[serde(default)]
    pub procedures: ProceduresSpec,

    #[serde(default)]
    pub repair: RepairSpec,
}

/// A regex with a weight. Case-insensitive unless `case_sensitive` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSpec {
    pub pattern: String,

    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default)]
    pub case_sensitive: bool,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpec {
    pub category: Category,
    pub patterns: Vec<PatternSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractSpec {
    #[serde(default)]
    pub table_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSpec {
    pub bare_list_marker: String,

    #[serde(default)]
    pub citation_only: Vec<String>,

    #[serde(default)]
    pub gotcha: Vec<String>,

    #[serde(default)]
    pub actionability: Vec<PatternSpec>,

    #[serde(default)]
    pub specificity: Vec<PatternSpec>,

    #[serde(default)]
    pub clarity: Vec<PatternSpec>,

    #[serde(default)]
    pub completeness: Vec<PatternSpec>,

    #[serde(default)]
    pub decision_value: Vec<PatternSpec>,

    #[serde(default)]
    pub shape: ShapeWeights,
}

/// Points for surface features that are cheaper to test in code than by regex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeWeights {
    pub starts_capital: f64,
    pub terminal_punctuation: f64,
    pub word_range: f64,
    pub min_words: usize,
    pub max_words: usize,
    pub delimiter: f64,
    pub multi_sentence: f64,
    pub long_form: f64,
    pub long_form_chars: usize,
}

impl Default for ShapeWeights {
    fn default() -> Self {
        Self {
            starts_capital: 20.0,
            terminal_punctuation: 20.0,
            word_range: 25.0,
            min_words: 6,
            max_words: 41,
            delimiter: 20.0,
            multi_sentence: 20.0,
            long_form: 20.0,
            long_form_chars: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticTypeSpec {
    pub semantic_type: SemanticType,
    pub keywords: Vec<String>,
}

/// Target UI section per semantic type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionsSpec {
    pub procedure: String,
    pub warning: String,
    pub glossary: String,
    pub hardware: String,
    pub tool_guide: String,
    pub reference: String,
}

impl SectionsSpec {
    pub fn get(&self, semantic_type: SemanticType) -> &str {
        match semantic_type {
            SemanticType::Procedure => &self.procedure,
            SemanticType::Warning => &self.warning,
            SemanticType::Glossary => &self.glossary,
            SemanticType::Hardware => &self.hardware,
            SemanticType::ToolGuide => &self.tool_guide,
            SemanticType::Reference => &self.reference,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MakeSpec {
    pub name: String,
    pub aliases: Vec<String>,

    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodenameSpec {
    pub code: String,
    pub make: String,
    pub model: String,
    pub start: u16,
    pub end: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehiclesSpec {
    #[serde(default)]
    pub codenames: Vec<CodenameSpec>,

    #[serde(default)]
    pub platforms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub scenario: Scenario,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProceduresSpec {
    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,

    #[serde(default)]
    pub procedure_cues: Vec<String>,

    #[serde(default)]
    pub background_cues: Vec<String>,

    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairSpec {
    #[serde(default)]
    pub negative_claims: Vec<String>,

    #[serde(default)]
    pub workarounds: Vec<String>,

    #[serde(default)]
    pub identifiers: Vec<PatternSpec>,
}
