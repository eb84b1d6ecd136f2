//! Core domain enums and small value types shared by every stage.

use serde::{Deserialize, Serialize};

/// Current schema version for the inter-stage artifact format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Vehicle hints
// ---------------------------------------------------------------------------

/// Where a document's year range came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearSource {
    /// Platform/generation codename lookup (authoritative multi-year span).
    Codename,
    /// Bare 4-digit year token(s) in the filename or title.
    YearToken,
    #[default]
    None,
}

/// Coarse make/model/year inferred for a document. Every field may be unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_start: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_end: Option<u16>,
    #[serde(default)]
    pub year_source: YearSource,
}

impl VehicleHint {
    /// True when no vehicle signal was found at all.
    pub fn is_empty(&self) -> bool {
        self.make.is_none() && self.model.is_none() && self.year_start.is_none()
    }

    /// Number of populated attribution facets (make, model, years).
    pub fn richness(&self) -> u8 {
        u8::from(self.make.is_some())
            + u8::from(self.model.is_some())
            + u8::from(self.year_start.is_some())
    }
}

// ---------------------------------------------------------------------------
// Structural blocks
// ---------------------------------------------------------------------------

/// Kind of structural block a candidate was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    ListItem,
    TableRow,
}

// ---------------------------------------------------------------------------
// Candidate categories
// ---------------------------------------------------------------------------

/// Extraction category assigned by the first matching pattern set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Pitfall,
    Procedure,
    HardwareSpec,
    ToolUsage,
    Definition,
    Compatibility,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pitfall => "pitfall",
            Self::Procedure => "procedure",
            Self::HardwareSpec => "hardware_spec",
            Self::ToolUsage => "tool_usage",
            Self::Definition => "definition",
            Self::Compatibility => "compatibility",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Ordered quality bucket. Derived ordering is `Discard < ... < Excellent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Discard,
    Marginal,
    Acceptable,
    Good,
    Excellent,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discard => "discard",
            Self::Marginal => "marginal",
            Self::Acceptable => "acceptable",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }

    /// One step down. Marginal is the floor for demotion: a demoted unit is
    /// never pushed into `Discard`, and `Discard` stays where it is.
    pub fn demote(self) -> Self {
        match self {
            Self::Excellent => Self::Good,
            Self::Good => Self::Acceptable,
            Self::Acceptable => Self::Marginal,
            Self::Marginal => Self::Marginal,
            Self::Discard => Self::Discard,
        }
    }

    pub fn is_discard(&self) -> bool {
        matches!(self, Self::Discard)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Semantic type
// ---------------------------------------------------------------------------

/// Semantic type assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Procedure,
    Warning,
    Glossary,
    Hardware,
    ToolGuide,
    Reference,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Procedure => "procedure",
            Self::Warning => "warning",
            Self::Glossary => "glossary",
            Self::Hardware => "hardware",
            Self::ToolGuide => "tool_guide",
            Self::Reference => "reference",
        }
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Procedure scenario
// ---------------------------------------------------------------------------

/// Workflow scenario a procedure package covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Akl,
    AddKey,
    EepromBackup,
    PinExtraction,
    Generic,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Akl => "akl",
            Self::AddKey => "add_key",
            Self::EepromBackup => "eeprom_backup",
            Self::PinExtraction => "pin_extraction",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Attribution method
// ---------------------------------------------------------------------------

/// Signal family that contributed most to a resolved attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMethod {
    YearMakeTag,
    SourceDocument,
    ModelLookup,
    ContentKeywords,
}

impl AttributionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YearMakeTag => "year_make_tag",
            Self::SourceDocument => "source_document",
            Self::ModelLookup => "model_lookup",
            Self::ContentKeywords => "content_keywords",
        }
    }
}
