//! Per-stage insight-unit records.
//!
//! Each stage returns a distinct record type: a [`CandidateUnit`] is wrapped
//! by a [`ScoredUnit`], which is wrapped by a [`ClassifiedUnit`]. The
//! deduplicator collapses classified units into [`CanonicalUnit`]s, which the
//! attributor and the repair stage rebuild (never mutate in place).
//! Wrapped records are flattened on the wire so every artifact stays a flat
//! JSON object per unit.

use serde::{Deserialize, Serialize};

use crate::types::{
    AttributionMethod, BlockKind, Category, SemanticType, Tier, VehicleHint,
};

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Where a unit was cut from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub doc_id: String,
    pub source_path: String,
    pub source_title: String,
    pub section_index: usize,
    pub block_ordinal: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u32>,
    /// The loader's coarse vehicle inference for the source document.
    #[serde(default)]
    pub vehicle: VehicleHint,
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// A block that matched the pattern library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateUnit {
    /// `<doc_id>#<block_ordinal>`.
    pub id: String,
    pub source: SourceRef,
    pub category: Category,
    pub block_kind: BlockKind,
    /// Sentence(s) around the strongest match; a slice of `paragraph`.
    pub snippet: String,
    /// Full block text; a slice of the document text.
    pub paragraph: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Summed weight of the winning category's matching patterns.
    pub match_weight: u32,
    /// Short hash of (doc id, ordinal, paragraph).
    pub provenance_hash: String,
}

// ---------------------------------------------------------------------------
// Scored
// ---------------------------------------------------------------------------

/// The five quality sub-scores, each capped at 100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub actionability: f64,
    pub specificity: f64,
    pub clarity: f64,
    pub completeness: f64,
    pub decision_value: f64,
}

impl SubScores {
    /// Component-wise `>=`.
    pub fn dominates(&self, other: &SubScores) -> bool {
        self.actionability >= other.actionability
            && self.specificity >= other.specificity
            && self.clarity >= other.clarity
            && self.completeness >= other.completeness
            && self.decision_value >= other.decision_value
    }
}

/// Score-affecting flags. Every flag only ever raises the composite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFlags {
    /// Matches a pitfall/warning pattern.
    pub gotcha: bool,
    /// Row of a keyword table.
    pub structured: bool,
    /// Long enough to stand alone.
    pub substantive: bool,
    /// In the sweet-spot length band.
    pub detailed: bool,
    /// Not overlong.
    pub concise: bool,
}

impl ScoreFlags {
    /// True when every flag set in `other` is also set in `self`.
    pub fn contains(&self, other: &ScoreFlags) -> bool {
        (self.gotcha || !other.gotcha)
            && (self.structured || !other.structured)
            && (self.substantive || !other.substantive)
            && (self.detailed || !other.detailed)
            && (self.concise || !other.concise)
    }
}

/// Why a candidate was rejected outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    BareListMarker,
    CitationOnly,
    RepetitiveWords,
    TooShort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredUnit {
    #[serde(flatten)]
    pub candidate: CandidateUnit,
    pub sub_scores: SubScores,
    pub flags: ScoreFlags,
    pub score: f64,
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
}

impl ScoredUnit {
    pub fn is_gotcha(&self) -> bool {
        self.flags.gotcha
    }
}

// ---------------------------------------------------------------------------
// Classified
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedUnit {
    #[serde(flatten)]
    pub scored: ScoredUnit,
    pub semantic_type: SemanticType,
    pub target_section: String,
    pub needs_vehicle_attribution: bool,
    pub needs_summarization: bool,
}

impl ClassifiedUnit {
    pub fn id(&self) -> &str {
        &self.scored.candidate.id
    }

    pub fn candidate(&self) -> &CandidateUnit {
        &self.scored.candidate
    }
}

// ---------------------------------------------------------------------------
// Attribution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionStatus {
    /// The attributor has not run yet.
    #[default]
    Pending,
    Resolved,
    /// No make cleared the confidence floor. Terminal; never defaulted.
    Unresolved,
}

/// One weighted vote for a make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalVote {
    pub make: String,
    pub method: AttributionMethod,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub status: AttributionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_start: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_end: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<AttributionMethod>,
    /// Weighted points of the winning make (0 when unresolved with no votes).
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signals: Vec<SignalVote>,
}

// ---------------------------------------------------------------------------
// Repair
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationKind {
    TrailingEllipsis,
    DanglingToken,
    UnbalancedPunctuation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairAction {
    /// Snippet was complete and kept as-is.
    Kept,
    /// Snippet failed the completeness check; paragraph used instead.
    Replaced,
    /// Snippet was complete but thin; paragraph context added.
    Augmented,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairNote {
    pub action: RepairAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation: Option<TruncationKind>,
    /// Set when a flat negative claim demoted the unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demoted_from: Option<Tier>,
    /// Identifiers present in the paragraph that did not fit under the hard maximum.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lost_identifiers: Vec<String>,
}

// ---------------------------------------------------------------------------
// Canonical
// ---------------------------------------------------------------------------

/// One deduplicated insight ("pearl").
///
/// `absorbed_ids[i]` was cut from `sources[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalUnit {
    /// `pearl-<12 hex>`.
    pub id: String,
    pub representative_id: String,
    pub content: String,
    pub snippet: String,
    pub paragraph: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    pub category: Category,
    pub semantic_type: SemanticType,
    pub target_section: String,
    pub score: f64,
    pub tier: Tier,
    pub flags: ScoreFlags,
    #[serde(default)]
    pub tags: Vec<String>,
    pub needs_vehicle_attribution: bool,
    pub needs_summarization: bool,
    pub absorbed_ids: Vec<String>,
    pub sources: Vec<SourceRef>,
    #[serde(default)]
    pub attribution: Attribution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair: Option<RepairNote>,
}

impl CanonicalUnit {
    /// `(unit id, source)` pairs for every absorbed unit.
    pub fn members(&self) -> impl Iterator<Item = (&str, &SourceRef)> {
        self.absorbed_ids
            .iter()
            .map(String::as_str)
            .zip(self.sources.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_candidate() -> CandidateUnit {
        CandidateUnit {
            id: "doc#0".into(),
            source: SourceRef {
                doc_id: "doc".into(),
                source_path: "doc.txt".into(),
                source_title: "Doc".into(),
                section_index: 0,
                block_ordinal: 0,
                step_number: None,
                vehicle: VehicleHint::default(),
            },
            category: Category::Procedure,
            block_kind: BlockKind::Paragraph,
            snippet: "Insert the key.".into(),
            paragraph: "Insert the key.".into(),
            heading: None,
            tags: vec![],
            match_weight: 3,
            provenance_hash: "abc".into(),
        }
    }

    #[test]
    fn classified_unit_flattens_on_the_wire() {
        let unit = ClassifiedUnit {
            scored: ScoredUnit {
                candidate: sample_candidate(),
                sub_scores: SubScores::default(),
                flags: ScoreFlags::default(),
                score: 42.0,
                tier: Tier::Marginal,
                reject_reason: None,
            },
            semantic_type: SemanticType::Procedure,
            target_section: "procedures".into(),
            needs_vehicle_attribution: false,
            needs_summarization: true,
        };

        let value = serde_json::to_value(&unit).expect("serialize");
        assert_eq!(value["id"], "doc#0");
        assert_eq!(value["tier"], "marginal");
        assert_eq!(value["semantic_type"], "procedure");
        assert!(value.get("scored").is_none());

        let parsed: ClassifiedUnit = serde_json::from_value(value).expect("deserialize");
        assert_eq!(parsed, unit);
    }

    #[test]
    fn flag_containment() {
        let all = ScoreFlags {
            gotcha: true,
            structured: true,
            substantive: true,
            detailed: true,
            concise: true,
        };
        let some = ScoreFlags {
            gotcha: true,
            ..ScoreFlags::default()
        };
        assert!(all.contains(&some));
        assert!(!some.contains(&all));
        assert!(some.contains(&ScoreFlags::default()));
    }
}
