//! Procedure packages: the terminal artifact for procedural content.

use serde::{Deserialize, Serialize};

use crate::types::Scenario;

/// One ordered step of a procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureStep {
    /// 1-based position within the package.
    pub order: u32,
    /// Canonical unit backing this step.
    pub unit_id: String,
    pub content: String,
    /// Explicit source numbering, when the step came from an ordered list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    pub doc_id: String,
    pub section_index: usize,
}

/// Background material harvested from sections preceding a procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub doc_id: String,
    pub heading: String,
    pub text: String,
}

/// A procedural section folded into a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRef {
    pub doc_id: String,
    pub section_index: usize,
    pub heading: String,
}

/// An ordered bundle of units forming one workflow for one vehicle/scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedurePackage {
    /// `pkg-<make>-<model>-<scenario>`.
    pub id: String,
    pub scenario: Scenario,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_start: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_end: Option<u16>,
    /// Heading of the first procedural section.
    pub title: String,
    pub steps: Vec<ProcedureStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<Prerequisite>,
    /// Warning units inside the procedural sections, verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Union of per-step tools, first-seen order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    pub sections: Vec<SectionRef>,
}
