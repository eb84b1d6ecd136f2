//! Classifier: semantic type, target section, and follow-up flags.
//!
//! Types are chosen by keyword voting; heading hits count double. Ties go to
//! the type listed first in the lexicon. With no votes at all the extraction
//! category decides.

use rayon::prelude::*;
use tracing::instrument;

use keypearls_lexicon::Lexicon;
use keypearls_shared::{Category, ClassifiedUnit, ClassifyConfig, ScoredUnit, SemanticType};

use crate::text;

const HEADING_VOTE: usize = 2;
const CONTENT_VOTE: usize = 1;

/// Procedural snippets shorter than this many words need summarizing.
const SUMMARIZE_MIN_WORDS: usize = 12;

#[instrument(skip_all, fields(units = units.len()))]
pub fn classify_all(units: Vec<ScoredUnit>, lexicon: &Lexicon, cfg: &ClassifyConfig) -> Vec<ClassifiedUnit> {
    units
        .into_par_iter()
        .map(|u| classify_unit(u, lexicon, cfg))
        .collect()
}

pub fn classify_unit(unit: ScoredUnit, lexicon: &Lexicon, cfg: &ClassifyConfig) -> ClassifiedUnit {
    let candidate = &unit.candidate;
    let semantic_type = semantic_type_for(
        candidate.heading.as_deref(),
        &candidate.snippet,
        candidate.category,
        lexicon,
    );
    let needs_vehicle_attribution = needs_vehicle_attribution(
        &candidate.snippet,
        candidate.heading.as_deref(),
        lexicon,
        cfg.platform_window_chars,
    );
    let needs_summarization =
        semantic_type == SemanticType::Procedure && is_fragmentary(&candidate.snippet, cfg);

    ClassifiedUnit {
        target_section: lexicon.section_for(semantic_type).to_string(),
        scored: unit,
        semantic_type,
        needs_vehicle_attribution,
        needs_summarization,
    }
}

/// Keyword vote over heading and content.
pub fn semantic_type_for(
    heading: Option<&str>,
    content: &str,
    category: Category,
    lexicon: &Lexicon,
) -> SemanticType {
    let content_hits = lexicon.semantic_hits(content);
    let heading_hits = heading.map(|h| lexicon.semantic_hits(h)).unwrap_or_default();

    let mut best: Option<(SemanticType, usize)> = None;
    for (i, &(ty, hits)) in content_hits.iter().enumerate() {
        let heading = heading_hits.get(i).map_or(0, |&(_, h)| h);
        let votes = hits * CONTENT_VOTE + heading * HEADING_VOTE;
        if votes > 0 && best.is_none_or(|(_, b)| votes > b) {
            best = Some((ty, votes));
        }
    }

    match best {
        Some((ty, _)) => ty,
        None => fallback_type(category),
    }
}

fn fallback_type(category: Category) -> SemanticType {
    match category {
        Category::Pitfall => SemanticType::Warning,
        Category::Procedure => SemanticType::Procedure,
        Category::HardwareSpec => SemanticType::Hardware,
        Category::ToolUsage => SemanticType::ToolGuide,
        Category::Definition => SemanticType::Glossary,
        Category::Compatibility => SemanticType::Reference,
    }
}

/// True when a generic platform or module is mentioned with no specific
/// model nearby (and none in the heading).
pub fn needs_vehicle_attribution(
    content: &str,
    heading: Option<&str>,
    lexicon: &Lexicon,
    window_chars: usize,
) -> bool {
    let spans = lexicon.platform_spans(content);
    if spans.is_empty() {
        return false;
    }
    if heading.is_some_and(|h| !lexicon.models_in(h).is_empty()) {
        return false;
    }
    spans.iter().any(|&(start, end)| {
        let nearby = text::window(content, start, end, window_chars);
        lexicon.models_in(nearby).is_empty() && lexicon.find_codename(nearby).is_none()
    })
}

fn is_fragmentary(snippet: &str, cfg: &ClassifyConfig) -> bool {
    let trimmed = snippet.trim();
    trimmed.chars().count() <= cfg.summarize_max_chars
        || text::word_count(trimmed) < SUMMARIZE_MIN_WORDS
        || trimmed.chars().next().is_some_and(char::is_lowercase)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{candidate, lexicon, scored};
    use keypearls_shared::Tier;
    use pretty_assertions::assert_eq;

    fn classify(heading: Option<&str>, text: &str, category: Category) -> ClassifiedUnit {
        let mut c = candidate("doc", 0, text);
        c.heading = heading.map(str::to_string);
        c.category = category;
        classify_unit(scored(c, 40.0, Tier::Marginal), lexicon(), &ClassifyConfig::default())
    }

    #[test]
    fn heading_votes_count_double() {
        let unit = classify(
            Some("All Keys Lost Procedure"),
            "Connect the Autel IM608 to the OBD-II port and select Toyota > Tacoma > Smart Key.",
            Category::Procedure,
        );
        assert_eq!(unit.semantic_type, SemanticType::Procedure);
        assert_eq!(unit.target_section, "procedures");
    }

    #[test]
    fn warnings_and_hardware() {
        let warning = classify(
            None,
            "Always verify the VIN before ordering a replacement key.",
            Category::Pitfall,
        );
        assert_eq!(warning.semantic_type, SemanticType::Warning);
        assert_eq!(warning.target_section, "warnings");

        let row = classify(
            Some("Remote Specifications"),
            "FCC ID | HYQ14FBA | 315 MHz",
            Category::HardwareSpec,
        );
        assert_eq!(row.semantic_type, SemanticType::Hardware);
        assert_eq!(row.target_section, "hardware_specs");
    }

    #[test]
    fn ties_follow_priority_order() {
        // One warning hit and one procedure hit: warning is listed first.
        let unit = classify(None, "Never skip the procedure.", Category::Procedure);
        assert_eq!(unit.semantic_type, SemanticType::Warning);
    }

    #[test]
    fn no_votes_falls_back_to_category() {
        let unit = classify(None, "Fits every 2018-2020 sedan trim level.", Category::Compatibility);
        assert_eq!(unit.semantic_type, SemanticType::Reference);
        assert_eq!(unit.target_section, "reference");
    }

    #[test]
    fn platform_without_model_needs_attribution() {
        let lex = lexicon();
        assert!(needs_vehicle_attribution(
            "The BCM must be unlocked before new keys can be added.",
            None,
            lex,
            120
        ));
        assert!(!needs_vehicle_attribution(
            "On the Camry the BCM must be unlocked before new keys can be added.",
            None,
            lex,
            120
        ));
        assert!(!needs_vehicle_attribution(
            "The BCM must be unlocked before new keys can be added.",
            Some("Jeep Wrangler"),
            lex,
            120
        ));
        assert!(!needs_vehicle_attribution("Insert the key and wait.", None, lex, 120));
    }

    #[test]
    fn short_procedures_need_summarization() {
        let short = classify(Some("Steps"), "Press start twice to enter the menu.", Category::Procedure);
        assert_eq!(short.semantic_type, SemanticType::Procedure);
        assert!(short.needs_summarization);

        let full = classify(
            Some("Steps"),
            "Hold each new key to the start button until the security light blinks, then turn the ignition off.",
            Category::Procedure,
        );
        assert!(!full.needs_summarization);

        let warning = classify(None, "Never do it.", Category::Pitfall);
        assert!(!warning.needs_summarization);
    }
}
