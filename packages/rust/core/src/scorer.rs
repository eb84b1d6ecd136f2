//! Scorer: five pattern-driven sub-scores, a weighted composite, and a tier.
//!
//! The composite is monotone: raising any sub-score or setting any flag
//! never lowers it. Disqualified candidates score 0 and land in `Discard`.

use rayon::prelude::*;
use tracing::instrument;

use keypearls_lexicon::{Lexicon, ScoringTables, pattern_sum};
use keypearls_shared::{
    BlockKind, CandidateUnit, RejectReason, ScoreConfig, ScoreFlags, ScoredUnit, StageSettings,
    SubScores, Tier, TierThresholds,
};

use crate::text;

const SUB_SCORE_CAP: f64 = 100.0;

// Composite weights: actionability, specificity, clarity, completeness, decision value.
const W_ACTIONABILITY: f64 = 0.25;
const W_SPECIFICITY: f64 = 0.25;
const W_CLARITY: f64 = 0.20;
const W_COMPLETENESS: f64 = 0.15;
const W_DECISION: f64 = 0.15;

const SUBSTANTIVE_CHARS: usize = 50;
const SHORT_PENALTY: f64 = 10.0;
const DETAILED_CHARS: std::ops::RangeInclusive<usize> = 120..=500;
const DETAIL_BONUS: f64 = 5.0;
const CONCISE_MAX_CHARS: usize = 800;
const VERBOSE_PENALTY: f64 = 5.0;

/// Repetition is only judged on snippets with at least this many words.
const REPETITION_MIN_WORDS: usize = 5;

/// Score every candidate. Output order matches input order.
#[instrument(skip_all, fields(candidates = candidates.len()))]
pub fn score_all(
    candidates: Vec<CandidateUnit>,
    lexicon: &Lexicon,
    settings: &StageSettings,
) -> Vec<ScoredUnit> {
    let delimiter = settings.extract.table_delimiter.as_str();
    candidates
        .into_par_iter()
        .map(|c| score_unit(c, lexicon, &settings.score, delimiter))
        .collect()
}

/// Score one candidate on its snippet.
pub fn score_unit(
    candidate: CandidateUnit,
    lexicon: &Lexicon,
    cfg: &ScoreConfig,
    delimiter: &str,
) -> ScoredUnit {
    let tables = lexicon.scoring();

    if let Some(reason) = reject_reason(&candidate.snippet, tables, cfg) {
        return ScoredUnit {
            candidate,
            sub_scores: SubScores::default(),
            flags: ScoreFlags::default(),
            score: 0.0,
            tier: Tier::Discard,
            reject_reason: Some(reason),
        };
    }

    let sub_scores = sub_scores(&candidate.snippet, tables, delimiter);
    let flags = score_flags(&candidate, tables);
    let score = composite(&sub_scores, &flags, cfg);

    ScoredUnit {
        tier: tier_for(score, &cfg.thresholds),
        candidate,
        sub_scores,
        flags,
        score,
        reject_reason: None,
    }
}

/// Hard disqualifiers, checked in a fixed order.
pub fn reject_reason(snippet: &str, tables: &ScoringTables, cfg: &ScoreConfig) -> Option<RejectReason> {
    let trimmed = snippet.trim();
    if tables.is_bare_list_marker(trimmed) {
        return Some(RejectReason::BareListMarker);
    }
    if tables.is_citation_only(trimmed) {
        return Some(RejectReason::CitationOnly);
    }
    if trimmed.chars().count() < cfg.min_chars {
        return Some(RejectReason::TooShort);
    }

    let words = text::words(trimmed);
    if words.len() >= REPETITION_MIN_WORDS {
        let unique: std::collections::HashSet<&str> = words.iter().map(String::as_str).collect();
        let ratio = unique.len() as f64 / words.len() as f64;
        if ratio < cfg.min_unique_ratio {
            return Some(RejectReason::RepetitiveWords);
        }
    }
    None
}

pub fn sub_scores(snippet: &str, tables: &ScoringTables, delimiter: &str) -> SubScores {
    let shape = &tables.shape;
    let chars = snippet.chars().count();
    let words = text::word_count(snippet);

    let mut clarity_shape = 0.0;
    if text::starts_upper_or_digit(snippet) {
        clarity_shape += shape.starts_capital;
    }
    if text::ends_with_terminal(snippet) {
        clarity_shape += shape.terminal_punctuation;
    }
    if (shape.min_words..=shape.max_words).contains(&words) {
        clarity_shape += shape.word_range;
    }
    if !delimiter.is_empty() && snippet.contains(delimiter) {
        clarity_shape += shape.delimiter;
    }

    let mut completeness_shape = 0.0;
    if text::sentence_spans(snippet).len() >= 2 {
        completeness_shape += shape.multi_sentence;
    }
    if chars >= shape.long_form_chars {
        completeness_shape += shape.long_form;
    }

    SubScores {
        actionability: capped(pattern_sum(&tables.actionability, snippet)),
        specificity: capped(pattern_sum(&tables.specificity, snippet)),
        clarity: capped(pattern_sum(&tables.clarity, snippet) + clarity_shape),
        completeness: capped(pattern_sum(&tables.completeness, snippet) + completeness_shape),
        decision_value: capped(pattern_sum(&tables.decision_value, snippet)),
    }
}

pub fn score_flags(candidate: &CandidateUnit, tables: &ScoringTables) -> ScoreFlags {
    let chars = candidate.snippet.trim().chars().count();
    ScoreFlags {
        gotcha: tables.is_gotcha(&candidate.snippet),
        structured: candidate.block_kind == BlockKind::TableRow,
        substantive: chars >= SUBSTANTIVE_CHARS,
        detailed: DETAILED_CHARS.contains(&chars),
        concise: chars <= CONCISE_MAX_CHARS,
    }
}

/// Weighted sum plus flag adjustments, times the multiplier, clamped to
/// 0..=100 and rounded to two decimals.
pub fn composite(sub: &SubScores, flags: &ScoreFlags, cfg: &ScoreConfig) -> f64 {
    let mut raw = W_ACTIONABILITY * sub.actionability
        + W_SPECIFICITY * sub.specificity
        + W_CLARITY * sub.clarity
        + W_COMPLETENESS * sub.completeness
        + W_DECISION * sub.decision_value;

    if flags.gotcha {
        raw += cfg.gotcha_bonus.max(0.0);
    }
    if flags.structured {
        raw += cfg.structured_bonus.max(0.0);
    }
    if !flags.substantive {
        raw -= SHORT_PENALTY;
    }
    if flags.detailed {
        raw += DETAIL_BONUS;
    }
    if !flags.concise {
        raw -= VERBOSE_PENALTY;
    }

    let scaled = (raw * cfg.multiplier.max(0.0)).clamp(0.0, 100.0);
    (scaled * 100.0).round() / 100.0
}

pub fn tier_for(score: f64, thresholds: &TierThresholds) -> Tier {
    if score >= thresholds.excellent {
        Tier::Excellent
    } else if score >= thresholds.good {
        Tier::Good
    } else if score >= thresholds.acceptable {
        Tier::Acceptable
    } else if score >= thresholds.marginal {
        Tier::Marginal
    } else {
        Tier::Discard
    }
}

fn capped(value: f64) -> f64 {
    value.clamp(0.0, SUB_SCORE_CAP)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{candidate, lexicon};
    use pretty_assertions::assert_eq;

    fn score_text(text: &str) -> ScoredUnit {
        score_unit(candidate("doc", 0, text), lexicon(), &ScoreConfig::default(), " | ")
    }

    #[test]
    fn procedure_step_is_kept() {
        let unit = score_text(
            "Connect the Autel IM608 to the OBD-II port and select Toyota > Tacoma > Smart Key.",
        );
        assert_eq!(unit.reject_reason, None);
        assert!(unit.sub_scores.actionability >= 55.0);
        assert!(unit.sub_scores.specificity >= 35.0);
        assert_eq!(unit.tier, Tier::Marginal);
        assert!(unit.score > 40.0 && unit.score < 45.0, "score {}", unit.score);
    }

    #[test]
    fn gotcha_is_flagged() {
        let unit = score_text("Always verify the VIN before ordering a replacement key.");
        assert!(unit.flags.gotcha);
        assert!(unit.flags.substantive);
        assert!(!unit.tier.is_discard());
    }

    #[test]
    fn disqualifiers() {
        assert_eq!(score_text("Not possible.").reject_reason, Some(RejectReason::TooShort));
        assert_eq!(score_text("  Step 4  ").reject_reason, Some(RejectReason::BareListMarker));
        assert_eq!(
            score_text("https://example.com/programming-guide/honda").reject_reason,
            Some(RejectReason::CitationOnly)
        );
        assert_eq!(
            score_text("key key key key key key key key program").reject_reason,
            Some(RejectReason::RepetitiveWords)
        );

        let rejected = score_text("Not possible.");
        assert_eq!(rejected.score, 0.0);
        assert_eq!(rejected.tier, Tier::Discard);
    }

    #[test]
    fn table_rows_are_structured() {
        let mut row = candidate("doc", 3, "FCC ID | HYQ14FBA | 315 MHz");
        row.block_kind = BlockKind::TableRow;
        let unit = score_unit(row, lexicon(), &ScoreConfig::default(), " | ");
        assert!(unit.flags.structured);
        assert!(unit.sub_scores.specificity >= 65.0);
        assert!(!unit.tier.is_discard());
    }

    #[test]
    fn composite_is_monotone() {
        let cfg = ScoreConfig::default();
        let low = SubScores {
            actionability: 20.0,
            specificity: 10.0,
            clarity: 40.0,
            completeness: 0.0,
            decision_value: 15.0,
        };
        let high = SubScores {
            actionability: 60.0,
            ..low
        };
        let none = ScoreFlags::default();
        let some = ScoreFlags {
            gotcha: true,
            substantive: true,
            ..none
        };

        assert!(high.dominates(&low));
        assert!(composite(&high, &none, &cfg) >= composite(&low, &none, &cfg));
        assert!(composite(&low, &some, &cfg) >= composite(&low, &none, &cfg));
        assert!(composite(&high, &some, &cfg) >= composite(&low, &none, &cfg));
    }

    #[test]
    fn composite_arithmetic() {
        let cfg = ScoreConfig {
            multiplier: 1.0,
            ..ScoreConfig::default()
        };
        let sub = SubScores {
            actionability: 100.0,
            specificity: 100.0,
            clarity: 100.0,
            completeness: 100.0,
            decision_value: 100.0,
        };
        let flags = ScoreFlags {
            substantive: true,
            concise: true,
            ..ScoreFlags::default()
        };
        assert_eq!(composite(&sub, &flags, &cfg), 100.0);
        assert_eq!(composite(&SubScores::default(), &ScoreFlags::default(), &cfg), 0.0);

        let half = SubScores {
            actionability: 40.0,
            ..SubScores::default()
        };
        assert_eq!(composite(&half, &flags, &cfg), 10.0);
    }

    #[test]
    fn tiers_follow_thresholds() {
        let t = TierThresholds::default();
        assert_eq!(tier_for(75.0, &t), Tier::Excellent);
        assert_eq!(tier_for(74.99, &t), Tier::Good);
        assert_eq!(tier_for(45.0, &t), Tier::Acceptable);
        assert_eq!(tier_for(30.0, &t), Tier::Marginal);
        assert_eq!(tier_for(29.99, &t), Tier::Discard);
    }

    #[test]
    fn scoring_is_deterministic() {
        let text = "Hold each new key to the start button until the security light blinks.";
        assert_eq!(score_text(text), score_text(text));
    }
}
