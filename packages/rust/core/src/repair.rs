//! Repair: fixes truncated or thin content and demotes flat negative claims.
//!
//! A snippet that fails the completeness check is replaced by the sentences
//! of its paragraph around it, up to `length_ceiling`. The window may run past
//! the ceiling (never past `hard_max`) to keep part numbers, frequencies and
//! tool names; identifiers that still do not fit are recorded.

use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;
use tracing::instrument;

use keypearls_lexicon::Lexicon;
use keypearls_shared::{CanonicalUnit, RepairAction, RepairConfig, RepairNote, TruncationKind};

use crate::text;

/// Complete snippets shorter than this get paragraph context added.
const THIN_CHARS: usize = 60;

/// Words that never end a finished sentence.
const DANGLING_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "to", "of", "with", "for", "in", "on", "at", "by",
    "from", "if", "then", "is", "are", "your", "this", "that",
];

static STUB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:as follows|see below|the following|:)\W*$").expect("valid regex")
});

#[instrument(skip_all, fields(units = units.len()))]
pub fn repair_all(units: Vec<CanonicalUnit>, lexicon: &Lexicon, cfg: &RepairConfig) -> Vec<CanonicalUnit> {
    units
        .into_par_iter()
        .map(|u| repair_unit(u, lexicon, cfg))
        .collect()
}

pub fn repair_unit(unit: CanonicalUnit, lexicon: &Lexicon, cfg: &RepairConfig) -> CanonicalUnit {
    let snippet = unit.snippet.trim();
    let paragraph = unit.paragraph.trim();
    let truncation = detect_truncation(snippet);
    let complete = truncation.is_none() && is_complete(snippet, cfg.min_words);
    let has_more = paragraph.len() > snippet.len();

    let (action, content, lost_identifiers) = if has_more
        && (!complete || snippet.chars().count() < THIN_CHARS)
    {
        let (trimmed, lost) = trim_around(paragraph, snippet, cfg, lexicon);
        if trimmed == snippet {
            (RepairAction::Kept, trimmed, Vec::new())
        } else if complete {
            (RepairAction::Augmented, trimmed, lost)
        } else {
            (RepairAction::Replaced, trimmed, lost)
        }
    } else {
        (RepairAction::Kept, snippet.to_string(), Vec::new())
    };

    let mut tier = unit.tier;
    let mut demoted_from = None;
    if lexicon.is_negative_claim(&content) && !lexicon.has_workaround(&content) {
        let demoted = unit.tier.demote();
        if demoted != unit.tier {
            demoted_from = Some(unit.tier);
            tier = demoted;
        }
    }

    CanonicalUnit {
        content,
        tier,
        repair: Some(RepairNote {
            action,
            truncation,
            demoted_from,
            lost_identifiers,
        }),
        ..unit
    }
}

/// How `text` looks cut off, if it does.
pub fn detect_truncation(text: &str) -> Option<TruncationKind> {
    let t = text.trim_end();
    if t.ends_with("...") || t.ends_with('…') {
        return Some(TruncationKind::TrailingEllipsis);
    }
    if is_unbalanced(t) {
        return Some(TruncationKind::UnbalancedPunctuation);
    }
    if !text::ends_with_terminal(t) {
        if t.ends_with([',', '-', '–', '/', '&']) {
            return Some(TruncationKind::DanglingToken);
        }
        let last = t
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or("")
            .to_lowercase();
        if DANGLING_WORDS.contains(&last.as_str()) {
            return Some(TruncationKind::DanglingToken);
        }
    }
    None
}

fn is_unbalanced(text: &str) -> bool {
    let count = |c: char| text.matches(c).count();
    count('(') != count(')') || count('[') != count(']') || count('"') % 2 == 1
}

/// Starts like a sentence, ends like one, has enough words, and is not a
/// lead-in to something else ("as follows:").
pub fn is_complete(text: &str, min_words: usize) -> bool {
    let t = text.trim();
    text::starts_upper_or_digit(t)
        && text::ends_with_terminal(t)
        && text::word_count(t) >= min_words
        && !STUB_RE.is_match(t)
}

/// Whole sentences of `paragraph` around `snippet`, at most `length_ceiling`
/// characters. Following sentences are taken before preceding ones. A
/// sentence holding an identifier is pulled in as long as the content stays
/// within `hard_max`. Returns the content and the identifiers that did not fit.
pub fn trim_around(
    paragraph: &str,
    snippet: &str,
    cfg: &RepairConfig,
    lexicon: &Lexicon,
) -> (String, Vec<String>) {
    let paragraph = paragraph.trim();
    let spans = text::sentence_spans(paragraph);
    if paragraph.chars().count() <= cfg.length_ceiling || spans.is_empty() {
        return (paragraph.to_string(), Vec::new());
    }

    let hard_max = cfg.hard_max.max(cfg.length_ceiling);
    let len = |from: usize, to: usize| paragraph[from..to].chars().count();
    let last_span = spans.len() - 1;

    let snippet = snippet.trim();
    let (snip_start, snip_end) = paragraph
        .find(snippet)
        .map_or((0, 0), |pos| (pos, pos + snippet.len()));
    let mut lo = spans
        .iter()
        .position(|&(_, end)| end > snip_start)
        .unwrap_or(last_span);
    let mut hi = spans
        .iter()
        .position(|&(_, end)| end >= snip_end)
        .unwrap_or(last_span)
        .max(lo);

    while hi < last_span && len(spans[lo].0, spans[hi + 1].1) <= cfg.length_ceiling {
        hi += 1;
    }
    while lo > 0 && len(spans[lo - 1].0, spans[hi].1) <= cfg.length_ceiling {
        lo -= 1;
    }

    let mut start = spans[lo].0;
    let mut end = spans[hi].1;
    if len(start, end) > hard_max {
        // A single run-on sentence: cut at a word boundary, never inside the snippet.
        let limit = start + byte_offset(&paragraph[start..], hard_max);
        let cut = word_boundary_before(paragraph, limit);
        let cut = if cut > start { cut } else { limit };
        end = cut.max(snip_end);
    }

    let identifiers = lexicon.identifiers_in(paragraph);
    for id in &identifiers {
        if paragraph[start..end].contains(id.as_str()) {
            continue;
        }
        let Some(pos) = paragraph.find(id.as_str()) else {
            continue;
        };
        let id_end = pos + id.len();
        let Some(&(id_start, id_stop)) = spans.iter().find(|&&(_, stop)| stop >= id_end) else {
            continue;
        };
        let (from, to) = (start.min(id_start), end.max(id_stop));
        if len(from, to) <= hard_max {
            start = from;
            end = to;
        }
    }

    let content = paragraph[start..end].trim().to_string();
    let lost = identifiers
        .into_iter()
        .filter(|id| !content.contains(id.as_str()))
        .collect();
    (content, lost)
}

/// Byte offset of the `chars`-th character (or the end of `text`).
fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map_or(text.len(), |(i, _)| i)
}

fn word_boundary_before(text: &str, limit: usize) -> usize {
    let limit = text::floor_boundary(text, limit);
    text[..limit]
        .rfind(char::is_whitespace)
        .filter(|&i| i > 0)
        .unwrap_or(limit)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::lexicon;
    use keypearls_shared::{
        Attribution, Category, ScoreFlags, SemanticType, SourceRef, Tier, VehicleHint,
    };
    use pretty_assertions::assert_eq;

    fn unit(snippet: &str, paragraph: &str, tier: Tier) -> CanonicalUnit {
        CanonicalUnit {
            id: "pearl-000000000001".into(),
            representative_id: "doc#0".into(),
            content: snippet.into(),
            snippet: snippet.into(),
            paragraph: paragraph.into(),
            heading: None,
            category: Category::Procedure,
            semantic_type: SemanticType::Procedure,
            target_section: "procedures".into(),
            score: 50.0,
            tier,
            flags: ScoreFlags::default(),
            tags: Vec::new(),
            needs_vehicle_attribution: false,
            needs_summarization: false,
            absorbed_ids: vec!["doc#0".into()],
            sources: vec![SourceRef {
                doc_id: "doc".into(),
                source_path: "doc.txt".into(),
                source_title: "Doc".into(),
                section_index: 0,
                block_ordinal: 0,
                step_number: None,
                vehicle: VehicleHint::default(),
            }],
            attribution: Attribution::default(),
            repair: None,
        }
    }

    fn repair(u: CanonicalUnit) -> CanonicalUnit {
        repair_unit(u, lexicon(), &RepairConfig::default())
    }

    #[test]
    fn truncation_kinds() {
        assert_eq!(
            detect_truncation("Hold the new fob against the button until..."),
            Some(TruncationKind::TrailingEllipsis)
        );
        assert_eq!(
            detect_truncation("Hold the button (about five seconds until the light."),
            Some(TruncationKind::UnbalancedPunctuation)
        );
        assert_eq!(
            detect_truncation("Connect the programmer to the"),
            Some(TruncationKind::DanglingToken)
        );
        assert_eq!(detect_truncation("FCC ID | HYQ14FBA | 315 MHz"), None);
        assert_eq!(detect_truncation("Turn the ignition off."), None);
    }

    #[test]
    fn completeness_check() {
        assert!(is_complete("Insert the working key and press start twice.", 6));
        assert!(!is_complete("then press start twice to finish it.", 6));
        assert!(!is_complete("Press start twice.", 6));
        assert!(!is_complete("The steps to program the key are as follows:", 6));
        assert!(!is_complete("FCC ID | HYQ14FBA | 315 MHz", 6));
    }

    #[test]
    fn complete_snippet_is_kept() {
        let text = "Insert the working key and press the start button twice to enter programming mode.";
        let repaired = repair(unit(text, text, Tier::Marginal));
        let note = repaired.repair.expect("note");
        assert_eq!(note.action, RepairAction::Kept);
        assert_eq!(repaired.content, text);
        assert_eq!(repaired.tier, Tier::Marginal);
    }

    #[test]
    fn truncated_snippet_is_replaced() {
        let paragraph = "Hold the new fob against the start button until the dash confirms the key count. \
                         Then remove it.";
        let repaired = repair(unit(
            "Hold the new fob against the start button until...",
            paragraph,
            Tier::Marginal,
        ));
        let note = repaired.repair.expect("note");
        assert_eq!(note.action, RepairAction::Replaced);
        assert_eq!(note.truncation, Some(TruncationKind::TrailingEllipsis));
        assert_eq!(repaired.content, paragraph);
    }

    #[test]
    fn thin_snippet_is_augmented() {
        let paragraph = "Disconnect the battery before you start. The BCM loses its learned keys otherwise.";
        let repaired = repair(unit("Disconnect the battery before you start.", paragraph, Tier::Acceptable));
        assert_eq!(repaired.repair.expect("note").action, RepairAction::Augmented);
        assert_eq!(repaired.content, paragraph);
        assert!(repaired.paragraph.contains(&repaired.content));
    }

    #[test]
    fn table_rows_stay_as_they_are() {
        let row = "FCC ID | HYQ14FBA | 315 MHz";
        let repaired = repair(unit(row, row, Tier::Marginal));
        assert_eq!(repaired.repair.expect("note").action, RepairAction::Kept);
        assert_eq!(repaired.content, row);
    }

    #[test]
    fn negative_claim_without_workaround_is_demoted() {
        let text = "Adding a key to this model is not possible without visiting the dealer.";
        let repaired = repair(unit(text, text, Tier::Good));
        assert_eq!(repaired.tier, Tier::Acceptable);
        assert_eq!(repaired.repair.expect("note").demoted_from, Some(Tier::Good));

        let with_fix = "Adding a key over OBD is not possible; instead read the EEPROM on the bench.";
        let repaired = repair(unit(with_fix, with_fix, Tier::Good));
        assert_eq!(repaired.tier, Tier::Good);
        assert_eq!(repaired.repair.expect("note").demoted_from, None);
    }

    #[test]
    fn demotion_never_discards() {
        let text = "Adding a key to this model is not possible without visiting the dealer.";
        let repaired = repair(unit(text, text, Tier::Marginal));
        assert_eq!(repaired.tier, Tier::Marginal);
        assert_eq!(repaired.repair.expect("note").demoted_from, None);
    }

    #[test]
    fn trimming_keeps_identifiers_up_to_hard_max() {
        let filler = "Keep the ignition on while the tool works through its menus. ";
        let mut paragraph = filler.repeat(7);
        paragraph.push_str("The matching remote for this truck is the HYQ14FBA fob. ");
        paragraph.push_str(&filler.repeat(4));
        paragraph.push_str("Older remotes transmit at 314 MHz instead.");

        let cfg = RepairConfig::default();
        let (content, lost) = trim_around(&paragraph, filler.trim(), &cfg, lexicon());

        assert!(content.contains("HYQ14FBA"));
        assert!(content.ends_with("fob."));
        assert!(content.chars().count() <= cfg.hard_max);
        assert!(paragraph.contains(&content));
        assert_eq!(lost, vec!["314 MHz".to_string()]);
    }

    #[test]
    fn trimming_without_identifiers_stops_at_ceiling() {
        let filler = "Keep the ignition on while the tool works through its menus. ";
        let paragraph = filler.repeat(12);
        let cfg = RepairConfig::default();
        let (content, lost) = trim_around(&paragraph, filler.trim(), &cfg, lexicon());
        assert!(content.chars().count() <= cfg.length_ceiling);
        assert!(content.ends_with("menus."));
        assert!(lost.is_empty());
    }

    #[test]
    fn late_snippet_survives_trimming() {
        let filler = "Keep the ignition on while the tool works through its menus. ";
        let snippet = "Never unplug the IM608 mid-write.";
        let paragraph = format!("{}{snippet}", filler.repeat(8));

        let repaired = repair(unit(snippet, &paragraph, Tier::Good));
        let note = repaired.repair.expect("note");
        assert_eq!(note.action, RepairAction::Replaced);
        assert!(repaired.content.ends_with(snippet), "{}", repaired.content);
        assert!(repaired.content.starts_with("Keep the ignition on"));
        assert!(repaired.content.chars().count() <= RepairConfig::default().length_ceiling);
        assert!(paragraph.contains(&repaired.content));
        assert!(note.lost_identifiers.is_empty());
    }

    #[test]
    fn trimming_centres_on_a_mid_paragraph_snippet() {
        let filler = "Keep the ignition on while the tool works through its menus. ";
        let snippet = "The HYQ14FBA fob needs a fresh CR2032 before pairing.";
        let paragraph = format!("{}{snippet} {}", filler.repeat(5), filler.repeat(5).trim_end());

        let cfg = RepairConfig::default();
        let (content, lost) = trim_around(&paragraph, snippet, &cfg, lexicon());
        assert!(content.contains(snippet));
        assert!(content.starts_with("Keep the ignition on"));
        assert!(content.ends_with("menus."));
        assert!(content.chars().count() <= cfg.length_ceiling);
        assert!(paragraph.contains(&content));
        assert!(lost.is_empty());
    }
}
