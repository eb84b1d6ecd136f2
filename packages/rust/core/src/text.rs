//! Text helpers shared by the stages: identifiers, hashing, sentences, words.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9][A-Za-z0-9'\-]*").expect("valid regex"));

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Kebab-case slug: lowercase alphanumerics separated by single dashes.
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Document id from an input-relative path: extension dropped, each
/// directory segment slugified, segments joined with `/`.
pub fn doc_id_for(relative: &Path) -> String {
    let without_ext = relative.with_extension("");
    let segments: Vec<String> = without_ext
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(slugify(&s.to_string_lossy())),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect();

    if segments.is_empty() {
        return "index".to_string();
    }
    segments.join("/")
}

/// Human title from a file stem: underscores become spaces, words are capitalized.
pub fn humanize_stem(stem: &str) -> String {
    stem.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    format!("{upper}{}", chars.collect::<String>())
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// First 12 hex chars of SHA-256 over the parts (unit-separator joined).
pub fn short_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0x1f]);
        }
        hasher.update(part.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Lowercase with whitespace runs collapsed to one space.
pub fn normalize_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lowercased word tokens.
pub fn words(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

pub fn word_count(text: &str) -> usize {
    WORD_RE.find_iter(text).count()
}

pub fn starts_upper_or_digit(text: &str) -> bool {
    text.trim_start()
        .chars()
        .next()
        .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
}

/// Ends in `.`, `!` or `?`, allowing closing quotes and brackets after it.
pub fn ends_with_terminal(text: &str) -> bool {
    text.trim_end()
        .trim_end_matches(['"', '\'', ')', ']', '\u{201d}'])
        .ends_with(['.', '!', '?'])
}

// ---------------------------------------------------------------------------
// Sentences and windows
// ---------------------------------------------------------------------------

/// Byte ranges of the sentences in `text`.
///
/// A sentence ends at `.`, `!` or `?` (plus trailing quotes, brackets, and
/// repeated terminators) followed by whitespace or end of text. Leftover text
/// without a terminator forms a final sentence.
pub fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        if start.is_none() {
            if c.is_whitespace() {
                continue;
            }
            start = Some(i);
        }
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = iter.peek() {
            if matches!(next, '"' | '\'' | ')' | ']' | '.' | '!' | '?' | '\u{201d}') {
                end = j + next.len_utf8();
                iter.next();
            } else {
                break;
            }
        }
        let at_boundary = iter.peek().is_none_or(|&(_, next)| next.is_whitespace());
        if at_boundary {
            if let Some(s) = start.take() {
                spans.push((s, end));
            }
        }
    }

    if let Some(s) = start {
        let end = text.trim_end().len();
        if end > s {
            spans.push((s, end));
        }
    }
    spans
}

/// Largest char boundary `<= idx`.
pub fn floor_boundary(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Smallest char boundary `>= idx`.
pub fn ceil_boundary(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// `text[start..end]` widened by `radius` bytes on each side.
pub fn window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let from = floor_boundary(text, start.saturating_sub(radius));
    let to = ceil_boundary(text, end.saturating_add(radius));
    &text[from..to]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("2020_Toyota Tacoma--AKL"), "2020-toyota-tacoma-akl");
        assert_eq!(slugify("  F-150 / P702 "), "f-150-p702");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn doc_ids_follow_relative_paths() {
        assert_eq!(
            doc_id_for(Path::new("2020_Toyota_Tacoma_AKL.txt")),
            "2020-toyota-tacoma-akl"
        );
        assert_eq!(
            doc_id_for(Path::new("guides/Ford F-150/PATS notes.md")),
            "guides/ford-f-150/pats-notes"
        );
        assert_eq!(doc_id_for(Path::new("")), "index");
    }

    #[test]
    fn humanize_keeps_year_ranges() {
        assert_eq!(humanize_stem("2020_Toyota_Tacoma_AKL"), "2020 Toyota Tacoma AKL");
        assert_eq!(humanize_stem("2021-2023_civic_im608"), "2021-2023 Civic Im608");
    }

    #[test]
    fn short_hash_is_stable_and_separated() {
        assert_eq!(short_hash(&["a", "b"]), short_hash(&["a", "b"]));
        assert_ne!(short_hash(&["ab", ""]), short_hash(&["a", "b"]));
        assert_eq!(short_hash(&["x"]).len(), 12);
    }

    #[test]
    fn sentences_split_on_terminators() {
        let text = "Insert the key. Wait 10 seconds!  Then press start (twice.) Done";
        let spans = sentence_spans(text);
        let sentences: Vec<&str> = spans.iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(
            sentences,
            vec!["Insert the key.", "Wait 10 seconds!", "Then press start (twice.)", "Done"]
        );
    }

    #[test]
    fn decimals_and_ellipses_do_not_split() {
        let text = "Set 433.92 MHz... then retry.";
        let spans = sentence_spans(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(&text[spans[0].0..spans[0].1], text);
    }

    #[test]
    fn terminal_and_case_checks() {
        assert!(ends_with_terminal("It works (mostly)."));
        assert!(ends_with_terminal("Really?\""));
        assert!(!ends_with_terminal("FCC ID | HYQ14FBA | 315 MHz"));
        assert!(starts_upper_or_digit("2 presses"));
        assert!(!starts_upper_or_digit("then press"));
    }

    #[test]
    fn window_respects_char_boundaries() {
        let text = "ééé BCM ééé";
        let start = text.find("BCM").expect("present");
        let w = window(text, start, start + 3, 3);
        assert!(w.contains("BCM"));
    }

    #[test]
    fn words_are_lowercased() {
        assert_eq!(words("Don't USE the OBD-II port"), vec!["don't", "use", "the", "obd-ii", "port"]);
        assert_eq!(word_count("FCC ID | HYQ14FBA | 315 MHz"), 5);
    }
}
