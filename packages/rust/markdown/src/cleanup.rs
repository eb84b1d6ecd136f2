//! Cleanup pipeline that reduces Markdown to structure-bearing plain text.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! Headings, list markers, and pipe tables survive (the block parser reads
//! them); inline markup, links, stray HTML, and code fences do not.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on raw Markdown text.
pub(crate) fn run_pipeline(md: &str) -> String {
    let mut result = md.replace("\r\n", "\n").replace('\r', "\n");

    result = normalize_headings(&result);
    result = clean_blank_lines(&result);
    result = strip_code_fences(&result);
    result = strip_leftover_html(&result);
    result = unwrap_links(&result);
    result = strip_inline_markup(&result);
    result = normalize_whitespace(&result);
    result = ensure_trailing_newline(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Normalize heading levels
// ---------------------------------------------------------------------------

/// Ensure there's at most one H1, and heading hierarchy is proper.
fn normalize_headings(md: &str) -> String {
    static H_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*\s*$").expect("valid regex"));

    let mut h1_count = 0;
    let mut lines: Vec<String> = Vec::new();

    for line in md.lines() {
        if let Some(caps) = H_RE.captures(line) {
            let hashes = &caps[1];
            let text = &caps[2];

            if hashes == "#" {
                h1_count += 1;
                if h1_count > 1 {
                    // Demote duplicate H1s to H2
                    lines.push(format!("## {text}"));
                    continue;
                }
            }
            lines.push(format!("{hashes} {text}"));
        } else {
            lines.push(line.to_string());
        }
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Clean up excessive blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ blank lines into exactly 2.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{4,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Drop code fences (keep their content as plain lines)
// ---------------------------------------------------------------------------

fn strip_code_fences(md: &str) -> String {
    md.lines()
        .filter(|line| {
            let t = line.trim_start();
            !(t.starts_with("```") || t.starts_with("~~~"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 4: Strip leftover HTML tags
// ---------------------------------------------------------------------------

/// Remove stray HTML tags that survived the conversion, keeping inner text.
fn strip_leftover_html(md: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|details|summary|p|br|b|i|u|strong|em|font|sup|sub|small|mark|a)(?:\s[^>]*)?/?>")
            .expect("valid regex")
    });

    HTML_TAG_RE.replace_all(md, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: Unwrap links and images
// ---------------------------------------------------------------------------

/// `[text](url)` becomes `text`; images are dropped entirely.
fn unwrap_links(md: &str) -> String {
    static IMAGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));

    let without_images = IMAGE_RE.replace_all(md, "");
    LINK_RE.replace_all(&without_images, "$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 6: Strip inline emphasis, code spans, and escapes
// ---------------------------------------------------------------------------

fn strip_inline_markup(md: &str) -> String {
    static EMPHASIS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\*\*|__)(\S(?:.*?\S)?)(\*\*|__)").expect("valid regex"));
    static CODE_SPAN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));
    static ESCAPE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\\([\\`*_{}\[\]()#+\-.!>|])").expect("valid regex"));

    let result = EMPHASIS_RE.replace_all(md, "$2");
    let result = CODE_SPAN_RE.replace_all(&result, "$1");
    ESCAPE_RE.replace_all(&result, "$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 7: Normalize whitespace
// ---------------------------------------------------------------------------

/// Clean up trailing whitespace, backslash hard breaks, and non-breaking spaces.
fn normalize_whitespace(md: &str) -> String {
    md.lines()
        .map(|line| {
            line.replace('\u{a0}', " ")
                .trim_end()
                .trim_end_matches('\\')
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 8: Ensure trailing newline
// ---------------------------------------------------------------------------

/// Ensure the text ends with exactly one newline.
fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_end_matches('\n');
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_headings_demotes_duplicate_h1() {
        let input = "# Title\n\nSome text\n\n# Another Title\n\nMore text";
        let result = normalize_headings(input);
        assert_eq!(result, "# Title\n\nSome text\n\n## Another Title\n\nMore text");
    }

    #[test]
    fn normalize_headings_strips_closing_hashes() {
        let result = normalize_headings("## Add Key ##");
        assert_eq!(result, "## Add Key");
    }

    #[test]
    fn clean_blank_lines_collapses_excess() {
        let input = "Line 1\n\n\n\n\nLine 2";
        let result = clean_blank_lines(input);
        assert_eq!(result, "Line 1\n\n\nLine 2");
    }

    #[test]
    fn strip_code_fences_keeps_content() {
        let input = "Before\n```\nread eeprom\n```\nAfter";
        assert_eq!(strip_code_fences(input), "Before\nread eeprom\nAfter");
    }

    #[test]
    fn strip_leftover_html_removes_inline_tags() {
        let input = "<div class=\"note\">Use the <strong>Autel</strong> tablet</div>";
        let result = strip_leftover_html(input);
        assert_eq!(result, "Use the Autel tablet");
    }

    #[test]
    fn unwrap_links_keeps_text() {
        let input = "See [the FCC listing](https://fccid.io/HYQ14FBA) and ![fob](fob.png) here";
        assert_eq!(unwrap_links(input), "See the FCC listing and  here");
    }

    #[test]
    fn strip_inline_markup_removes_emphasis_and_escapes() {
        let input = "**Warning:** do not use `OBD` power\\. Step 1\\.";
        assert_eq!(
            strip_inline_markup(input),
            "Warning: do not use OBD power. Step 1."
        );
    }

    #[test]
    fn normalize_whitespace_trims_trailing() {
        let input = "Line 1   \nLine 2\t\\\nLine\u{a0}3";
        let result = normalize_whitespace(input);
        assert_eq!(result, "Line 1\nLine 2\nLine 3");
    }

    #[test]
    fn ensure_trailing_newline_normalizes_multiple() {
        assert_eq!(ensure_trailing_newline("Content\n\n\n"), "Content\n");
        assert_eq!(ensure_trailing_newline("Content"), "Content\n");
    }

    #[test]
    fn full_pipeline_cleans_markdown() {
        let input = "# Title\r\n\n\n\n\n\n## Section\n\n<div>Some **bold** content</div>\n\n```\ncode\n```\n\nEnd";
        let result = run_pipeline(input);

        assert!(!result.contains("\n\n\n\n"));
        assert!(!result.contains("```"));
        assert!(!result.contains("<div>"));
        assert!(result.contains("Some bold content"));
        assert!(!result.contains('\r'));
        assert!(result.ends_with('\n'));
    }
}
