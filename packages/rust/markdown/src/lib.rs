//! Markup normalization for source documents.
//!
//! HTML is reduced to its content container, tables are flattened to pipe
//! rows, and the result is converted to Markdown with the `htmd` crate.
//! Markdown and plain text then go through the same cleanup passes and the
//! block parser, which yields normalized text plus structural metadata.

mod cleanup;
mod structure;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

use keypearls_shared::{Block, PearlError, Result, Section};

pub use structure::{Structured, parse_blocks};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Markup flavour of a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Html,
    Markdown,
    PlainText,
}

impl SourceFormat {
    /// Map a file extension to a format; `None` for unsupported files.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "html" | "htm" => Some(Self::Html),
            "md" | "markdown" => Some(Self::Markdown),
            "txt" | "text" => Some(Self::PlainText),
            _ => None,
        }
    }
}

/// Options for [`normalize`].
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub format: SourceFormat,
    /// Delimiter used to join table cells.
    pub table_delimiter: String,
}

/// A document reduced to plain text with structure kept as metadata.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// `<title>` or first H1, if the markup names one.
    pub title: Option<String>,
    pub text: String,
    pub blocks: Vec<Block>,
    pub sections: Vec<Section>,
    pub word_count: usize,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Normalize raw markup to text, blocks, and sections.
#[instrument(skip(raw), fields(format = ?opts.format, len = raw.len()))]
pub fn normalize(raw: &str, opts: &NormalizeOptions) -> Result<Normalized> {
    if raw.contains('\0') {
        return Err(PearlError::parse("document contains NUL bytes"));
    }

    let (markdown, html_title) = match opts.format {
        SourceFormat::Html => {
            let converted = convert_html(raw)?;
            (converted.markdown, converted.title)
        }
        SourceFormat::Markdown | SourceFormat::PlainText => (raw.to_string(), None),
    };

    let cleaned = cleanup::run_pipeline(&markdown);
    let structured = parse_blocks(&cleaned, &opts.table_delimiter);
    let word_count = count_words(&structured.text);

    debug!(
        blocks = structured.blocks.len(),
        sections = structured.sections.len(),
        word_count,
        "normalization complete"
    );

    Ok(Normalized {
        title: html_title.or(structured.h1),
        text: structured.text,
        blocks: structured.blocks,
        sections: structured.sections,
        word_count,
    })
}

// ---------------------------------------------------------------------------
// HTML → Markdown
// ---------------------------------------------------------------------------

/// Result of converting an HTML page to Markdown.
#[derive(Debug, Clone)]
pub struct ConvertResult {
    pub markdown: String,
    /// Text of `<title>` or the first `<h1>`.
    pub title: Option<String>,
}

/// Convert HTML to Markdown.
///
/// 1. Reads the page title
/// 2. Extracts the content HTML (strips nav/header/footer chrome)
/// 3. Flattens tables into pipe rows
/// 4. Converts HTML → Markdown via `htmd`
pub fn convert_html(html: &str) -> Result<ConvertResult> {
    let title = extract_title(html);
    let content_html = extract_content_html(html);
    let content_html = preprocess_tables(&content_html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec![
            "script", "style", "nav", "iframe", "noscript", "svg", "header", "footer",
        ])
        .build();

    let markdown = converter
        .convert(&content_html)
        .map_err(|e| PearlError::Conversion(format!("htmd conversion failed: {e}")))?;

    debug!(raw_len = markdown.len(), "htmd conversion complete");

    Ok(ConvertResult { markdown, title })
}

// ---------------------------------------------------------------------------
// Table pre-processing
// ---------------------------------------------------------------------------

/// Replace every `<table>` with one paragraph of `<br>`-separated pipe rows.
///
/// `htmd` 0.1 doesn't support table conversion, so rows are emitted as text
/// lines the block parser recognizes.
fn preprocess_tables(html: &str) -> String {
    let doc = Html::parse_fragment(html);

    let Ok(table_sel) = Selector::parse("table") else {
        return html.to_string();
    };

    if doc.select(&table_sel).next().is_none() {
        return html.to_string();
    }

    let mut result = html.to_string();

    for table_el in doc.select(&table_sel) {
        let table_html = table_el.html();
        let rows = html_table_rows(&table_el);
        let replacement = if rows.is_empty() {
            String::new()
        } else {
            let lines: Vec<String> = rows
                .iter()
                .map(|cells| format!("| {} |", cells.join(" | ")))
                .collect();
            format!("<p>{}</p>", escape_html(&lines.join("\n")).replace('\n', "<br>"))
        };
        result = result.replacen(&table_html, &replacement, 1);
    }

    result
}

/// Collect the trimmed cell text of every row; header cells first.
fn html_table_rows(table: &scraper::ElementRef) -> Vec<Vec<String>> {
    let (Ok(tr_sel), Ok(cell_sel)) = (Selector::parse("tr"), Selector::parse("th, td")) else {
        return Vec::new();
    };

    let mut rows: Vec<Vec<String>> = Vec::new();

    for tr in table.select(&tr_sel) {
        let cells: Vec<String> = tr
            .select(&cell_sel)
            .map(|cell| {
                cell.text()
                    .collect::<String>()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .replace('|', "/")
            })
            .collect();

        if cells.iter().any(|c| !c.is_empty()) {
            rows.push(cells);
        }
    }

    rows
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Extract the main content HTML, stripping chrome (nav, header, footer, etc.).
fn extract_content_html(html: &str) -> String {
    let doc = Html::parse_document(html);

    // Try known content containers in priority order
    let selectors = [
        "article .markdown",
        "[role=\"main\"]",
        "article",
        "main",
        ".content",
        "#content",
    ];

    for sel_str in &selectors {
        if let Ok(selector) = Selector::parse(sel_str) {
            if let Some(el) = doc.select(&selector).next() {
                return el.inner_html();
            }
        }
    }

    // Fallback: use <body> content
    if let Ok(body_sel) = Selector::parse("body") {
        if let Some(body) = doc.select(&body_sel).next() {
            return body.inner_html();
        }
    }

    // Last resort
    html.to_string()
}

/// `<title>` text, falling back to the first `<h1>`.
fn extract_title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    ["title", "h1"].iter().find_map(|sel_str| {
        let selector = Selector::parse(sel_str).ok()?;
        let el = doc.select(&selector).next()?;
        let text = el.text().collect::<String>();
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        (!text.is_empty()).then_some(text)
    })
}

/// Count words in the normalized text.
fn count_words(text: &str) -> usize {
    static WORD_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[A-Za-z0-9][A-Za-z0-9'\-]*").expect("valid regex"));

    WORD_RE.find_iter(text).count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
