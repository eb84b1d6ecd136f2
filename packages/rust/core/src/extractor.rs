//! Extractor: cuts candidate units out of document blocks.
//!
//! A block becomes a candidate when any category pattern matches it, or when
//! it is a row of a table whose header names a domain keyword. The snippet is
//! the sentence holding the strongest match, widened until it can stand alone.

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::{debug, instrument};

use keypearls_lexicon::Lexicon;
use keypearls_shared::{
    Block, BlockKind, CandidateUnit, Category, Document, ExtractConfig, SourceRef,
};

use crate::text;

/// A snippet shorter than this absorbs the following sentence.
const SNIPPET_MIN_CHARS: usize = 40;

/// Extract candidates from every document, in document then block order.
#[instrument(skip_all, fields(documents = docs.len()))]
pub fn extract_all(docs: &[Document], lexicon: &Lexicon, extract: &ExtractConfig) -> Vec<CandidateUnit> {
    docs.par_iter()
        .flat_map_iter(|doc| extract_document(doc, lexicon, extract))
        .collect()
}

/// Extract candidates from one document.
///
/// Blocks below `min_block_chars` are ignored, and a block whose normalized
/// text repeats an earlier block of the same document is dropped.
pub fn extract_document(doc: &Document, lexicon: &Lexicon, extract: &ExtractConfig) -> Vec<CandidateUnit> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for block in &doc.blocks {
        if block.text.chars().count() < extract.min_block_chars {
            continue;
        }
        if !seen.insert(text::normalize_key(&block.text)) {
            debug!(doc = %doc.id, ordinal = block.ordinal, "duplicate block in document, skipping");
            continue;
        }

        let keyword_row =
            block.kind == BlockKind::TableRow && lexicon.is_keyword_table(&block.table_header);
        let (category, match_weight, anchor) = match lexicon.categorize(&block.text) {
            Some(m) => (m.category, m.weight, m.anchor),
            None if keyword_row => (Category::HardwareSpec, 0, (0, block.text.len())),
            None => continue,
        };

        let snippet = match block.kind {
            BlockKind::TableRow => block.text.clone(),
            _ => snippet_around(&block.text, anchor),
        };
        let heading = doc
            .section(block.section)
            .and_then(|s| s.heading.clone());
        let tags = tags_for(block, heading.as_deref(), lexicon);

        out.push(CandidateUnit {
            id: format!("{}#{}", doc.id, block.ordinal),
            source: SourceRef {
                doc_id: doc.id.clone(),
                source_path: doc.source_path.clone(),
                source_title: doc.title.clone(),
                section_index: block.section,
                block_ordinal: block.ordinal,
                step_number: block.step_number,
                vehicle: doc.vehicle.clone(),
            },
            category,
            block_kind: block.kind,
            snippet,
            paragraph: block.text.clone(),
            heading,
            tags,
            match_weight,
            provenance_hash: text::short_hash(&[
                &doc.id,
                &block.ordinal.to_string(),
                &block.text,
            ]),
        });
    }

    debug!(doc = %doc.id, blocks = doc.blocks.len(), candidates = out.len(), "document extracted");
    out
}

/// The sentence containing `anchor`, extended forward while it is shorter
/// than [`SNIPPET_MIN_CHARS`]. Always a slice of `paragraph`.
fn snippet_around(paragraph: &str, anchor: (usize, usize)) -> String {
    let spans = text::sentence_spans(paragraph);
    let Some(idx) = spans
        .iter()
        .position(|&(_, end)| anchor.0 < end)
        .or(spans.len().checked_sub(1))
    else {
        return paragraph.trim().to_string();
    };

    let (start, mut end) = spans[idx];
    for &(_, next_end) in &spans[idx + 1..] {
        if paragraph[start..end].chars().count() >= SNIPPET_MIN_CHARS {
            break;
        }
        end = next_end;
    }
    paragraph[start..end].to_string()
}

fn tags_for(block: &Block, heading: Option<&str>, lexicon: &Lexicon) -> Vec<String> {
    let scope = match heading {
        Some(h) => format!("{h}\n{}", block.text),
        None => block.text.clone(),
    };

    let mut tags: Vec<String> = lexicon
        .year_make_pairs(&scope)
        .into_iter()
        .map(|(year, make)| format!("vehicle:{year}:{}", text::slugify(make)))
        .collect();
    tags.extend(
        lexicon
            .tools_in(&block.text)
            .into_iter()
            .map(|tool| format!("tool:{}", text::slugify(tool))),
    );
    if block.kind == BlockKind::TableRow {
        tags.push("table-row".to_string());
    }
    if block.step_number.is_some() {
        tags.push("step".to_string());
    }
    tags
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{lexicon, markdown_doc, plain_doc};
    use pretty_assertions::assert_eq;

    #[test]
    fn snippet_is_the_anchor_sentence() {
        let paragraph = "The Tacoma uses a Smart Key ECU behind the glovebox. \
                         Program keys with the IM608 through the OBD-II port.";
        let anchor = paragraph.find("IM608").expect("anchor");
        let snippet = snippet_around(paragraph, (anchor, anchor + 5));
        assert_eq!(snippet, "Program keys with the IM608 through the OBD-II port.");
    }

    #[test]
    fn short_snippet_absorbs_next_sentence() {
        let paragraph = "Warning. Do not disconnect the battery during programming.";
        let snippet = snippet_around(paragraph, (0, 7));
        assert_eq!(snippet, paragraph);
    }

    #[test]
    fn candidates_keep_provenance() {
        let doc = markdown_doc(
            "guides/2020_Toyota_Tacoma.md",
            "# 2020 Toyota Tacoma\n\n## All Keys Lost Procedure\n\n\
             1. Connect the Autel IM608 to the OBD-II port and select Toyota.\n\
             2. Wait until the security light stops blinking, then turn the ignition off.\n",
        );
        let candidates = extract_document(&doc, lexicon(), &ExtractConfig::default());
        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert!(first.id.starts_with("guides/2020-toyota-tacoma#"));
        assert_eq!(first.source.step_number, Some(1));
        assert_eq!(first.heading.as_deref(), Some("All Keys Lost Procedure"));
        assert!(first.tags.contains(&"tool:autel-im608".to_string()));
        assert!(first.tags.contains(&"step".to_string()));
        assert_eq!(first.source.vehicle.make.as_deref(), Some("Toyota"));

        for c in &candidates {
            assert!(c.paragraph.contains(&c.snippet));
            assert!(doc.text.contains(&c.paragraph));
        }
    }

    #[test]
    fn short_and_repeated_blocks_are_skipped() {
        let doc = plain_doc(
            "dupes.txt",
            "Tip\n\n\
             Always verify the VIN before ordering a replacement key.\n\n\
             Always  verify the VIN before ordering a replacement key.\n\n\
             Check it.\n",
        );
        let candidates = extract_document(&doc, lexicon(), &ExtractConfig::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].category, Category::Pitfall);
    }

    #[test]
    fn unmatched_prose_is_not_a_candidate() {
        let doc = plain_doc(
            "prose.txt",
            "The weather was pleasant on the afternoon of the open house event.\n",
        );
        assert!(extract_document(&doc, lexicon(), &ExtractConfig::default()).is_empty());
    }

    #[test]
    fn keyword_table_rows_are_structured() {
        let doc = markdown_doc(
            "fobs.md",
            "## Remotes\n\n| Item | Part | Frequency |\n|---|---|---|\n| FCC ID | HYQ14FBA | 315 MHz |\n",
        );
        let candidates = extract_document(&doc, lexicon(), &ExtractConfig::default());
        assert_eq!(candidates.len(), 1);
        let row = &candidates[0];
        assert_eq!(row.block_kind, BlockKind::TableRow);
        assert_eq!(row.snippet, "FCC ID | HYQ14FBA | 315 MHz");
        assert_eq!(row.category, Category::HardwareSpec);
        assert!(row.tags.contains(&"table-row".to_string()));
    }

    #[test]
    fn year_make_tags_come_from_heading_and_text() {
        let doc = markdown_doc(
            "fit.md",
            "## 2019 Honda Accord\n\nThe 2019 Honda Accord needs a dealer PIN code, then the new key is programmed.\n",
        );
        let candidates = extract_document(&doc, lexicon(), &ExtractConfig::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].tags, vec!["vehicle:2019:honda".to_string()]);
    }
}
