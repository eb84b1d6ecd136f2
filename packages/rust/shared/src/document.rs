//! Loaded documents and their structural metadata.

use serde::{Deserialize, Serialize};

use crate::types::{BlockKind, VehicleHint};

/// A structural block (paragraph, list item, or table row) of a document.
///
/// `start..end` is a byte range into [`Document::text`]; `text` is exactly
/// that slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position of the block within the document (0-based, source order).
    pub ordinal: usize,
    pub kind: BlockKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
    /// Index into [`Document::sections`].
    pub section: usize,
    /// Explicit number of an ordered list item (`3.` → 3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u32>,
    /// Header cells of the owning table (table rows only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub table_header: Vec<String>,
}

/// An inter-heading span. Section 0 holds any content before the first heading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    /// Heading level (1-6); 0 for the untitled preamble.
    pub level: u8,
    /// Byte offset of the heading (or section start) in the document text.
    pub start: usize,
    pub end: usize,
    pub first_block: usize,
    pub block_count: usize,
}

/// A normalized source document. Immutable once the loader emits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier derived from the input-relative path.
    pub id: String,
    /// Path relative to the input directory.
    pub source_path: String,
    pub title: String,
    /// Normalized plain text; every block is a slice of it.
    pub text: String,
    pub blocks: Vec<Block>,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub vehicle: VehicleHint,
    /// SHA-256 of the normalized text.
    pub content_hash: String,
}

impl Document {
    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    /// Blocks belonging to one section, in source order.
    pub fn section_blocks(&self, index: usize) -> &[Block] {
        match self.sections.get(index) {
            Some(s) => {
                let end = (s.first_block + s.block_count).min(self.blocks.len());
                let start = s.first_block.min(end);
                &self.blocks[start..end]
            }
            None => &[],
        }
    }

    /// Plain text of a section body (blocks joined by blank lines).
    pub fn section_text(&self, index: usize) -> String {
        self.section_blocks(index)
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(ordinal: usize, section: usize, text: &str) -> Block {
        Block {
            ordinal,
            kind: BlockKind::Paragraph,
            text: text.into(),
            start: 0,
            end: text.len(),
            section,
            step_number: None,
            table_header: vec![],
        }
    }

    #[test]
    fn section_blocks_are_bounded() {
        let doc = Document {
            id: "doc".into(),
            source_path: "doc.txt".into(),
            title: "Doc".into(),
            text: String::new(),
            blocks: vec![block(0, 0, "a"), block(1, 1, "b"), block(2, 1, "c")],
            sections: vec![
                Section {
                    index: 0,
                    heading: None,
                    level: 0,
                    start: 0,
                    end: 1,
                    first_block: 0,
                    block_count: 1,
                },
                Section {
                    index: 1,
                    heading: Some("Steps".into()),
                    level: 2,
                    start: 1,
                    end: 3,
                    first_block: 1,
                    block_count: 2,
                },
            ],
            vehicle: VehicleHint::default(),
            content_hash: String::new(),
        };

        assert_eq!(doc.section_blocks(1).len(), 2);
        assert_eq!(doc.section_text(1), "b\n\nc");
        assert!(doc.section_blocks(7).is_empty());
    }
}
