//! Block parser: cleaned Markdown/plain text → normalized text plus
//! paragraph/list-item/table-row blocks and heading-delimited sections.
//!
//! Structure is kept as metadata (byte offsets into the rebuilt text), never
//! as inline markers.

use std::sync::LazyLock;

use regex::Regex;

use keypearls_shared::{Block, BlockKind, Section};

/// Output of [`parse_blocks`].
#[derive(Debug, Clone, PartialEq)]
pub struct Structured {
    pub text: String,
    pub blocks: Vec<Block>,
    pub sections: Vec<Section>,
    /// First level-1 heading, if any.
    pub h1: Option<String>,
}

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid regex"));
static LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:([-*+•])|(\d{1,3})[.)])\s+(.*\S)\s*$").expect("valid regex")
});
static TABLE_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\|?\s*:?-{3,}:?\s*(?:\|\s*:?-{3,}:?\s*)*\|?\s*$").expect("valid regex"));
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// One classified source line.
#[derive(Debug)]
enum Line<'a> {
    Heading(u8, &'a str),
    ListItem(Option<u32>, &'a str),
    TableRow(Vec<String>),
    TableSeparator,
    Text(&'a str),
}

fn classify_line(line: &str) -> Line<'_> {
    if let Some(caps) = HEADING_RE.captures(line) {
        let level = caps[1].len() as u8;
        let text = caps.get(2).map_or("", |m| m.as_str()).trim();
        return Line::Heading(level, text);
    }
    if TABLE_SEPARATOR_RE.is_match(line) && line.contains('-') {
        return Line::TableSeparator;
    }
    if let Some(cells) = split_table_row(line) {
        return Line::TableRow(cells);
    }
    if let Some(caps) = LIST_RE.captures(line) {
        let number = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
        let text = caps.get(3).map_or("", |m| m.as_str());
        return Line::ListItem(number, text);
    }
    Line::Text(line.trim())
}

/// Split a pipe-delimited line into at least two non-empty cells.
fn split_table_row(line: &str) -> Option<Vec<String>> {
    if !line.contains('|') {
        return None;
    }
    let trimmed = line.trim().trim_start_matches('|').trim_end_matches('|');
    let cells: Vec<String> = trimmed
        .split('|')
        .map(|c| collapse_spaces(c.trim()))
        .collect();
    let non_empty = cells.iter().filter(|c| !c.is_empty()).count();
    if non_empty < 2 {
        return None;
    }
    Some(cells)
}

fn collapse_spaces(s: &str) -> String {
    SPACES_RE.replace_all(s.trim(), " ").to_string()
}

/// A standalone short line reads as a heading in plain text: it starts with an
/// uppercase letter or digit, has no sentence punctuation, and is brief.
fn looks_like_plain_heading(line: &str) -> bool {
    let t = line.trim().trim_end_matches(':').trim_end();
    if t.is_empty() || t.chars().count() > 80 || t.split_whitespace().count() > 10 {
        return false;
    }
    if t.contains(':') || t.ends_with(['.', ',', ';', '!', '?']) {
        return false;
    }
    let Some(first) = t.chars().next() else {
        return false;
    };
    (first.is_uppercase() || first.is_ascii_digit()) && t.chars().any(char::is_alphabetic)
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

struct Builder<'d> {
    delimiter: &'d str,
    text: String,
    blocks: Vec<Block>,
    sections: Vec<Section>,
    h1: Option<String>,
}

impl<'d> Builder<'d> {
    fn new(delimiter: &'d str) -> Self {
        Self {
            delimiter,
            text: String::new(),
            blocks: Vec::new(),
            sections: vec![Section {
                index: 0,
                heading: None,
                level: 0,
                start: 0,
                end: 0,
                first_block: 0,
                block_count: 0,
            }],
            h1: None,
        }
    }

    /// Append a separator then `prefix` + `body`; returns the byte range of `body`.
    fn push_segment(&mut self, prefix: &str, body: &str) -> (usize, usize) {
        if !self.text.is_empty() {
            self.text.push_str("\n\n");
        }
        self.text.push_str(prefix);
        let start = self.text.len();
        self.text.push_str(body);
        (start, self.text.len())
    }

    fn heading(&mut self, level: u8, raw: &str) {
        let heading = collapse_spaces(raw.trim_end_matches(':'));
        if heading.is_empty() {
            return;
        }
        if level == 1 && self.h1.is_none() {
            self.h1 = Some(heading.clone());
        }
        self.close_section();
        let (start, _) = self.push_segment("", &heading);
        let index = self.sections.len();
        self.sections.push(Section {
            index,
            heading: Some(heading),
            level,
            start,
            end: self.text.len(),
            first_block: self.blocks.len(),
            block_count: 0,
        });
    }

    fn close_section(&mut self) {
        let end = self.text.len();
        if let Some(current) = self.sections.last_mut() {
            current.end = end;
        }
    }

    fn block(
        &mut self,
        kind: BlockKind,
        prefix: &str,
        body: &str,
        step_number: Option<u32>,
        table_header: Vec<String>,
    ) {
        let body = collapse_spaces(body);
        if body.is_empty() {
            return;
        }
        let (start, end) = self.push_segment(prefix, &body);
        let section = self.sections.len() - 1;
        self.blocks.push(Block {
            ordinal: self.blocks.len(),
            kind,
            text: body,
            start,
            end,
            section,
            step_number,
            table_header,
        });
        if let Some(current) = self.sections.last_mut() {
            current.block_count += 1;
        }
    }

    fn table(&mut self, rows: Vec<Vec<String>>, has_separator: bool) {
        let delimiter = self.delimiter;
        let join = |cells: &[String]| {
            cells
                .iter()
                .filter(|c| !c.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(delimiter)
        };

        if rows.len() == 1 && !has_separator {
            let row = join(&rows[0]);
            self.block(BlockKind::TableRow, "", &row, None, Vec::new());
            return;
        }

        let mut iter = rows.into_iter();
        let Some(header) = iter.next() else {
            return;
        };
        let header_text = join(&header);
        // The header row is part of the text but is not itself a block.
        self.push_segment("", &header_text);
        let header_cells: Vec<String> = header.into_iter().filter(|c| !c.is_empty()).collect();
        for row in iter {
            let row_text = join(&row);
            self.block(BlockKind::TableRow, "", &row_text, None, header_cells.clone());
        }
    }

    fn finish(mut self) -> Structured {
        self.close_section();
        self.text.push('\n');
        Structured {
            text: self.text,
            blocks: self.blocks,
            sections: self.sections,
            h1: self.h1,
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse cleaned text into blocks and sections.
///
/// Table cells are joined with `delimiter`.
pub fn parse_blocks(cleaned: &str, delimiter: &str) -> Structured {
    let mut builder = Builder::new(delimiter);

    for group in cleaned.split("\n\n") {
        let lines: Vec<&str> = group.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            continue;
        }
        parse_group(&mut builder, &lines);
    }

    builder.finish()
}

fn parse_group(builder: &mut Builder<'_>, lines: &[&str]) {
    let classified: Vec<Line<'_>> = lines.iter().map(|l| classify_line(l)).collect();

    // A lone short line, or a short line directly above a list/table, is a heading.
    let mut start = 0;
    if let Some(Line::Text(first)) = classified.first() {
        let followed_by_structure = classified.len() > 1
            && classified[1..]
                .iter()
                .all(|l| !matches!(l, Line::Text(_)));
        if (classified.len() == 1 || followed_by_structure) && looks_like_plain_heading(first) {
            builder.heading(2, first);
            start = 1;
        }
    }

    let mut paragraph: Vec<&str> = Vec::new();
    let mut item: Option<(Option<u32>, Vec<&str>)> = None;
    let mut table: Vec<Vec<String>> = Vec::new();
    let mut has_separator = false;

    let flush_paragraph = |builder: &mut Builder<'_>, paragraph: &mut Vec<&str>| {
        if !paragraph.is_empty() {
            let body = paragraph.join(" ");
            builder.block(BlockKind::Paragraph, "", &body, None, Vec::new());
            paragraph.clear();
        }
    };
    let flush_item = |builder: &mut Builder<'_>, item: &mut Option<(Option<u32>, Vec<&str>)>| {
        if let Some((number, parts)) = item.take() {
            let prefix = match number {
                Some(n) => format!("{n}. "),
                None => "- ".to_string(),
            };
            builder.block(BlockKind::ListItem, &prefix, &parts.join(" "), number, Vec::new());
        }
    };
    let flush_table =
        |builder: &mut Builder<'_>, table: &mut Vec<Vec<String>>, has_separator: &mut bool| {
            if !table.is_empty() {
                builder.table(std::mem::take(table), *has_separator);
                *has_separator = false;
            }
        };

    for line in classified.into_iter().skip(start) {
        match line {
            Line::Heading(level, text) => {
                flush_paragraph(builder, &mut paragraph);
                flush_item(builder, &mut item);
                flush_table(builder, &mut table, &mut has_separator);
                builder.heading(level, text);
            }
            Line::ListItem(number, text) => {
                flush_paragraph(builder, &mut paragraph);
                flush_item(builder, &mut item);
                flush_table(builder, &mut table, &mut has_separator);
                item = Some((number, vec![text]));
            }
            Line::TableRow(cells) => {
                flush_paragraph(builder, &mut paragraph);
                flush_item(builder, &mut item);
                table.push(cells);
            }
            Line::TableSeparator => {
                if table.is_empty() {
                    continue;
                }
                has_separator = true;
            }
            Line::Text(text) => {
                flush_table(builder, &mut table, &mut has_separator);
                // Continuation of a wrapped list item.
                if let Some((_, parts)) = item.as_mut() {
                    parts.push(text);
                } else {
                    paragraph.push(text);
                }
            }
        }
    }

    flush_paragraph(builder, &mut paragraph);
    flush_item(builder, &mut item);
    flush_table(builder, &mut table, &mut has_separator);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Structured {
        parse_blocks(input, " | ")
    }

    #[test]
    fn blocks_are_slices_of_text() {
        let s = parse("# Guide\n\nFirst paragraph\nwraps here.\n\n1. Insert key.\n2. Turn it.\n");
        assert_eq!(s.h1.as_deref(), Some("Guide"));
        assert_eq!(s.blocks.len(), 3);
        for block in &s.blocks {
            assert_eq!(&s.text[block.start..block.end], block.text);
        }
        assert_eq!(s.blocks[0].text, "First paragraph wraps here.");
        assert_eq!(s.blocks[1].kind, BlockKind::ListItem);
        assert_eq!(s.blocks[1].step_number, Some(1));
        assert_eq!(s.blocks[2].step_number, Some(2));
        assert!(s.text.contains("2. Turn it."));
    }

    #[test]
    fn plain_text_heading_opens_section() {
        let s = parse("All Keys Lost Procedure\n\n1. Connect the tool.\n2. Wait until the light blinks.\n");
        assert_eq!(s.sections.len(), 2);
        assert_eq!(s.sections[1].heading.as_deref(), Some("All Keys Lost Procedure"));
        assert_eq!(s.sections[1].block_count, 2);
        assert!(s.blocks.iter().all(|b| b.section == 1));
    }

    #[test]
    fn heading_directly_above_list() {
        let s = parse("Add Key Steps:\n1. Insert the working key.\n2. Press unlock twice.\n");
        assert_eq!(s.sections[1].heading.as_deref(), Some("Add Key Steps"));
        assert_eq!(s.blocks.len(), 2);
    }

    #[test]
    fn sentence_is_not_a_heading() {
        let s = parse("Always verify the VIN before ordering a replacement key.\n");
        assert_eq!(s.sections.len(), 1);
        assert_eq!(s.blocks.len(), 1);
    }

    #[test]
    fn table_rows_carry_header() {
        let s = parse("| Item | Part | Frequency |\n| --- | --- | --- |\n| FCC ID | HYQ14FBA | 315 MHz |\n");
        assert_eq!(s.blocks.len(), 1);
        let row = &s.blocks[0];
        assert_eq!(row.kind, BlockKind::TableRow);
        assert_eq!(row.text, "FCC ID | HYQ14FBA | 315 MHz");
        assert_eq!(row.table_header, vec!["Item", "Part", "Frequency"]);
        assert!(s.text.contains("Item | Part | Frequency"));
    }

    #[test]
    fn single_row_table_is_a_block() {
        let s = parse("FCC ID | HYQ14FBA | 315 MHz\n");
        assert_eq!(s.blocks.len(), 1);
        assert!(s.blocks[0].table_header.is_empty());
    }

    #[test]
    fn wrapped_list_item_continues() {
        let s = parse("- Remove the glovebox\n  to reach the immobilizer box.\n");
        assert_eq!(s.blocks.len(), 1);
        assert_eq!(s.blocks[0].text, "Remove the glovebox to reach the immobilizer box.");
        assert_eq!(s.blocks[0].step_number, None);
    }

    #[test]
    fn section_offsets_cover_blocks() {
        let s = parse("Intro text that is long enough.\n\n## Background\n\nThe BCM stores keys.\n\n## Steps\n\n1. Do it.\n");
        assert_eq!(s.sections.len(), 3);
        for section in &s.sections {
            for block in &s.blocks[section.first_block..section.first_block + section.block_count] {
                assert!(block.start >= section.start && block.end <= section.end);
            }
        }
    }
}
