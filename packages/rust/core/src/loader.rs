//! Loader: turns an input directory into normalized [`Document`]s.
//!
//! Files are discovered recursively in sorted order so document ids and
//! ordering are stable across runs. A file that cannot be read or parsed is
//! logged and skipped; it never aborts the corpus.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use keypearls_lexicon::Lexicon;
use keypearls_markdown::{NormalizeOptions, SourceFormat, normalize};
use keypearls_shared::{Document, ExtractConfig, PearlError, Result, VehicleHint, YearSource};

use crate::text;

/// How much of the body is searched for a platform codename.
const CODENAME_SCAN_BYTES: usize = 2000;

/// Year ranges wider than this are treated as two unrelated years.
const MAX_YEAR_SPAN: u16 = 30;

static YEAR_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:19|20)\d{2})\s*[-–]\s*((?:19|20)\d{2}|\d{2})\b").expect("valid regex")
});

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid regex"));

/// Documents produced from one input directory.
#[derive(Debug)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    /// Supported files found, including the ones that failed to load.
    pub discovered: usize,
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Every supported file under `root`, recursively, in sorted path order.
/// Hidden files and directories are skipped.
pub fn discover_inputs(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(PearlError::config(format!(
            "input directory {} does not exist",
            root.display()
        )));
    }
    let mut found = Vec::new();
    walk(root, &mut found)?;
    Ok(found)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| PearlError::io(dir, e))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with('.'))
        })
        .collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            walk(&path, out)?;
        } else if format_of(&path).is_some() {
            out.push(path);
        }
    }
    Ok(())
}

fn format_of(path: &Path) -> Option<SourceFormat> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(SourceFormat::from_extension)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load every supported document under `root`.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn load_corpus(root: &Path, lexicon: &Lexicon, extract: &ExtractConfig) -> Result<LoadOutcome> {
    let paths = discover_inputs(root)?;
    debug!(files = paths.len(), "discovered input files");

    let mut documents: Vec<Document> = paths
        .par_iter()
        .filter_map(|path| match load_document(root, path, lexicon, extract) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load document, skipping");
                None
            }
        })
        .collect();

    assign_unique_ids(&mut documents);

    Ok(LoadOutcome {
        documents,
        discovered: paths.len(),
    })
}

/// Read and normalize one file.
pub fn load_document(
    root: &Path,
    path: &Path,
    lexicon: &Lexicon,
    extract: &ExtractConfig,
) -> Result<Document> {
    let format = format_of(path).ok_or_else(|| {
        PearlError::parse(format!("{} has an unsupported extension", path.display()))
    })?;
    let bytes = std::fs::read(path).map_err(|e| PearlError::io(path, e))?;
    let raw = String::from_utf8(bytes)
        .map_err(|_| PearlError::parse(format!("{} is not valid UTF-8", path.display())))?;

    let relative = path.strip_prefix(root).unwrap_or(path);
    let relative = relative.to_string_lossy().replace('\\', "/");
    build_document(&relative, &raw, format, lexicon, extract)
}

/// Normalize raw markup into a [`Document`]. `relative` is the
/// input-relative path with `/` separators.
pub fn build_document(
    relative: &str,
    raw: &str,
    format: SourceFormat,
    lexicon: &Lexicon,
    extract: &ExtractConfig,
) -> Result<Document> {
    let opts = NormalizeOptions {
        format,
        table_delimiter: extract.table_delimiter.clone(),
    };
    let normalized = normalize(raw, &opts)?;

    let stem = Path::new(relative)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = normalized
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| text::humanize_stem(&stem));
    let vehicle = infer_vehicle(&stem, &title, &normalized.text, lexicon);

    let content_hash = format!("{:x}", Sha256::digest(normalized.text.as_bytes()));

    debug!(
        path = relative,
        blocks = normalized.blocks.len(),
        make = vehicle.make.as_deref().unwrap_or("-"),
        "document normalized"
    );

    Ok(Document {
        id: text::doc_id_for(Path::new(relative)),
        source_path: relative.to_string(),
        title,
        text: normalized.text,
        blocks: normalized.blocks,
        sections: normalized.sections,
        vehicle,
        content_hash,
    })
}

/// Disambiguate ids that collide after slugging (`a.md` and `a.txt`).
fn assign_unique_ids(documents: &mut [Document]) {
    let mut seen = std::collections::HashSet::new();
    for doc in documents.iter_mut() {
        if seen.insert(doc.id.clone()) {
            continue;
        }
        let mut n = 2;
        let id = loop {
            let candidate = format!("{}-{n}", doc.id);
            if !seen.contains(&candidate) {
                break candidate;
            }
            n += 1;
        };
        warn!(path = %doc.source_path, from = %doc.id, to = %id, "document id collision");
        seen.insert(id.clone());
        doc.id = id;
    }
}

// ---------------------------------------------------------------------------
// Vehicle inference
// ---------------------------------------------------------------------------

/// Coarse make/model/year guess from the file name, title, and the head of
/// the body. A codename hit is authoritative over bare year tokens. A
/// codename found only in the body never overrides a make or model named in
/// the file name or title; it contributes its years when it agrees with them.
pub fn infer_vehicle(stem: &str, title: &str, body: &str, lexicon: &Lexicon) -> VehicleHint {
    let name_and_title = format!("{} {title}", stem.replace('_', " "));
    let head = &body[..text::floor_boundary(body, CODENAME_SCAN_BYTES)];
    let mut hint = VehicleHint::default();

    if let Some(code) = lexicon.find_codename(&name_and_title) {
        hint.make = Some(code.make.clone());
        hint.model = Some(code.model.clone());
        hint.year_start = Some(code.start);
        hint.year_end = Some(code.end);
        hint.year_source = YearSource::Codename;
        return hint;
    }

    let models = lexicon.models_in(&name_and_title);
    hint.make = lexicon
        .first_make(&name_and_title)
        .or_else(|| models.first().map(|&(make, _)| make))
        .map(str::to_string);
    hint.model = models
        .iter()
        .find(|&&(make, _)| hint.make.as_deref() == Some(make))
        .map(|&(_, model)| model.to_string());

    if let Some(code) = lexicon.find_codename(head) {
        let named = hint.make.is_some() || hint.model.is_some();
        let agrees = hint.make.as_deref() == Some(code.make.as_str())
            && hint.model.as_deref().is_none_or(|m| m == code.model);
        if !named || agrees {
            hint.make = Some(code.make.clone());
            hint.model = Some(code.model.clone());
            hint.year_start = Some(code.start);
            hint.year_end = Some(code.end);
            hint.year_source = YearSource::Codename;
            return hint;
        }
        debug!(code = %code.code, make = ?hint.make, "body codename disagrees with file name, ignored");
    }

    if let Some((start, end)) = year_span(&name_and_title) {
        hint.year_start = Some(start);
        hint.year_end = Some(end);
        hint.year_source = YearSource::YearToken;
    }
    hint
}

/// First year range ("2019-2021", "2019-21") or lone year in `text`.
fn year_span(text: &str) -> Option<(u16, u16)> {
    if let Some(caps) = YEAR_RANGE_RE.captures(text) {
        let start: Option<u16> = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let end: Option<u16> = caps.get(2).and_then(|m| {
            let raw = m.as_str();
            let value: u16 = raw.parse().ok()?;
            if raw.len() == 2 {
                start.map(|s| s / 100 * 100 + value)
            } else {
                Some(value)
            }
        });
        if let (Some(start), Some(end)) = (start, end) {
            if end >= start && end - start <= MAX_YEAR_SPAN {
                return Some((start, end));
            }
        }
    }

    YEAR_RE
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
        .map(|year| (year, year))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
