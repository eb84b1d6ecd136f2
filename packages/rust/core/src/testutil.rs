//! Fixtures shared by the stage unit tests.

use std::sync::LazyLock;

use keypearls_lexicon::Lexicon;
use keypearls_markdown::SourceFormat;
use keypearls_shared::{
    BlockKind, CandidateUnit, Category, Document, ExtractConfig, ScoreFlags, ScoredUnit,
    SourceRef, SubScores, Tier, VehicleHint,
};

use crate::loader::build_document;

static LEXICON: LazyLock<Lexicon> =
    LazyLock::new(|| Lexicon::builtin().expect("built-in lexicon compiles"));

pub(crate) fn lexicon() -> &'static Lexicon {
    &LEXICON
}

pub(crate) fn plain_doc(relative: &str, raw: &str) -> Document {
    build_document(relative, raw, SourceFormat::PlainText, lexicon(), &ExtractConfig::default())
        .expect("plain document builds")
}

pub(crate) fn markdown_doc(relative: &str, raw: &str) -> Document {
    build_document(relative, raw, SourceFormat::Markdown, lexicon(), &ExtractConfig::default())
        .expect("markdown document builds")
}

/// A paragraph candidate whose snippet and paragraph are both `text`.
pub(crate) fn candidate(doc_id: &str, ordinal: usize, text: &str) -> CandidateUnit {
    CandidateUnit {
        id: format!("{doc_id}#{ordinal}"),
        source: SourceRef {
            doc_id: doc_id.into(),
            source_path: format!("{doc_id}.txt"),
            source_title: doc_id.into(),
            section_index: 0,
            block_ordinal: ordinal,
            step_number: None,
            vehicle: VehicleHint::default(),
        },
        category: Category::Procedure,
        block_kind: BlockKind::Paragraph,
        snippet: text.into(),
        paragraph: text.into(),
        heading: None,
        tags: Vec::new(),
        match_weight: 1,
        provenance_hash: String::new(),
    }
}

pub(crate) fn scored(candidate: CandidateUnit, score: f64, tier: Tier) -> ScoredUnit {
    ScoredUnit {
        candidate,
        sub_scores: SubScores::default(),
        flags: ScoreFlags::default(),
        score,
        tier,
        reject_reason: None,
    }
}
