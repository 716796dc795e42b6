//! Ranked search results

use crate::store::Document;
use serde::{Deserialize, Serialize};

/// Marker appended to every non-empty snippet
pub const SNIPPET_ELLIPSIS: &str = "...";

/// A document returned by a hybrid query, with its scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub id: String,
    pub title: String,
    pub state: String,
    pub citation: String,

    /// Bounded prefix of the document text
    pub snippet: String,

    /// Full document text
    pub document: String,

    /// Raw cosine similarity (0.0 when the dense pool missed this document)
    pub dense_score: f32,

    /// Raw BM25 score (0.0 when the sparse pool missed this document)
    pub bm25_score: f64,

    /// Weighted sum of the normalized scores; results are ordered by this
    pub combined_score: f64,
}

impl RankedResult {
    pub fn from_document(
        document: &Document,
        snippet_chars: usize,
        dense_score: f32,
        bm25_score: f64,
        combined_score: f64,
    ) -> Self {
        Self {
            id: document.id.clone(),
            title: document.title.clone(),
            state: document.state.clone(),
            citation: document.citation.clone(),
            snippet: snippet(&document.document, snippet_chars),
            document: document.document.clone(),
            dense_score,
            bm25_score,
            combined_score,
        }
    }
}

/// First `max_chars` characters of `text` followed by [`SNIPPET_ELLIPSIS`]
///
/// Counts characters, not bytes, so multi-byte text is never split. Empty
/// text yields an empty snippet.
pub fn snippet(text: &str, max_chars: usize) -> String {
    if text.is_empty() {
        return String::new();
    }
    let end = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(idx, _)| idx);
    format!("{}{}", &text[..end], SNIPPET_ELLIPSIS)
}
