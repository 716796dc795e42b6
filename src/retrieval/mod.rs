//! Hybrid retrieval
//!
//! Dense and BM25 candidate pools are retrieved independently, fused with a
//! weighted sum of min-max normalized scores, and materialized into
//! [`RankedResult`]s.

mod fusion;
mod hybrid;
mod result;

pub use fusion::{fuse, min_max_normalize, Candidate, FusionError, FusionWeights};
pub use hybrid::{HybridSearcher, SearchError};
pub use result::{snippet, RankedResult, SNIPPET_ELLIPSIS};

use serde::{Deserialize, Serialize};

/// A single hybrid query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query text
    pub text: String,

    /// Maximum number of results
    pub top_k: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, top_k: usize) -> Self {
        Self {
            text: text.into(),
            top_k,
        }
    }
}
