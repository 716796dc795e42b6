//! Retrieval indexes built once from the document store
//!
//! - [`DenseIndex`]: exact cosine similarity over normalized embeddings
//! - [`SparseIndex`]: Okapi BM25 over lowercase whitespace tokens, with an
//!   on-disk cache (see [`cache`])

pub mod cache;
mod dense;
mod sparse;

pub use cache::CacheError;
pub use dense::{l2_normalize, DenseHit, DenseIndex, DenseIndexError};
pub use sparse::{tokenize, SparseHit, SparseIndex, BM25_B, BM25_EPSILON, BM25_K1};
