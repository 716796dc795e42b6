//! Jurisearch - hybrid case-law retrieval
//!
//! Combines exact cosine-similarity search over precomputed sentence embeddings
//! with Okapi BM25 keyword scoring, fusing both into one ranked result list over
//! a static, in-memory document collection.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod retrieval;
pub mod store;

pub use error::{JurisError, Result};
