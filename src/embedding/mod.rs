//! Embedding generation
//!
//! - [`EmbeddingProvider`] trait: the query encoder used at search time
//! - [`FastEmbedProvider`]: local sentence-embedding models via fastembed
//! - [`EmbeddingBuilder`]: offline batch job that embeds a raw collection and
//!   writes the directory the document store loads

mod builder;
mod provider;

pub use builder::{
    read_records, validate_text_column, write_collection, BuildError, BuildReport,
    BuilderOptions, EmbeddingBuilder, Record,
};
pub use provider::{
    EmbeddingError, EmbeddingProvider, FastEmbedProvider, DEFAULT_MODEL, SUPPORTED_MODELS,
};
