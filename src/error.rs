use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::{BuildError, EmbeddingError};
use crate::index::{CacheError, DenseIndexError};
use crate::retrieval::SearchError;
use crate::store::StoreError;

/// Main error type for Jurisearch
#[derive(Error, Debug)]
pub enum JurisError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Document collection could not be loaded
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Dense index construction or lookup failed
    #[error(transparent)]
    DenseIndex(#[from] DenseIndexError),

    /// Sparse index cache could not be written or read
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Query encoder or model failure
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Offline embedding build failure
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Hybrid search failure
    #[error(transparent)]
    Search(#[from] SearchError),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for Jurisearch operations
pub type Result<T> = std::result::Result<T, JurisError>;
