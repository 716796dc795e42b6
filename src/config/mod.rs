//! Configuration management for Jurisearch
//!
//! TOML file with environment overrides (`JURISEARCH_SECTION__KEY=value`) and
//! named profiles. Every loaded configuration passes [`ConfigValidator`].

use crate::error::{JurisError, Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";
const ENV_PREFIX: &str = "JURISEARCH_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub dataset: DatasetConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Where the embedded collection lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Collection directory produced by `build-embeddings`
    pub path: PathBuf,
    /// BM25 cache file name, resolved inside the collection directory
    pub cache_file: String,
}

impl DatasetConfig {
    pub fn cache_path(&self) -> PathBuf {
        self.path.join(&self.cache_file)
    }
}

/// Embedding model settings (query encoder and offline builder)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
    pub text_column: String,
}

/// Hybrid ranking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Weight of the normalized cosine similarity
    pub dense_weight: f64,
    /// Weight of the normalized BM25 score
    pub sparse_weight: f64,
    /// Lower bound on each modality's candidate pool
    pub min_candidate_pool: usize,
    /// Pool size is at least `candidate_multiplier * top_k`
    pub candidate_multiplier: usize,
    /// Characters of text kept in a result snippet
    pub snippet_chars: usize,
    pub default_top_k: usize,
    /// Per-query timeout applied by the CLI; 0 disables it
    #[serde(default)]
    pub timeout_secs: u64,
}

impl SearchConfig {
    /// Candidate pool size for a request of `top_k` results
    pub fn pool_size(&self, top_k: usize) -> usize {
        self.min_candidate_pool
            .max(top_k.saturating_mul(self.candidate_multiplier))
    }

    /// Check the tuning values, reporting every problem at once
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (path, weight) in [
            ("search.dense_weight", self.dense_weight),
            ("search.sparse_weight", self.sparse_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                errors.push(ValidationError::new(
                    path,
                    format!("Weight must be a finite, non-negative number, got {}", weight),
                ));
            }
        }

        if self.dense_weight == 0.0 && self.sparse_weight == 0.0 {
            errors.push(ValidationError::new(
                "search",
                "At least one of dense_weight and sparse_weight must be positive",
            ));
        }

        for (path, value, what) in [
            ("search.min_candidate_pool", self.min_candidate_pool, "Candidate pool"),
            ("search.candidate_multiplier", self.candidate_multiplier, "Candidate multiplier"),
            ("search.snippet_chars", self.snippet_chars, "Snippet length"),
            ("search.default_top_k", self.default_top_k, "Default top_k"),
        ] {
            if value == 0 {
                errors.push(ValidationError::new(
                    path,
                    format!("{} must be greater than 0", what),
                ));
            }
        }

        errors
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            dense_weight: 0.7,
            sparse_weight: 0.3,
            min_candidate_pool: 50,
            candidate_multiplier: 2,
            snippet_chars: 200,
            default_top_k: 5,
            timeout_secs: 0,
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dense_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparse_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(JurisError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| JurisError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;

        Self::from_toml(&content)
    }

    /// Parse, apply environment overrides and validate
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| JurisError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| JurisError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(weight) = overrides.dense_weight {
            self.search.dense_weight = weight;
        }
        if let Some(weight) = overrides.sparse_weight {
            self.search.sparse_weight = weight;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }

        ConfigValidator::validate(self)
    }

    /// Apply environment variable overrides
    /// Environment variables in format: JURISEARCH_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        let vars: Vec<(String, String)> = std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect();
        self.apply_overrides(vars);
    }

    /// Apply `SECTION__KEY` style overrides from an iterator of pairs
    pub fn apply_overrides<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            let config_key = key.strip_prefix(ENV_PREFIX).unwrap_or(key);
            if let Err(e) = self.set_value_from_env(config_key, value.as_ref()) {
                tracing::warn!("Failed to apply env override {}: {}", key, e);
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "DATASET__PATH" => self.dataset.path = PathBuf::from(value),
            "DATASET__CACHE_FILE" => self.dataset.cache_file = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__BATCH_SIZE" => self.embedding.batch_size = parse(path, value)?,
            "EMBEDDING__TEXT_COLUMN" => self.embedding.text_column = value.to_string(),
            "SEARCH__DENSE_WEIGHT" => self.search.dense_weight = parse(path, value)?,
            "SEARCH__SPARSE_WEIGHT" => self.search.sparse_weight = parse(path, value)?,
            "SEARCH__MIN_CANDIDATE_POOL" => self.search.min_candidate_pool = parse(path, value)?,
            "SEARCH__CANDIDATE_MULTIPLIER" => {
                self.search.candidate_multiplier = parse(path, value)?
            }
            "SEARCH__SNIPPET_CHARS" => self.search.snippet_chars = parse(path, value)?,
            "SEARCH__DEFAULT_TOP_K" => self.search.default_top_k = parse(path, value)?,
            "SEARCH__TIMEOUT_SECS" => self.search.timeout_secs = parse(path, value)?,
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| JurisError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("jurisearch").join("config.toml"))
    }
}

fn parse<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| JurisError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
            },
            dataset: DatasetConfig {
                path: PathBuf::from("./vectorized_dataset"),
                cache_file: "bm25_index.cache".to_string(),
            },
            embedding: EmbeddingConfig {
                model: crate::embedding::DEFAULT_MODEL.to_string(),
                batch_size: 64,
                text_column: "document".to_string(),
            },
            search: SearchConfig::default(),
            profiles: HashMap::new(),
        }
    }
}
