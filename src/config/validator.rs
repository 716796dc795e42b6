use crate::config::{Config, SCHEMA_VERSION};
use crate::embedding::SUPPORTED_MODELS;
use crate::error::{JurisError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every problem at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_dataset(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_search(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(JurisError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_dataset(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is checked when the collection is loaded
        if config.dataset.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "dataset.path",
                "Dataset path cannot be empty",
            ));
        }

        let cache_file = &config.dataset.cache_file;
        if cache_file.is_empty() || cache_file.contains(['/', '\\']) {
            errors.push(ValidationError::new(
                "dataset.cache_file",
                format!("Cache file must be a plain file name, got '{}'", cache_file),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let model = &config.embedding.model;
        let known = SUPPORTED_MODELS.iter().any(|(name, _)| *name == model.as_str())
            || model == "all-minilm-l6-v2";
        if !known {
            errors.push(ValidationError::new(
                "embedding.model",
                format!("Unsupported embedding model: {}", model),
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.text_column.trim().is_empty() {
            errors.push(ValidationError::new(
                "embedding.text_column",
                "Text column cannot be empty",
            ));
        }
    }

    fn validate_search(config: &Config, errors: &mut Vec<ValidationError>) {
        errors.extend(config.search.validate());
    }
}
