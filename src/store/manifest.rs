//! Collection manifest: records which embedding model produced the vectors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_SCHEMA_VERSION: &str = "1.0.0";

/// Model-version tag persisted next to the documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionManifest {
    pub schema_version: String,
    /// Embedding model name as reported by the provider
    pub model: String,
    pub dimension: usize,
    pub text_column: String,
    pub document_count: usize,
    pub created_at: DateTime<Utc>,
}

impl CollectionManifest {
    pub fn new(
        model: impl Into<String>,
        dimension: usize,
        text_column: impl Into<String>,
        document_count: usize,
    ) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            model: model.into(),
            dimension,
            text_column: text_column.into(),
            document_count,
            created_at: Utc::now(),
        }
    }

    /// Read `manifest.json` from a collection directory; `Ok(None)` if absent
    pub fn load(dir: &Path) -> anyhow::Result<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let manifest: Self = serde_json::from_str(&content)?;
        Ok(Some(manifest))
    }

    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }
}
