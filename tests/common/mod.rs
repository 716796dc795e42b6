//! Shared fixtures for integration tests
#![allow(dead_code)]

use jurisearch::embedding::{EmbeddingError, EmbeddingProvider};
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

pub const DIMENSION: usize = 16;

/// Deterministic stand-in for a sentence-embedding model
///
/// Known texts map to fixed vectors; anything else becomes a hashed
/// bag of words, so equal token multisets give equal vectors.
pub struct StubProvider {
    name: String,
    dimension: usize,
    table: HashMap<String, Vec<f32>>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self {
            name: "stub-encoder".to_string(),
            dimension: DIMENSION,
            table: HashMap::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Pin the vector returned for `text`
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimension);
        self.table.insert(text.to_string(), vector);
        self
    }

    fn hashed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            let hash = blake3::hash(token.as_bytes());
            let bucket = hash.as_bytes()[0] as usize % self.dimension;
            vector[bucket] += 1.0;
        }
        vector
    }
}

impl EmbeddingProvider for StubProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self
            .table
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.hashed(text)))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

/// Twelve short opinions embedded with the hashing stub
pub fn sample_corpus() -> Vec<(&'static str, &'static str)> {
    vec![
        ("c1", "breach of contract damages awarded to plaintiff"),
        ("c2", "negligence claim dismissed for lack of duty"),
        ("c3", "contract formation requires offer and acceptance"),
        ("c4", "criminal assault conviction affirmed on appeal"),
        ("c5", "summary judgment granted on the breach claim"),
        ("c6", "the landlord breached the implied warranty of habitability"),
        ("c7", "punitive damages unavailable for breach of contract"),
        ("c8", "appeal dismissed as untimely"),
        ("c9", "tort liability of employers for employee negligence"),
        ("c10", "fraudulent inducement voids the contract"),
        ("c11", "sentencing guidelines for assault with a deadly weapon"),
        ("c12", ""),
    ]
}

/// Write a `documents.jsonl` collection whose embeddings come from `provider`
pub fn write_documents(dir: &Path, corpus: &[(&str, &str)], provider: &dyn EmbeddingProvider) {
    let rows: Vec<(String, String, Vec<f32>)> = corpus
        .iter()
        .map(|(id, text)| (id.to_string(), text.to_string(), provider.embed(text).unwrap()))
        .collect();
    write_rows(dir, &rows);
}

/// Write a `documents.jsonl` collection with explicit embeddings
pub fn write_rows(dir: &Path, rows: &[(String, String, Vec<f32>)]) {
    std::fs::create_dir_all(dir).unwrap();
    let mut file = std::fs::File::create(dir.join("documents.jsonl")).unwrap();
    for (id, text, embedding) in rows {
        let record = json!({
            "id": id,
            "title": format!("Case {id}"),
            "state": "NY",
            "citation": format!("{id} N.Y. 1"),
            "document": text,
            "embedding": embedding,
        });
        writeln!(file, "{}", record).unwrap();
    }
}
