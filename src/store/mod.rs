//! In-memory document collection with precomputed embeddings
//!
//! A collection directory holds `documents.jsonl` (or `documents.jsonl.zst`),
//! an optional `manifest.json` describing the embedding model, and the sparse
//! index cache. The store is loaded once and never mutated afterwards.

mod manifest;

pub use manifest::{CollectionManifest, MANIFEST_FILE, MANIFEST_SCHEMA_VERSION};

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Plain JSON Lines collection file
pub const DOCUMENTS_FILE: &str = "documents.jsonl";
/// zstd-compressed JSON Lines collection file
pub const DOCUMENTS_FILE_ZST: &str = "documents.jsonl.zst";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to load dataset from {path}: {reason}")]
    DatasetLoad { path: PathBuf, reason: String },

    #[error("Index position {position} out of range for collection of {size} documents")]
    IndexOutOfRange { position: usize, size: usize },
}

impl StoreError {
    fn load(path: &Path, reason: impl Into<String>) -> Self {
        StoreError::DatasetLoad {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// A single case-law record with its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub title: String,
    /// Jurisdiction
    pub state: String,
    pub citation: String,
    /// Full text body (empty when the source had none)
    pub document: String,
    pub embedding: Vec<f32>,
}

/// Read-only, position-addressed document collection
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: Vec<Document>,
    manifest: Option<CollectionManifest>,
    dimension: Option<usize>,
    root: PathBuf,
}

impl DocumentStore {
    /// Load a collection directory from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref();
        if !root.is_dir() {
            return Err(StoreError::load(root, "collection directory does not exist"));
        }

        let (file, reader) = open_documents(root)?;
        let documents = parse_lines(&file, reader)?;

        let manifest = match CollectionManifest::load(root) {
            Ok(manifest) => manifest,
            Err(e) => return Err(StoreError::load(&root.join(MANIFEST_FILE), e.to_string())),
        };

        tracing::info!(
            "Loaded {} documents from {}",
            documents.len(),
            file.display()
        );

        Ok(Self {
            dimension: first_dimension(&documents),
            documents,
            manifest,
            root: root.to_path_buf(),
        })
    }

    /// Build a store directly from documents (no backing directory)
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self {
            dimension: first_dimension(&documents),
            documents,
            manifest: None,
            root: PathBuf::new(),
        }
    }

    /// Attach a manifest to an in-memory store
    pub fn with_manifest(mut self, manifest: CollectionManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Get a document by its index position
    pub fn get(&self, position: usize) -> Result<&Document, StoreError> {
        self.documents
            .get(position)
            .ok_or(StoreError::IndexOutOfRange {
                position,
                size: self.documents.len(),
            })
    }

    pub fn size(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Embedding dimensionality of the first document, if any
    ///
    /// Recorded at load time, so it survives [`Self::take_embeddings`].
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Move every embedding out of the store, in position order
    ///
    /// Leaves each document's `embedding` empty. Used once the vectors have
    /// a new owner (the dense index) so they are not held twice.
    pub fn take_embeddings(&mut self) -> Vec<Vec<f32>> {
        self.documents
            .iter_mut()
            .map(|doc| std::mem::take(&mut doc.embedding))
            .collect()
    }

    pub fn manifest(&self) -> Option<&CollectionManifest> {
        self.manifest.as_ref()
    }

    /// Directory the collection was loaded from (empty for in-memory stores)
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Iterate over document texts in position order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(|d| d.document.as_str())
    }
}

fn open_documents(root: &Path) -> Result<(PathBuf, Box<dyn BufRead>), StoreError> {
    let plain = root.join(DOCUMENTS_FILE);
    if plain.is_file() {
        let file =
            std::fs::File::open(&plain).map_err(|e| StoreError::load(&plain, e.to_string()))?;
        return Ok((plain, Box::new(BufReader::new(file))));
    }

    let compressed = root.join(DOCUMENTS_FILE_ZST);
    if compressed.is_file() {
        let file = std::fs::File::open(&compressed)
            .map_err(|e| StoreError::load(&compressed, e.to_string()))?;
        let decoder = zstd::Decoder::new(file)
            .map_err(|e| StoreError::load(&compressed, e.to_string()))?;
        return Ok((compressed, Box::new(BufReader::new(decoder))));
    }

    Err(StoreError::load(
        root,
        format!("neither {} nor {} found", DOCUMENTS_FILE, DOCUMENTS_FILE_ZST),
    ))
}

fn parse_lines(file: &Path, reader: impl BufRead) -> Result<Vec<Document>, StoreError> {
    let mut documents = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| StoreError::load(file, e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }

        let record: Map<String, Value> = serde_json::from_str(&line).map_err(|e| {
            StoreError::load(file, format!("line {}: invalid JSON record: {}", line_no + 1, e))
        })?;

        let document = record_to_document(&record)
            .map_err(|reason| StoreError::load(file, format!("line {}: {}", line_no + 1, reason)))?;

        if !seen_ids.insert(document.id.clone()) {
            tracing::warn!("Duplicate document id '{}' at line {}", document.id, line_no + 1);
        }

        documents.push(document);
    }

    Ok(documents)
}

/// Convert one persisted record into a Document
fn record_to_document(record: &Map<String, Value>) -> Result<Document, String> {
    let text = match record.get("document") {
        None => return Err("record has no 'document' field".to_string()),
        Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Err(format!("'document' must be a string, got {}", other)),
    };

    let embedding = match record.get("embedding") {
        None => return Err("record has no 'embedding' field".to_string()),
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| format!("non-numeric embedding component: {}", v))
            })
            .collect::<Result<Vec<f32>, String>>()?,
        Some(other) => return Err(format!("'embedding' must be an array, got {}", other)),
    };

    Ok(Document {
        id: string_field(record, "id"),
        title: string_field(record, "title"),
        state: string_field(record, "state"),
        citation: string_field(record, "citation"),
        document: text,
        embedding,
    })
}

fn first_dimension(documents: &[Document]) -> Option<usize> {
    documents.first().map(|d| d.embedding.len())
}

fn string_field(record: &Map<String, Value>, key: &str) -> String {
    match record.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(input: &str) -> Result<Vec<Document>, StoreError> {
        parse_lines(Path::new("test.jsonl"), Cursor::new(input.as_bytes()))
    }

    #[test]
    fn test_parse_records() {
        let docs = parse(
            r#"{"id": "a1", "title": "Smith v. Jones", "state": "CA", "citation": "1 Cal. 1", "document": "breach of contract", "embedding": [0.1, 0.2]}
{"id": 7, "title": null, "document": null, "embedding": [0.0, 1.0], "extra": true}
"#,
        )
        .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "a1");
        assert_eq!(docs[0].state, "CA");
        assert_eq!(docs[0].embedding, vec![0.1, 0.2]);
        assert_eq!(docs[1].id, "7");
        assert_eq!(docs[1].title, "");
        assert_eq!(docs[1].document, "");
    }

    #[test]
    fn test_missing_embedding_field() {
        let err = parse(r#"{"id": "a", "document": "text"}"#).unwrap_err();
        match err {
            StoreError::DatasetLoad { reason, .. } => assert!(reason.contains("embedding")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_document_field() {
        let err = parse(r#"{"id": "a", "embedding": [1.0]}"#).unwrap_err();
        assert!(matches!(err, StoreError::DatasetLoad { .. }));
    }

    #[test]
    fn test_invalid_json_line() {
        let err = parse("{not json}\n").unwrap_err();
        match err {
            StoreError::DatasetLoad { reason, .. } => assert!(reason.contains("line 1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_blank_lines_skipped() {
        let docs = parse("\n{\"id\":\"x\",\"document\":\"\",\"embedding\":[]}\n\n").unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_take_embeddings_keeps_dimension() {
        let docs = parse(
            "{\"id\":\"a\",\"document\":\"x\",\"embedding\":[1.0,0.0]}\n\
             {\"id\":\"b\",\"document\":\"y\",\"embedding\":[0.0,1.0]}\n",
        )
        .unwrap();
        let mut store = DocumentStore::from_documents(docs);

        let taken = store.take_embeddings();
        assert_eq!(taken, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert!(store.documents().iter().all(|d| d.embedding.is_empty()));
        assert_eq!(store.dimension(), Some(2));
        assert_eq!(store.get(1).unwrap().id, "b");
    }

    #[test]
    fn test_get_out_of_range() {
        let store = DocumentStore::from_documents(vec![]);
        assert!(matches!(
            store.get(0),
            Err(StoreError::IndexOutOfRange { position: 0, size: 0 })
        ));
        assert!(store.is_empty());
        assert_eq!(store.dimension(), None);
    }
}
