/// Offline builder: raw JSONL collection -> embedded collection directory
use super::{EmbeddingError, EmbeddingProvider};
use crate::store::{CollectionManifest, DOCUMENTS_FILE, DOCUMENTS_FILE_ZST};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A raw record: arbitrary columns, one of which holds the text to embed
pub type Record = Map<String, Value>;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Text column '{column}' not found in dataset. Available columns: {available}")]
    MissingTextColumn { column: String, available: String },

    #[error("Invalid record at line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("Embedding count mismatch: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

fn io_error(context: String) -> impl FnOnce(std::io::Error) -> BuildError {
    move |source| BuildError::Io { source, context }
}

/// Builder settings
#[derive(Debug, Clone)]
pub struct BuilderOptions {
    /// Column whose text is embedded
    pub text_column: String,
    /// Number of texts per encode call
    pub batch_size: usize,
    /// Keep only the first `limit` records
    pub limit: Option<usize>,
    /// Write `documents.jsonl.zst` instead of `documents.jsonl`
    pub compress: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            text_column: "document".to_string(),
            batch_size: 64,
            limit: None,
            compress: false,
        }
    }
}

/// Summary of a build run
#[derive(Debug)]
pub struct BuildReport {
    pub processed: usize,
    pub dimension: usize,
    pub output: PathBuf,
    pub duration_ms: u64,
}

/// Precomputes embeddings for a raw collection and persists the result
pub struct EmbeddingBuilder {
    provider: Arc<dyn EmbeddingProvider>,
    options: BuilderOptions,
}

impl EmbeddingBuilder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, options: BuilderOptions) -> Self {
        Self { provider, options }
    }

    /// Read `input`, embed every record and write the collection to `output_dir`
    pub fn run(&self, input: &Path, output_dir: &Path) -> Result<BuildReport, BuildError> {
        let start = std::time::Instant::now();

        info!("Loading raw collection from {}", input.display());
        let records = read_records(input, self.options.limit)?;
        info!("Collection loaded: {} rows", records.len());

        validate_text_column(&records, &self.options.text_column)?;

        let records = self.embed_records(records)?;

        let manifest = CollectionManifest::new(
            self.provider.model_name(),
            self.provider.dimension(),
            &self.options.text_column,
            records.len(),
        );
        let output = write_collection(output_dir, &records, &manifest, self.options.compress)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Embedding build complete: {} rows, {}D, {}ms -> {}",
            records.len(),
            self.provider.dimension(),
            duration_ms,
            output.display()
        );

        Ok(BuildReport {
            processed: records.len(),
            dimension: self.provider.dimension(),
            output,
            duration_ms,
        })
    }

    /// Append an `embedding` column to every record
    ///
    /// Missing or null text is embedded as the empty string so every record
    /// ends up with a vector of the model's dimension.
    pub fn embed_records(&self, mut records: Vec<Record>) -> Result<Vec<Record>, BuildError> {
        let batch_size = self.options.batch_size.max(1);
        let total = records.len();
        let mut processed = 0;

        info!(
            "Computing embeddings with {} (batch size: {})",
            self.provider.model_name(),
            batch_size
        );

        for chunk in records.chunks_mut(batch_size) {
            let texts: Vec<String> = chunk
                .iter()
                .map(|record| text_of(record, &self.options.text_column))
                .collect();

            let embeddings = self.provider.embed_batch(&texts)?;
            if embeddings.len() != chunk.len() {
                return Err(BuildError::CountMismatch {
                    expected: chunk.len(),
                    actual: embeddings.len(),
                });
            }

            for (record, embedding) in chunk.iter_mut().zip(embeddings) {
                let values = embedding
                    .into_iter()
                    .map(|x| Value::from(x as f64))
                    .collect();
                record.insert("embedding".to_string(), Value::Array(values));
            }

            processed += chunk.len();
            debug!("Embedded {}/{} rows", processed, total);
        }

        Ok(records)
    }
}

fn text_of(record: &Record, column: &str) -> String {
    match record.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Read a JSON Lines file of raw records
pub fn read_records(path: &Path, limit: Option<usize>) -> Result<Vec<Record>, BuildError> {
    let file = fs::File::open(path).map_err(io_error(format!(
        "Failed to open raw collection: {}",
        path.display()
    )))?;

    let mut records = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        if limit.is_some_and(|limit| records.len() >= limit) {
            info!("Limiting collection to first {} rows", records.len());
            break;
        }

        let line = line.map_err(io_error(format!("Failed to read {}", path.display())))?;
        if line.trim().is_empty() {
            continue;
        }

        let record: Record =
            serde_json::from_str(&line).map_err(|e| BuildError::InvalidRecord {
                line: line_no + 1,
                reason: e.to_string(),
            })?;
        records.push(record);
    }

    Ok(records)
}

/// Fail unless some record carries `column`
///
/// The collection schema is the union of all record keys. An empty
/// collection has no schema and passes.
pub fn validate_text_column(records: &[Record], column: &str) -> Result<(), BuildError> {
    if records.is_empty() {
        return Ok(());
    }

    let columns: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.keys().map(String::as_str))
        .collect();

    if columns.contains(column) {
        return Ok(());
    }

    Err(BuildError::MissingTextColumn {
        column: column.to_string(),
        available: columns.into_iter().collect::<Vec<_>>().join(", "),
    })
}

/// Write records and manifest into `dir`, returning the documents file path
pub fn write_collection(
    dir: &Path,
    records: &[Record],
    manifest: &CollectionManifest,
    compress: bool,
) -> Result<PathBuf, BuildError> {
    fs::create_dir_all(dir).map_err(io_error(format!(
        "Failed to create output directory: {}",
        dir.display()
    )))?;

    if records.iter().any(|r| !r.contains_key("document")) {
        warn!("Some records have no 'document' column; the search service requires one");
    }

    let (target, stale) = if compress {
        (dir.join(DOCUMENTS_FILE_ZST), dir.join(DOCUMENTS_FILE))
    } else {
        (dir.join(DOCUMENTS_FILE), dir.join(DOCUMENTS_FILE_ZST))
    };

    // The loader prefers the plain file, so never leave both behind
    if stale.exists() {
        fs::remove_file(&stale).map_err(io_error(format!(
            "Failed to remove stale collection file: {}",
            stale.display()
        )))?;
    }

    let file = fs::File::create(&target).map_err(io_error(format!(
        "Failed to create collection file: {}",
        target.display()
    )))?;

    let context = format!("Failed to write collection file: {}", target.display());
    if compress {
        let encoder = zstd::Encoder::new(file, 3).map_err(io_error(context.clone()))?;
        let mut writer = BufWriter::new(encoder);
        write_lines(&mut writer, records, &context)?;
        let encoder = writer
            .into_inner()
            .map_err(|e| BuildError::Io {
                source: e.into_error(),
                context: context.clone(),
            })?;
        encoder.finish().map_err(io_error(context))?;
    } else {
        let mut writer = BufWriter::new(file);
        write_lines(&mut writer, records, &context)?;
        writer.flush().map_err(io_error(context))?;
    }

    manifest.save(dir).map_err(|e| BuildError::Io {
        source: std::io::Error::other(e.to_string()),
        context: format!("Failed to write manifest in {}", dir.display()),
    })?;

    Ok(target)
}

fn write_lines<W: Write>(writer: &mut W, records: &[Record], context: &str) -> Result<(), BuildError> {
    for record in records {
        serde_json::to_writer(&mut *writer, record)?;
        writer
            .write_all(b"\n")
            .map_err(io_error(context.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct LengthProvider;

    impl EmbeddingProvider for LengthProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "length"
        }
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_validate_text_column() {
        let records = vec![
            record(json!({"id": 1, "document": "text"})),
            record(json!({"id": 2, "title": "t"})),
        ];
        assert!(validate_text_column(&records, "document").is_ok());
        assert!(validate_text_column(&[], "anything").is_ok());

        match validate_text_column(&records, "body") {
            Err(BuildError::MissingTextColumn { column, available }) => {
                assert_eq!(column, "body");
                assert_eq!(available, "document, id, title");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_embed_records_batches_and_keeps_order() {
        let builder = EmbeddingBuilder::new(
            Arc::new(LengthProvider),
            BuilderOptions {
                batch_size: 2,
                ..Default::default()
            },
        );

        let records = vec![
            record(json!({"id": "a", "document": "abc"})),
            record(json!({"id": "b", "document": null})),
            record(json!({"id": "c"})),
            record(json!({"id": "d", "document": "abcdefg"})),
            record(json!({"id": "e", "document": ""})),
        ];

        let embedded = builder.embed_records(records).unwrap();
        let lengths: Vec<f64> = embedded
            .iter()
            .map(|r| r["embedding"][0].as_f64().unwrap())
            .collect();
        assert_eq!(lengths, vec![3.0, 0.0, 0.0, 7.0, 0.0]);
        assert_eq!(embedded[1]["id"], "b");
    }
}
