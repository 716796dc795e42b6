//! Checksummed, compressed on-disk cache for built indexes
//!
//! Layout: `MAGIC (8 bytes) | BLAKE3(payload) (32 bytes) | payload`, where the
//! payload is zstd-compressed JSON. Writes go to a temporary file which is then
//! renamed into place; concurrent writers race and the last rename wins.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MAGIC: &[u8; 8] = b"JSBM25\0\x01";
const HASH_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + HASH_LEN;
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    #[error("Corrupt cache file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Cache built for {actual} documents, collection has {expected}")]
    Incompatible { expected: usize, actual: usize },

    #[error("Failed to encode cache: {0}")]
    Encode(String),
}

impl CacheError {
    pub(crate) fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        CacheError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Serialize `value` and atomically write it to `path`
pub fn write<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    let json = serde_json::to_vec(value).map_err(|e| CacheError::Encode(e.to_string()))?;
    let payload =
        zstd::encode_all(&json[..], COMPRESSION_LEVEL).map_err(|e| CacheError::Io {
            source: e,
            context: "Failed to compress cache payload".to_string(),
        })?;
    let hash = blake3::hash(&payload);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| CacheError::Io {
                source: e,
                context: format!("Failed to create cache directory: {}", parent.display()),
            })?;
        }
    }

    let temp_path = temp_path(path);
    let mut file = fs::File::create(&temp_path).map_err(|e| CacheError::Io {
        source: e,
        context: format!("Failed to create temp cache file: {}", temp_path.display()),
    })?;

    let written = file
        .write_all(MAGIC)
        .and_then(|_| file.write_all(hash.as_bytes()))
        .and_then(|_| file.write_all(&payload))
        .and_then(|_| file.sync_all());
    drop(file);

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(CacheError::Io {
            source: e,
            context: format!("Failed to write cache file: {}", temp_path.display()),
        });
    }

    fs::rename(&temp_path, path).map_err(|e| CacheError::Io {
        source: e,
        context: format!(
            "Failed to rename temp cache to final location: {} -> {}",
            temp_path.display(),
            path.display()
        ),
    })?;

    tracing::debug!(
        "Wrote cache {} ({} bytes compressed, {} raw)",
        path.display(),
        payload.len(),
        json.len()
    );

    Ok(())
}

/// Read and verify a cache file written by [`write`]
pub fn read<T: DeserializeOwned>(path: &Path) -> Result<T, CacheError> {
    let raw = fs::read(path).map_err(|e| CacheError::Io {
        source: e,
        context: format!("Failed to read cache file: {}", path.display()),
    })?;

    if raw.len() < HEADER_LEN {
        return Err(CacheError::corrupt(path, "file shorter than header"));
    }
    if &raw[..MAGIC.len()] != MAGIC {
        return Err(CacheError::corrupt(path, "bad magic bytes"));
    }

    let stored = &raw[MAGIC.len()..HEADER_LEN];
    let payload = &raw[HEADER_LEN..];
    if blake3::hash(payload).as_bytes()[..] != stored[..] {
        return Err(CacheError::corrupt(path, "checksum mismatch"));
    }

    let json = zstd::decode_all(payload)
        .map_err(|e| CacheError::corrupt(path, format!("decompression failed: {}", e)))?;

    serde_json::from_slice(&json)
        .map_err(|e| CacheError::corrupt(path, format!("unexpected contents: {}", e)))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}
