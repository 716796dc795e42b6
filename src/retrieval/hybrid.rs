//! Hybrid search combining dense and BM25 retrieval

use crate::config::SearchConfig;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::index::{tokenize, DenseIndex, DenseIndexError, SparseIndex};
use crate::retrieval::{fuse, FusionWeights, RankedResult, SearchQuery};
use crate::store::{DocumentStore, StoreError};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Query encoding failed: {0}")]
    Encoding(#[from] EmbeddingError),

    #[error("Dense index error: {0}")]
    DenseIndex(#[from] DenseIndexError),

    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Embedding model mismatch: collection was embedded with {stored}, query encoder is {encoder}")]
    ModelMismatch { stored: String, encoder: String },

    #[error("Invalid search configuration: {0}")]
    Config(String),
}

/// Query-time ranker over a fixed collection
///
/// All indexes are built at construction and only read afterwards, so a
/// searcher can be shared across threads behind an `Arc` and queried
/// concurrently without locking.
pub struct HybridSearcher {
    provider: Arc<dyn EmbeddingProvider>,
    store: DocumentStore,
    dense: DenseIndex,
    sparse: SparseIndex,
    weights: FusionWeights,
    config: SearchConfig,
}

impl HybridSearcher {
    /// Load the collection at `dataset_dir` and build both indexes
    ///
    /// The BM25 index is read from `cache_path` when a usable cache exists
    /// there, otherwise built and written back.
    pub fn open(
        dataset_dir: &Path,
        cache_path: &Path,
        provider: Arc<dyn EmbeddingProvider>,
        config: SearchConfig,
    ) -> Result<Self, SearchError> {
        let store = DocumentStore::load(dataset_dir)?;
        Self::new(store, Some(cache_path), provider, config)
    }

    /// Build a searcher over an already loaded store
    ///
    /// Without a `cache_path` the BM25 index is built in memory only. The
    /// embeddings move into the dense index, so documents reached through
    /// [`Self::store`] carry an empty `embedding`.
    pub fn new(
        mut store: DocumentStore,
        cache_path: Option<&Path>,
        provider: Arc<dyn EmbeddingProvider>,
        config: SearchConfig,
    ) -> Result<Self, SearchError> {
        let problems = config.validate();
        if !problems.is_empty() {
            let details: Vec<String> = problems
                .iter()
                .map(|e| format!("{}: {}", e.path, e.message))
                .collect();
            return Err(SearchError::Config(details.join("; ")));
        }
        let weights = FusionWeights::new(config.dense_weight, config.sparse_weight)
            .map_err(|e| SearchError::Config(e.to_string()))?;

        check_compatibility(&store, provider.as_ref())?;

        let dense = DenseIndex::build(store.take_embeddings())?;

        let sparse = match cache_path {
            Some(path) => SparseIndex::load_or_build(path, store.size(), store.texts()),
            None => SparseIndex::from_texts(store.texts()),
        };

        tracing::info!(
            "Hybrid searcher ready: {} documents, {} terms, weights {}/{}",
            store.size(),
            sparse.vocabulary_size(),
            weights.dense,
            weights.sparse
        );

        Ok(Self {
            provider,
            store,
            dense,
            sparse,
            weights,
            config,
        })
    }

    /// Run one hybrid query, returning at most `top_k` results
    ///
    /// Results are ordered by combined score, best first. Encoder and index
    /// failures are returned as-is; there is no single-modality fallback.
    /// Blank text is rejected before `top_k` is looked at, so `("", 0)` is
    /// [`SearchError::InvalidQuery`] rather than an empty list.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<RankedResult>, SearchError> {
        if query.text.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }

        if query.top_k == 0 || self.store.is_empty() {
            return Ok(Vec::new());
        }

        let pool = self.config.pool_size(query.top_k);

        let query_vector = self.provider.embed(&query.text)?;
        let dense_pool = self.dense.search(&query_vector, pool)?;

        let query_tokens = tokenize(&query.text);
        let sparse_pool = self.sparse.search(&query_tokens, pool);

        let mut candidates = fuse(&dense_pool, &sparse_pool, self.weights);

        tracing::debug!(
            "Query pools: dense {}, sparse {}, union {} (requested pool {})",
            dense_pool.len(),
            sparse_pool.len(),
            candidates.len(),
            pool
        );

        candidates.truncate(query.top_k);

        candidates
            .into_iter()
            .map(|candidate| {
                let document = self.store.get(candidate.position)?;
                Ok(RankedResult::from_document(
                    document,
                    self.config.snippet_chars,
                    candidate.dense_score.unwrap_or(0.0),
                    candidate.sparse_score.unwrap_or(0.0),
                    candidate.combined_score,
                ))
            })
            .collect()
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn dense_index(&self) -> &DenseIndex {
        &self.dense
    }

    pub fn sparse_index(&self) -> &SparseIndex {
        &self.sparse
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }
}

/// Refuse an encoder that does not produce the collection's embedding space
fn check_compatibility(
    store: &DocumentStore,
    provider: &dyn EmbeddingProvider,
) -> Result<(), SearchError> {
    let encoder = format!("{} ({}D)", provider.model_name(), provider.dimension());

    match store.manifest() {
        Some(manifest) => {
            if manifest.model != provider.model_name() || manifest.dimension != provider.dimension()
            {
                return Err(SearchError::ModelMismatch {
                    stored: format!("{} ({}D)", manifest.model, manifest.dimension),
                    encoder,
                });
            }
        }
        None => {
            tracing::warn!(
                "Collection has no manifest; cannot verify it was embedded with {}",
                provider.model_name()
            );
        }
    }

    if let Some(dimension) = store.dimension() {
        if dimension != provider.dimension() {
            return Err(SearchError::ModelMismatch {
                stored: format!("vectors of {}D", dimension),
                encoder,
            });
        }
    }

    Ok(())
}
