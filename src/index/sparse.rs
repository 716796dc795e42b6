/// Okapi BM25 keyword index over whitespace-tokenized text
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

use super::cache::{self, CacheError};

/// Term-frequency saturation
pub const BM25_K1: f64 = 1.5;
/// Document-length normalization
pub const BM25_B: f64 = 0.75;
/// Floor for negative IDF values, as a fraction of the mean IDF
pub const BM25_EPSILON: f64 = 0.25;

/// Lowercase + whitespace split.
///
/// Used for both documents and queries; the two must never diverge.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Candidate from keyword retrieval: index position and raw BM25 score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparseHit {
    pub position: usize,
    pub score: f64,
}

/// Raw corpus statistics; everything else is derived from these
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct CorpusStats {
    pub doc_freqs: Vec<AHashMap<String, u32>>,
    pub doc_len: Vec<u32>,
}

impl CorpusStats {
    /// Every document has a length equal to the sum of its term frequencies
    fn check_consistent(&self) -> Result<(), String> {
        if self.doc_freqs.len() != self.doc_len.len() {
            return Err(format!(
                "{} term-frequency tables for {} document lengths",
                self.doc_freqs.len(),
                self.doc_len.len()
            ));
        }
        for (position, (freqs, &len)) in self.doc_freqs.iter().zip(&self.doc_len).enumerate() {
            let total: u64 = freqs.values().map(|&f| f as u64).sum();
            if total != len as u64 {
                return Err(format!(
                    "document {} has length {} but {} counted tokens",
                    position, len, total
                ));
            }
        }
        Ok(())
    }
}

/// BM25 index scoring every document position for a query
#[derive(Debug, Clone, Default)]
pub struct SparseIndex {
    stats: CorpusStats,
    idf: AHashMap<String, f64>,
    avgdl: f64,
}

impl SparseIndex {
    /// Build from pre-tokenized documents, in store order
    pub fn build<T: AsRef<[String]>>(tokenized_documents: &[T]) -> Self {
        let mut stats = CorpusStats {
            doc_freqs: Vec::with_capacity(tokenized_documents.len()),
            doc_len: Vec::with_capacity(tokenized_documents.len()),
        };

        for tokens in tokenized_documents {
            let tokens = tokens.as_ref();
            let mut freqs: AHashMap<String, u32> = AHashMap::new();
            for token in tokens {
                *freqs.entry(token.clone()).or_insert(0) += 1;
            }
            stats.doc_freqs.push(freqs);
            stats.doc_len.push(tokens.len() as u32);
        }

        Self::from_stats(stats)
    }

    /// Tokenize raw texts and build
    pub fn from_texts<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        let tokenized: Vec<Vec<String>> = texts.into_iter().map(tokenize).collect();
        let index = Self::build(&tokenized);
        tracing::info!(
            "BM25 index built over {} documents ({} terms)",
            index.len(),
            index.vocabulary_size()
        );
        index
    }

    pub(crate) fn from_stats(stats: CorpusStats) -> Self {
        let corpus_size = stats.doc_len.len();
        let total_len: u64 = stats.doc_len.iter().map(|&l| l as u64).sum();
        let avgdl = if corpus_size == 0 {
            0.0
        } else {
            total_len as f64 / corpus_size as f64
        };

        // Number of documents containing each term
        let mut nd: AHashMap<&str, u32> = AHashMap::new();
        for freqs in &stats.doc_freqs {
            for term in freqs.keys() {
                *nd.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        // Sorted so the IDF sum, and therefore epsilon, is reproducible
        let mut nd: Vec<(&str, u32)> = nd.into_iter().collect();
        nd.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let n = corpus_size as f64;
        let mut idf: AHashMap<String, f64> = AHashMap::with_capacity(nd.len());
        let mut idf_sum = 0.0;
        let mut negative: Vec<String> = Vec::new();
        for (term, df) in nd {
            let df = df as f64;
            let value = (n - df + 0.5).ln() - (df + 0.5).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.to_string());
            }
            idf.insert(term.to_string(), value);
        }

        if !idf.is_empty() {
            let eps = BM25_EPSILON * (idf_sum / idf.len() as f64);
            for term in negative {
                idf.insert(term, eps);
            }
        }

        Self { stats, idf, avgdl }
    }

    /// BM25 score for every document position
    ///
    /// Repeated query tokens contribute once per occurrence; unknown tokens
    /// contribute nothing.
    pub fn score_all<S: AsRef<str>>(&self, query_tokens: &[S]) -> Vec<f64> {
        let mut scores = vec![0.0; self.len()];
        if self.avgdl <= 0.0 {
            return scores;
        }

        for token in query_tokens {
            let token = token.as_ref();
            let Some(&idf) = self.idf.get(token) else {
                continue;
            };

            for (position, freqs) in self.stats.doc_freqs.iter().enumerate() {
                let Some(&tf) = freqs.get(token) else {
                    continue;
                };
                let tf = tf as f64;
                let dl = self.stats.doc_len[position] as f64;
                let norm = BM25_K1 * (1.0 - BM25_B + BM25_B * dl / self.avgdl);
                scores[position] += idf * (tf * (BM25_K1 + 1.0)) / (tf + norm);
            }
        }

        scores
    }

    /// Top `n` positions by BM25 score, best first, ties by ascending position
    ///
    /// Every document is scored, so zero-scoring documents can fill the pool
    /// when fewer than `n` documents match.
    pub fn search<S: AsRef<str>>(&self, query_tokens: &[S], n: usize) -> Vec<SparseHit> {
        let mut hits: Vec<SparseHit> = self
            .score_all(query_tokens)
            .into_iter()
            .enumerate()
            .map(|(position, score)| SparseHit { position, score })
            .collect();

        let n = n.min(hits.len());
        if n == 0 {
            return Vec::new();
        }
        if n < hits.len() {
            hits.select_nth_unstable_by(n - 1, compare_hits);
            hits.truncate(n);
        }
        hits.sort_unstable_by(compare_hits);
        hits
    }

    /// Tokenize a raw query and score it
    pub fn score_query(&self, query: &str) -> Vec<f64> {
        self.score_all(&tokenize(query))
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.stats.doc_len.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    pub fn average_doc_length(&self) -> f64 {
        self.avgdl
    }

    /// Inverse document frequency of a term, if it occurs in the corpus
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    /// Persist the index to a cache file
    pub fn save_cache(&self, path: &Path) -> Result<(), CacheError> {
        cache::write(path, &self.stats)
    }

    /// Load an index from a cache file
    pub fn load_cache(path: &Path) -> Result<Self, CacheError> {
        let stats: CorpusStats = cache::read(path)?;
        stats
            .check_consistent()
            .map_err(|reason| CacheError::corrupt(path, reason))?;
        Ok(Self::from_stats(stats))
    }

    /// Load from `path` if it holds a usable cache for `texts`, otherwise build and save
    ///
    /// Cache failures never surface: a corrupt or mismatched cache is rebuilt
    /// and a failed save only logs a warning.
    pub fn load_or_build<'a>(
        path: &Path,
        expected_documents: usize,
        texts: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        if path.exists() {
            tracing::info!("Loading BM25 index from cache: {}", path.display());
            match Self::load_cache(path) {
                Ok(index) if index.len() == expected_documents => {
                    tracing::info!("BM25 index loaded from cache");
                    return index;
                }
                Ok(index) => {
                    let err = CacheError::Incompatible {
                        expected: expected_documents,
                        actual: index.len(),
                    };
                    tracing::warn!("Ignoring BM25 cache: {}. Rebuilding...", err);
                }
                Err(e) => {
                    tracing::warn!("Failed to load BM25 cache: {}. Rebuilding...", e);
                }
            }
        }

        let index = Self::from_texts(texts);

        tracing::info!("Saving BM25 index to cache: {}", path.display());
        if let Err(e) = index.save_cache(path) {
            tracing::warn!("Failed to cache BM25 index: {}", e);
        }

        index
    }
}

fn compare_hits(a: &SparseHit, b: &SparseHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.position.cmp(&b.position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn corpus() -> SparseIndex {
        SparseIndex::from_texts([
            "rust programming systems language fast",
            "python programming scripting easy",
            "java enterprise programming verbose",
            "rust memory safety zero cost abstractions",
        ])
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("  Breach OF\tContract\n dispute "),
            vec!["breach", "of", "contract", "dispute"]
        );
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_finds_matching_docs() {
        let index = corpus();
        let scores = index.score_query("rust");
        assert_eq!(scores.len(), 4);
        assert!(scores[0] > 0.0);
        assert!(scores[3] > 0.0);
        assert_eq!(scores[1], 0.0);
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn test_known_value() {
        // 3 docs, "contract" in 1: idf = ln(2.5) - ln(1.5)
        let index = SparseIndex::from_texts(["contract breach", "assault case", "other matter"]);
        let idf = (2.5f64).ln() - (1.5f64).ln();
        assert!((index.idf("contract").unwrap() - idf).abs() < 1e-12);

        // dl = avgdl = 2, tf = 1 -> tf part = 2.5 / (1 + 1.5) = 1
        let scores = index.score_query("CONTRACT");
        assert!((scores[0] - idf).abs() < 1e-12);
    }

    #[test]
    fn test_negative_idf_floored() {
        // "the" appears in most documents, so its raw idf is negative
        let index = SparseIndex::from_texts(["the cat", "the dog", "the bird", "a fish"]);
        let the = index.idf("the").unwrap();
        assert!(the > 0.0);
        assert!(the < index.idf("cat").unwrap());
    }

    #[test]
    fn test_higher_tf_ranks_first() {
        let index = SparseIndex::from_texts(["rust rust rust", "rust programming"]);
        let scores = index.score_query("rust");
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn test_repeated_query_tokens_accumulate() {
        let index = corpus();
        let once = index.score_query("rust");
        let twice = index.score_query("rust rust");
        assert!((twice[0] - 2.0 * once[0]).abs() < 1e-12);
    }

    #[test]
    fn test_search_pool() {
        let index = SparseIndex::from_texts([
            "tort",
            "contract contract",
            "contract",
            "tort claim",
            "assault",
        ]);
        let hits = index.search(&tokenize("contract"), 3);
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        // Zero scorers fill the pool in position order
        assert_eq!(positions, vec![1, 2, 0]);
        assert_eq!(hits[2].score, 0.0);

        assert_eq!(index.search(&tokenize("contract"), 100).len(), 5);
        assert!(index.search(&tokenize("contract"), 0).is_empty());
    }

    #[test]
    fn test_no_match_and_empty_docs() {
        let index = SparseIndex::from_texts(["alpha beta", "", "gamma"]);
        assert!(index.score_query("nonexistent_xyz_term").iter().all(|&s| s == 0.0));
        assert_eq!(index.score_query("alpha")[1], 0.0);
        assert!(index.score_query("").iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_all_empty_corpus() {
        let index = SparseIndex::from_texts(["", ""]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.average_doc_length(), 0.0);
        assert_eq!(index.score_query("anything"), vec![0.0, 0.0]);

        let empty = SparseIndex::from_texts(std::iter::empty::<&str>());
        assert!(empty.is_empty());
        assert!(empty.score_query("anything").is_empty());
    }

    #[test]
    fn test_cache_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bm25_index.cache");

        let index = corpus();
        index.save_cache(&path).unwrap();

        let loaded = SparseIndex::load_cache(&path).unwrap();
        assert_eq!(loaded.len(), index.len());
        for query in ["rust", "programming easy", "zero cost rust rust", "missing"] {
            assert_eq!(loaded.score_query(query), index.score_query(query));
        }
    }

    #[test]
    fn test_load_cache_rejects_inconsistent_stats() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bm25_index.cache");

        let stats = CorpusStats {
            doc_freqs: vec![AHashMap::new()],
            doc_len: vec![4, 2],
        };
        cache::write(&path, &stats).unwrap();

        assert!(matches!(
            SparseIndex::load_cache(&path),
            Err(CacheError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_load_or_build_recovers_from_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bm25_index.cache");
        std::fs::write(&path, b"definitely not a cache").unwrap();

        let texts = ["contract breach", "assault", "tort claim"];
        let index = SparseIndex::load_or_build(&path, texts.len(), texts);
        assert_eq!(index.len(), 3);
        assert!(index.score_query("contract")[0] > 0.0);
        assert!(SparseIndex::load_cache(&path).is_ok());
    }

    #[test]
    fn test_load_or_build_rebuilds_mismatched_cache() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bm25_index.cache");

        SparseIndex::from_texts(["one document"]).save_cache(&path).unwrap();

        let texts = ["alpha", "beta"];
        let index = SparseIndex::load_or_build(&path, texts.len(), texts);
        assert_eq!(index.len(), 2);

        // The rebuilt index replaced the stale cache
        let reloaded = SparseIndex::load_cache(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
    }
}
