//! Score fusion for dense and sparse candidate pools
//!
//! Each pool is min-max normalized on its own scores, the pools are unioned,
//! and every candidate gets `dense_weight * dense + sparse_weight * sparse`,
//! where a modality that did not retrieve the candidate contributes 0.

use crate::index::{DenseHit, SparseHit};
use ahash::AHashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid weight configuration: weights must be finite, non-negative and not both zero")]
    InvalidWeights,
}

/// Relative weight of each modality in the combined score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub dense: f64,
    pub sparse: f64,
}

impl FusionWeights {
    pub fn new(dense: f64, sparse: f64) -> Result<Self, FusionError> {
        let valid = |w: f64| w.is_finite() && w >= 0.0;
        if !valid(dense) || !valid(sparse) || (dense == 0.0 && sparse == 0.0) {
            return Err(FusionError::InvalidWeights);
        }
        Ok(Self { dense, sparse })
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            dense: 0.7,
            sparse: 0.3,
        }
    }
}

/// One member of the union of both pools
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub position: usize,
    /// Raw cosine similarity, if the dense pool retrieved it
    pub dense_score: Option<f32>,
    /// Raw BM25 score, if the sparse pool retrieved it
    pub sparse_score: Option<f64>,
    /// Normalized dense component (0 when absent)
    pub dense_norm: f64,
    /// Normalized sparse component (0 when absent)
    pub sparse_norm: f64,
    pub combined_score: f64,
}

/// Min-max scale into [0, 1]
///
/// A pool whose scores are all equal (including a single-member pool)
/// normalizes to all zeros.
pub fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
    let Some((min, max)) = min_max(scores) else {
        return Vec::new();
    };
    if max == min {
        return vec![0.0; scores.len()];
    }
    let range = max - min;
    scores.iter().map(|&s| (s - min) / range).collect()
}

fn min_max(scores: &[f64]) -> Option<(f64, f64)> {
    let first = *scores.first()?;
    Some(
        scores
            .iter()
            .fold((first, first), |(lo, hi), &s| (lo.min(s), hi.max(s))),
    )
}

/// Union both pools and rank by combined score
///
/// Union order is the dense pool in rank order followed by sparse-only
/// candidates in rank order; the sort is stable, so equal combined scores
/// keep that order.
pub fn fuse(dense_pool: &[DenseHit], sparse_pool: &[SparseHit], weights: FusionWeights) -> Vec<Candidate> {
    let dense_raw: Vec<f64> = dense_pool.iter().map(|h| h.score as f64).collect();
    let sparse_raw: Vec<f64> = sparse_pool.iter().map(|h| h.score).collect();
    let dense_norm = min_max_normalize(&dense_raw);
    let sparse_norm = min_max_normalize(&sparse_raw);

    let mut candidates: Vec<Candidate> = Vec::with_capacity(dense_pool.len() + sparse_pool.len());
    let mut slots: AHashMap<usize, usize> = AHashMap::with_capacity(candidates.capacity());

    for (hit, &norm) in dense_pool.iter().zip(&dense_norm) {
        slots.insert(hit.position, candidates.len());
        candidates.push(Candidate {
            position: hit.position,
            dense_score: Some(hit.score),
            sparse_score: None,
            dense_norm: norm,
            sparse_norm: 0.0,
            combined_score: 0.0,
        });
    }

    for (hit, &norm) in sparse_pool.iter().zip(&sparse_norm) {
        match slots.get(&hit.position) {
            Some(&slot) => {
                let candidate = &mut candidates[slot];
                candidate.sparse_score = Some(hit.score);
                candidate.sparse_norm = norm;
            }
            None => {
                slots.insert(hit.position, candidates.len());
                candidates.push(Candidate {
                    position: hit.position,
                    dense_score: None,
                    sparse_score: Some(hit.score),
                    dense_norm: 0.0,
                    sparse_norm: norm,
                    combined_score: 0.0,
                });
            }
        }
    }

    for candidate in &mut candidates {
        candidate.combined_score =
            weights.dense * candidate.dense_norm + weights.sparse * candidate.sparse_norm;
    }

    candidates.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(hits: &[(usize, f32)]) -> Vec<DenseHit> {
        hits.iter()
            .map(|&(position, score)| DenseHit { position, score })
            .collect()
    }

    fn sparse(hits: &[(usize, f64)]) -> Vec<SparseHit> {
        hits.iter()
            .map(|&(position, score)| SparseHit { position, score })
            .collect()
    }

    #[test]
    fn test_normalize_bounds() {
        let scores = vec![3.0, 7.5, -1.0, 2.0];
        let normalized = min_max_normalize(&scores);
        assert_eq!(normalized[1], 1.0);
        assert_eq!(normalized[2], 0.0);
        assert!(normalized.iter().all(|&s| (0.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_normalize_degenerate() {
        assert!(min_max_normalize(&[]).is_empty());
        assert_eq!(min_max_normalize(&[4.2]), vec![0.0]);
        assert_eq!(min_max_normalize(&[2.0, 2.0, 2.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_weights_validation() {
        assert!(FusionWeights::new(0.7, 0.3).is_ok());
        assert!(FusionWeights::new(1.0, 0.0).is_ok());
        assert!(FusionWeights::new(0.0, 0.0).is_err());
        assert!(FusionWeights::new(-0.1, 0.5).is_err());
        assert!(FusionWeights::new(f64::INFINITY, 0.5).is_err());
    }

    #[test]
    fn test_union_keeps_single_modality_hits() {
        let fused = fuse(
            &dense(&[(0, 0.9), (1, 0.5), (2, 0.1)]),
            &sparse(&[(3, 8.0), (1, 4.0), (4, 0.0)]),
            FusionWeights::default(),
        );

        let mut positions: Vec<usize> = fused.iter().map(|c| c.position).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);

        let lexical_only = fused.iter().find(|c| c.position == 3).unwrap();
        assert_eq!(lexical_only.dense_score, None);
        assert_eq!(lexical_only.dense_norm, 0.0);
        assert_eq!(lexical_only.sparse_norm, 1.0);
        assert!((lexical_only.combined_score - 0.3).abs() < 1e-12);

        let both = fused.iter().find(|c| c.position == 1).unwrap();
        assert_eq!(both.dense_score, Some(0.5));
        assert_eq!(both.sparse_score, Some(4.0));
        assert!((both.dense_norm - 0.5).abs() < 1e-6);
        assert!((both.sparse_norm - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_sorted_descending() {
        let fused = fuse(
            &dense(&[(0, 0.9), (1, 0.5), (2, 0.1)]),
            &sparse(&[(2, 10.0), (0, 1.0)]),
            FusionWeights::default(),
        );
        assert!(fused
            .windows(2)
            .all(|w| w[0].combined_score >= w[1].combined_score));
        assert_eq!(fused[0].position, 0);
    }

    #[test]
    fn test_ties_keep_union_order() {
        // Dense pool collapses to zero, sparse pool has one distinct value
        let fused = fuse(
            &dense(&[(5, 0.4), (2, 0.4)]),
            &sparse(&[(9, 0.0), (5, 0.0), (1, 0.0)]),
            FusionWeights::default(),
        );
        let positions: Vec<usize> = fused.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![5, 2, 9, 1]);
        assert!(fused.iter().all(|c| c.combined_score == 0.0));
    }

    #[test]
    fn test_empty_pools() {
        assert!(fuse(&[], &[], FusionWeights::default()).is_empty());

        let dense_only = fuse(&dense(&[(0, 0.8), (1, 0.2)]), &[], FusionWeights::default());
        assert_eq!(dense_only.len(), 2);
        assert_eq!(dense_only[0].combined_score, 0.7);
    }
}
