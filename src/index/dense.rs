/// Exact cosine-similarity index over L2-normalized embeddings
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DenseIndexError {
    #[error("Dimension mismatch at position {position}: expected {expected}, got {actual}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Empty embedding at position {position}")]
    EmptyVector { position: usize },

    #[error("Query dimension mismatch: expected {expected}, got {actual}")]
    QueryDimensionMismatch { expected: usize, actual: usize },
}

/// Search hit: index position and cosine similarity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenseHit {
    /// Position in the document store
    pub position: usize,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Flat inner-product index
///
/// Vectors are stored contiguously, normalized at build time, so the inner
/// product with a normalized query equals cosine similarity. Position `i`
/// always refers to the `i`-th vector passed to [`DenseIndex::build`].
#[derive(Debug, Clone, Default)]
pub struct DenseIndex {
    data: Vec<f32>,
    dimension: usize,
    count: usize,
}

impl DenseIndex {
    /// Build an index from vectors in store order
    ///
    /// Owned vectors are released one by one as they are copied in. All
    /// vectors must share one non-zero length.
    pub fn build<I, V>(vectors: I) -> Result<Self, DenseIndexError>
    where
        I: IntoIterator<Item = V>,
        V: AsRef<[f32]>,
    {
        let mut vectors = vectors.into_iter();
        let Some(first) = vectors.next() else {
            return Ok(Self::default());
        };
        let dimension = first.as_ref().len();
        if dimension == 0 {
            return Err(DenseIndexError::EmptyVector { position: 0 });
        }

        let mut data = Vec::with_capacity(dimension * (vectors.size_hint().0 + 1));
        let mut count = 0;
        for (position, vector) in std::iter::once(first).chain(vectors).enumerate() {
            let vector = vector.as_ref();
            if vector.len() != dimension {
                return Err(DenseIndexError::DimensionMismatch {
                    position,
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            let start = data.len();
            data.extend_from_slice(vector);
            l2_normalize(&mut data[start..]);
            count += 1;
        }

        tracing::info!("Dense index built with {} vectors ({}D)", count, dimension);

        Ok(Self {
            data,
            dimension,
            count,
        })
    }

    /// Return the `k` most similar positions, best first
    ///
    /// Ties are broken by ascending position. `k` is clamped to the index size.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<DenseHit>, DenseIndexError> {
        if self.count == 0 || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(DenseIndexError::QueryDimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut query = query.to_vec();
        l2_normalize(&mut query);

        let mut hits: Vec<DenseHit> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| DenseHit {
                position,
                score: dot(vector, &query),
            })
            .collect();

        let k = k.min(self.count);
        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, compare_hits);
            hits.truncate(k);
        }
        hits.sort_unstable_by(compare_hits);

        Ok(hits)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Vector dimension (0 for an empty index)
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

fn compare_hits(a: &DenseHit, b: &DenseHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.position.cmp(&b.position))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Divide by the Euclidean norm in place; zero vectors stay zero
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}
