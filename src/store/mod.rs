//! In-memory vector store.
//!
//! A `VectorStore` holds fixed-dimension embedding vectors, each paired with an
//! opaque payload, and answers exhaustive top-k queries under a choice of
//! [`Metric`]. Payloads are never inspected; callers decide what they mean
//! (the index builder uses corpus positions).
//!
//! Entries are append-only. Insertion order is kept and used only to break
//! ties between equal scores.
//!
//! # Example
//!
//! ```
//! use scholar_kb::store::{Metric, VectorStore};
//!
//! let mut store = VectorStore::new(2)?;
//! store.insert(vec![0.0, 0.0], "origin")?;
//! store.insert(vec![1.0, 0.0], "east")?;
//! store.insert(vec![5.0, 5.0], "far")?;
//!
//! let nearest = store.retrieve(&[0.0, 0.0], Metric::EuclideanDistance, 1)?;
//! assert_eq!(nearest, vec!["origin"]);
//! # Ok::<(), scholar_kb::store::StoreError>(())
//! ```

pub mod metric;
pub mod persist;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use metric::Metric;

/// Errors that can occur during vector store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Vector length does not match the store dimension
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    /// A store was requested with `dim == 0`
    #[error("Store dimension must be positive")]
    ZeroDimension,

    /// Metric identifier not recognised
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// Vector cannot be scored: a NaN or infinite component, or zero norm under cosine
    #[error("Degenerate vector: {0}")]
    DegenerateVector(String),

    /// Serialized store is malformed or truncated
    #[error("Corrupt persisted state: {0}")]
    CorruptPersistedState(String),

    /// Underlying reader/writer failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for vector store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A stored (vector, payload) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<P> {
    /// Embedding vector, always exactly `dim` components
    pub vector: Vec<f32>,

    /// Opaque value the vector stands in for
    pub payload: P,
}

/// A retrieved payload together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPayload<P> {
    /// The stored payload
    pub payload: P,

    /// Metric score (distance for L2, similarity otherwise)
    pub score: f32,

    /// Insertion position of the entry in the store
    pub position: usize,
}

/// Exhaustive-scan vector store.
///
/// Retrieval borrows the store immutably and insertion mutably, so any number
/// of concurrent readers may query a shared store while no writer is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "persist::PersistedStore<P>")]
pub struct VectorStore<P> {
    dim: usize,
    entries: Vec<Entry<P>>,
}

impl<P> VectorStore<P> {
    /// Create an empty store for vectors of length `dim`.
    ///
    /// # Errors
    /// Returns `StoreError::ZeroDimension` if `dim` is zero
    pub fn new(dim: usize) -> StoreResult<Self> {
        if dim == 0 {
            return Err(StoreError::ZeroDimension);
        }
        Ok(Self {
            dim,
            entries: Vec::new(),
        })
    }

    /// Create an empty store with room for `capacity` entries.
    pub fn with_capacity(dim: usize, capacity: usize) -> StoreResult<Self> {
        let mut store = Self::new(dim)?;
        store.entries.reserve(capacity);
        Ok(store)
    }

    /// Rebuild a store from already-validated parts.
    pub(crate) fn from_entries(dim: usize, entries: Vec<Entry<P>>) -> StoreResult<Self> {
        if dim == 0 {
            return Err(StoreError::ZeroDimension);
        }
        for entry in &entries {
            check_vector(dim, &entry.vector)?;
        }
        Ok(Self { dim, entries })
    }

    /// Vector dimension fixed at construction.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored entries in insertion order.
    pub fn entries(&self) -> &[Entry<P>] {
        &self.entries
    }

    /// Iterate over payloads in insertion order.
    pub fn payloads(&self) -> impl Iterator<Item = &P> {
        self.entries.iter().map(|e| &e.payload)
    }

    /// Append a vector with its payload.
    ///
    /// Identical vectors or payloads may be stored any number of times.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidDimension` if `vector.len() != dim` and
    /// `StoreError::DegenerateVector` if a component is NaN or infinite; the
    /// store is left unchanged.
    pub fn insert(&mut self, vector: Vec<f32>, payload: P) -> StoreResult<()> {
        check_vector(self.dim, &vector)?;
        self.entries.push(Entry { vector, payload });
        Ok(())
    }

    /// Rank all entries against `query` and return the best `k` with scores.
    ///
    /// Every entry is scored (no index, no pruning). Scores are sorted with a
    /// stable sort, ascending for Euclidean distance and descending for cosine
    /// similarity and inner product, so equal scores keep insertion order.
    /// A `k` larger than the store returns every entry; an empty store returns
    /// an empty vector.
    ///
    /// # Errors
    /// - `StoreError::InvalidDimension` if `query.len() != dim`
    /// - `StoreError::DegenerateVector` for a non-finite query component, or a
    ///   zero-norm query under cosine
    pub fn retrieve_scored(
        &self,
        query: &[f32],
        metric: Metric,
        k: usize,
    ) -> StoreResult<Vec<ScoredPayload<&P>>> {
        check_vector(self.dim, query)?;
        metric.check_query(query)?;

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, metric.score(query, &entry.vector)))
            .collect();

        // sort_by is stable: ties stay in insertion order
        scored.sort_by(|a, b| metric.rank_order(a.1, b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| ScoredPayload {
                payload: &self.entries[position].payload,
                score,
                position,
            })
            .collect())
    }

}

fn check_vector(dim: usize, vector: &[f32]) -> StoreResult<()> {
    if vector.len() != dim {
        return Err(StoreError::InvalidDimension {
            expected: dim,
            actual: vector.len(),
        });
    }
    // total_cmp ranks NaN above every real score
    if let Some(i) = vector.iter().position(|x| !x.is_finite()) {
        return Err(StoreError::DegenerateVector(format!(
            "component {} is {}",
            i, vector[i]
        )));
    }
    Ok(())
}

impl<P: Clone> VectorStore<P> {
    /// Return the payloads of the `k` entries most similar to `query`.
    ///
    /// See [`retrieve_scored`](Self::retrieve_scored) for ordering and errors.
    pub fn retrieve(&self, query: &[f32], metric: Metric, k: usize) -> StoreResult<Vec<P>> {
        Ok(self
            .retrieve_scored(query, metric, k)?
            .into_iter()
            .map(|hit| hit.payload.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_point_store() -> VectorStore<&'static str> {
        let mut store = VectorStore::new(2).unwrap();
        store.insert(vec![0.0, 0.0], "origin").unwrap();
        store.insert(vec![1.0, 0.0], "east").unwrap();
        store.insert(vec![5.0, 5.0], "far").unwrap();
        store
    }

    #[test]
    fn test_new_rejects_zero_dimension() {
        assert!(matches!(
            VectorStore::<u32>::new(0),
            Err(StoreError::ZeroDimension)
        ));
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = VectorStore::<u32>::new(4).unwrap();
        assert_eq!(store.dim(), 4);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_wrong_dimension_leaves_store_unchanged() {
        let mut store = three_point_store();

        for bad in [vec![], vec![1.0], vec![1.0, 2.0, 3.0]] {
            let len = bad.len();
            match store.insert(bad, "bad") {
                Err(StoreError::InvalidDimension { expected, actual }) => {
                    assert_eq!(expected, 2);
                    assert_eq!(actual, len);
                }
                other => panic!("Expected InvalidDimension, got {:?}", other),
            }
            assert_eq!(store.len(), 3);
        }
    }

    #[test]
    fn test_insert_allows_duplicates() {
        let mut store = VectorStore::new(2).unwrap();
        store.insert(vec![1.0, 1.0], 7).unwrap();
        store.insert(vec![1.0, 1.0], 7).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.payloads().copied().collect::<Vec<_>>(), vec![7, 7]);
    }

    #[test]
    fn test_euclidean_self_distance_wins() {
        let store = three_point_store();
        let result = store
            .retrieve(&[0.0, 0.0], Metric::EuclideanDistance, 1)
            .unwrap();
        assert_eq!(result, vec!["origin"]);
    }

    #[test]
    fn test_euclidean_sorts_ascending() {
        let store = three_point_store();
        let hits = store
            .retrieve_scored(&[0.0, 0.0], Metric::EuclideanDistance, 3)
            .unwrap();
        let payloads: Vec<_> = hits.iter().map(|h| *h.payload).collect();
        assert_eq!(payloads, vec!["origin", "east", "far"]);
        assert!(hits.windows(2).all(|w| w[0].score <= w[1].score));
        assert_eq!(hits[0].score, 0.0);
    }

    #[test]
    fn test_cosine_ties_resolve_by_insertion_order() {
        let mut store = VectorStore::new(2).unwrap();
        store.insert(vec![1.0, 0.0], "first-east").unwrap();
        store.insert(vec![0.0, 2.0], "north").unwrap();
        store.insert(vec![4.0, 0.0], "second-east").unwrap();

        // [1,0], [0,2] and [4,0] all sit at 45 degrees from [1,1]
        let result = store
            .retrieve(&[1.0, 1.0], Metric::CosineSimilarity, 3)
            .unwrap();
        assert_eq!(result, vec!["first-east", "north", "second-east"]);

        let result = store
            .retrieve(&[1.0, 0.0], Metric::CosineSimilarity, 2)
            .unwrap();
        assert_eq!(result, vec!["first-east", "second-east"]);
    }

    #[test]
    fn test_inner_product_sorts_descending_and_is_unnormalized() {
        let mut store = VectorStore::new(2).unwrap();
        store.insert(vec![1.0, 0.0], "unit").unwrap();
        store.insert(vec![10.0, 0.0], "long").unwrap();
        store.insert(vec![-1.0, 0.0], "opposite").unwrap();

        let hits = store
            .retrieve_scored(&[1.0, 0.0], Metric::InnerProduct, 3)
            .unwrap();
        let payloads: Vec<_> = hits.iter().map(|h| *h.payload).collect();
        assert_eq!(payloads, vec!["long", "unit", "opposite"]);
        assert_eq!(hits[0].score, 10.0);
        assert_eq!(hits[0].position, 1);
    }

    #[test]
    fn test_k_larger_than_store_returns_all() {
        let store = three_point_store();
        for metric in Metric::ALL {
            let result = store.retrieve(&[1.0, 1.0], metric, 10).unwrap();
            assert_eq!(result.len(), store.len());
        }
    }

    #[test]
    fn test_k_zero_returns_nothing() {
        let store = three_point_store();
        assert!(store
            .retrieve(&[1.0, 1.0], Metric::InnerProduct, 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_empty_store_returns_empty() {
        let store = VectorStore::<u32>::new(3).unwrap();
        for metric in Metric::ALL {
            for k in [0, 1, 5] {
                assert!(store.retrieve(&[1.0, 2.0, 3.0], metric, k).unwrap().is_empty());
            }
        }
    }

    #[test]
    fn test_retrieve_wrong_dimension() {
        let store = three_point_store();
        assert!(matches!(
            store.retrieve(&[1.0, 2.0, 3.0], Metric::EuclideanDistance, 1),
            Err(StoreError::InvalidDimension { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_cosine_zero_query_is_degenerate() {
        let store = three_point_store();
        assert!(matches!(
            store.retrieve(&[0.0, 0.0], Metric::CosineSimilarity, 1),
            Err(StoreError::DegenerateVector(_))
        ));
    }

    #[test]
    fn test_cosine_zero_stored_vector_scores_zero() {
        // "origin" is a zero vector; it should rank between positive and negative matches
        let mut store = three_point_store();
        store.insert(vec![-1.0, 0.0], "west").unwrap();

        let hits = store
            .retrieve_scored(&[1.0, 0.0], Metric::CosineSimilarity, 4)
            .unwrap();
        let payloads: Vec<_> = hits.iter().map(|h| *h.payload).collect();
        assert_eq!(payloads, vec!["east", "far", "origin", "west"]);
        assert_eq!(hits[2].score, 0.0);
    }

    #[test]
    fn test_retrieve_is_idempotent() {
        let store = three_point_store();
        let first = store.retrieve(&[0.3, 0.7], Metric::CosineSimilarity, 2).unwrap();
        for _ in 0..5 {
            let again = store.retrieve(&[0.3, 0.7], Metric::CosineSimilarity, 2).unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_from_entries_validates_dimension() {
        let entries = vec![
            Entry { vector: vec![1.0, 2.0], payload: 0 },
            Entry { vector: vec![1.0], payload: 1 },
        ];
        assert!(matches!(
            VectorStore::from_entries(2, entries),
            Err(StoreError::InvalidDimension { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_insert_rejects_non_finite_components() {
        let mut store = three_point_store();
        for bad in [
            vec![f32::NAN, 0.0],
            vec![0.0, f32::INFINITY],
            vec![f32::NEG_INFINITY, 1.0],
        ] {
            assert!(matches!(
                store.insert(bad, "bad"),
                Err(StoreError::DegenerateVector(_))
            ));
        }
        assert_eq!(store.len(), 3);

        let result = store.retrieve(&[1.0, 1.0], Metric::InnerProduct, 1).unwrap();
        assert_eq!(result, vec!["far"]);
    }

    #[test]
    fn test_retrieve_rejects_non_finite_query() {
        let store = three_point_store();
        for metric in Metric::ALL {
            assert!(matches!(
                store.retrieve(&[f32::NAN, 1.0], metric, 1),
                Err(StoreError::DegenerateVector(_))
            ));
        }
    }

    #[test]
    fn test_large_magnitude_vectors_rank_by_direction() {
        let mut store = VectorStore::new(2).unwrap();
        store.insert(vec![1.0, 0.0], "east").unwrap();
        store.insert(vec![1e20, 1e20], "diagonal").unwrap();
        store.insert(vec![-1.0, -1.0], "anti").unwrap();

        let hits = store
            .retrieve_scored(&[1.0, 1.0], Metric::CosineSimilarity, 3)
            .unwrap();
        let payloads: Vec<_> = hits.iter().map(|h| *h.payload).collect();
        assert_eq!(payloads, vec!["diagonal", "east", "anti"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits.iter().all(|h| (-1.0..=1.0).contains(&h.score)));
    }

    #[test]
    fn test_from_entries_rejects_non_finite() {
        let entries = vec![
            Entry { vector: vec![1.0, 2.0], payload: 0 },
            Entry { vector: vec![f32::NAN, 1.0], payload: 1 },
        ];
        assert!(matches!(
            VectorStore::from_entries(2, entries),
            Err(StoreError::DegenerateVector(_))
        ));
    }

    #[test]
    fn test_concurrent_readers() {
        let store = std::sync::Arc::new(three_point_store());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    store.retrieve(&[0.0, 0.0], Metric::EuclideanDistance, 1).unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec!["origin"]);
        }
    }
}
