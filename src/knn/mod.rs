//! Exact k-nearest-neighbor retrieval and the majority-vote classifier.

pub mod brute_force;
pub mod classifier;
pub mod heap_utils;
pub mod kd_tree;

use num_traits::{AsPrimitive, Float};

use crate::common_types::Neighbor;
use crate::error::Result;

/// Defines which index the classifier builds in `fit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SearchStrategy {
    BruteForce,
    #[default]
    KdTree,
}

/// Calculates the squared Euclidean distance between two feature vectors.
///
/// Both slices must have the same length; callers validate dimensions first.
/// The sum is accumulated in `F` and widened to `f64` for ranking.
#[inline]
pub fn squared_euclidean<F>(a: &[F], b: &[F]) -> f64
where
    F: Float + AsPrimitive<f64>,
{
    debug_assert_eq!(a.len(), b.len());
    let sum_sq_diff = a.iter().zip(b.iter()).fold(F::zero(), |acc, (&x, &y)| {
        let diff = x - y;
        acc + diff * diff
    });
    sum_sq_diff.as_()
}

/// Common query surface of the exact indexes.
///
/// Implementations are immutable after construction, so a shared reference
/// can be queried from many threads at once.
pub trait NeighborIndex<F, L>: Send + Sync {
    /// Dimension fixed by the first training sample.
    fn dimension(&self) -> usize;

    /// Number of training points held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `min(k, len())` nearest training points to `point`.
    fn query_neighbors(&self, point: &[F], k: usize) -> Result<Vec<Neighbor<L>>>;

    /// Labels of the `min(k, len())` nearest training points.
    fn query(&self, point: &[F], k: usize) -> Result<Vec<L>> {
        Ok(self
            .query_neighbors(point, k)?
            .into_iter()
            .map(|n| n.label)
            .collect())
    }
}
