//! Exhaustive (brute-force) exact nearest neighbor index.
//!
//! No preprocessing: the training rows are copied into one flat buffer and every
//! query measures the distance to all of them. Used as the no-index baseline and
//! as the reference the k-d tree is checked against.

use num_traits::{AsPrimitive, Float};
use ordered_float::OrderedFloat;
use tracing::debug;

use super::{NeighborIndex, squared_euclidean};
use crate::common_types::{DataPoint, Neighbor, validate_points, validate_query, zip_training_set};
use crate::error::Result;

/// ### Fields
///
/// * `vectors_flat` - Training features, row-major, for cache locality
/// * `labels` - Label of each training row
/// * `dims` - Feature dimension
#[derive(Debug, Clone)]
pub struct BruteForceIndex<F, L> {
    vectors_flat: Vec<F>,
    labels: Vec<L>,
    dims: usize,
}

impl<F, L> BruteForceIndex<F, L>
where
    F: Float + AsPrimitive<f64> + Send + Sync,
    L: Clone + Send + Sync,
{
    /// Stores the training points verbatim.
    ///
    /// Fails with `InvalidInput` on the same shapes the k-d tree rejects.
    pub fn new(points: Vec<DataPoint<F, L>>) -> Result<Self> {
        let dims = validate_points(&points)?;

        let mut vectors_flat = Vec::with_capacity(points.len() * dims);
        let mut labels = Vec::with_capacity(points.len());
        for point in points {
            vectors_flat.extend_from_slice(&point.features);
            labels.push(point.label);
        }

        debug!(points = labels.len(), dims, "built brute-force index");
        Ok(BruteForceIndex { vectors_flat, labels, dims })
    }

    pub fn from_features(features: &[Vec<F>], labels: &[L]) -> Result<Self> {
        Self::new(zip_training_set(features, labels)?)
    }

    fn row(&self, idx: usize) -> &[F] {
        &self.vectors_flat[idx * self.dims..(idx + 1) * self.dims]
    }

    /// Returns the `min(k, len)` nearest training points, ascending by squared
    /// distance. Equal distances are ordered by training row, lower first.
    pub fn find_nearest_neighbors(&self, query_vec: &[F], k: usize) -> Result<Vec<Neighbor<L>>> {
        validate_query(query_vec, self.dims, k)?;

        let n_vectors = self.labels.len();
        let k = k.min(n_vectors);

        let mut distances: Vec<(OrderedFloat<f64>, usize)> = (0..n_vectors)
            .map(|idx| (OrderedFloat(squared_euclidean(query_vec, self.row(idx))), idx))
            .collect();

        // Keys are unique (row index breaks ties), so any selection/sort
        // algorithm yields the same k rows in the same order.
        if k < n_vectors {
            distances.select_nth_unstable(k - 1);
            distances.truncate(k);
        }
        distances.sort_unstable();

        Ok(distances
            .into_iter()
            .map(|(distance, index)| Neighbor {
                index,
                distance: distance.0,
                label: self.labels[index].clone(),
            })
            .collect())
    }
}

impl<F, L> NeighborIndex<F, L> for BruteForceIndex<F, L>
where
    F: Float + AsPrimitive<f64> + Send + Sync,
    L: Clone + Send + Sync,
{
    fn dimension(&self) -> usize {
        self.dims
    }

    fn len(&self) -> usize {
        self.labels.len()
    }

    fn query_neighbors(&self, point: &[F], k: usize) -> Result<Vec<Neighbor<L>>> {
        self.find_nearest_neighbors(point, k)
    }
}
