//! This module contains common data structures used by the indexes and the classifier.

use num_traits::Float;

use crate::error::{KnnError, Result};

/// Represents a single training sample, with features and a label.
///
/// - `F`: The type of the features (e.g., `f64`, `f32`).
/// - `L`: The type of the label (e.g., `i64`, `u8`, an enum with `Ord`).
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint<F, L> {
    pub features: Vec<F>,
    pub label: L,
}

impl<F, L> DataPoint<F, L> {
    pub fn new(features: Vec<F>, label: L) -> Self {
        DataPoint { features, label }
    }
}

/// One retrieved neighbor of a query point.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor<L> {
    /// Row of this point in the training set the index was built from.
    pub index: usize,
    /// Squared Euclidean distance to the query.
    pub distance: f64,
    pub label: L,
}

/// Zips a feature matrix and a parallel label sequence into data points,
/// validating the training-set shape on the way.
pub fn zip_training_set<F: Float, L: Clone>(
    features: &[Vec<F>],
    labels: &[L],
) -> Result<Vec<DataPoint<F, L>>> {
    if features.is_empty() || labels.is_empty() {
        return Err(KnnError::invalid("training set must not be empty"));
    }
    if features.len() != labels.len() {
        return Err(KnnError::invalid(format!(
            "feature rows ({}) and labels ({}) differ in length",
            features.len(),
            labels.len()
        )));
    }
    Ok(features
        .iter()
        .zip(labels.iter())
        .map(|(row, label)| DataPoint::new(row.clone(), label.clone()))
        .collect())
}

/// Checks that every training point has the dimension of the first one and
/// only finite coordinates. Returns that dimension.
pub(crate) fn validate_points<F: Float, L>(points: &[DataPoint<F, L>]) -> Result<usize> {
    let dims = match points.first() {
        Some(p) => p.features.len(),
        None => return Err(KnnError::invalid("training set must not be empty")),
    };
    if dims == 0 {
        return Err(KnnError::invalid("training points must have at least one feature"));
    }
    for (row, p) in points.iter().enumerate() {
        if p.features.len() != dims {
            return Err(KnnError::invalid(format!(
                "training row {} has {} features, expected {}",
                row,
                p.features.len(),
                dims
            )));
        }
        if p.features.iter().any(|x| !x.is_finite()) {
            return Err(KnnError::invalid(format!(
                "training row {} contains a non-finite value",
                row
            )));
        }
    }
    Ok(dims)
}

/// Checks a query point against the index dimension and `k`.
pub(crate) fn validate_query<F: Float>(point: &[F], dims: usize, k: usize) -> Result<()> {
    if k == 0 {
        return Err(KnnError::invalid("k must be greater than 0"));
    }
    if point.len() != dims {
        return Err(KnnError::invalid(format!(
            "query has {} features, index was built with {}",
            point.len(),
            dims
        )));
    }
    if point.iter().any(|x| !x.is_finite()) {
        return Err(KnnError::invalid("query contains a non-finite value"));
    }
    Ok(())
}
