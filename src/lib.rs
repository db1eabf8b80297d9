//! k-nearest-neighbor classification over an exact k-d tree or a brute-force index.

pub mod common_types;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod knn;

#[cfg(feature = "python")]
mod python;

pub use common_types::{DataPoint, Neighbor};
pub use error::{KnnError, Result};
pub use evaluate::accuracy_score;
pub use knn::brute_force::BruteForceIndex;
pub use knn::classifier::{KnnClassifier, KnnConfig, majority_vote};
pub use knn::kd_tree::KdTree;
pub use knn::{NeighborIndex, SearchStrategy, squared_euclidean};
