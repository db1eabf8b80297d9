//! The K-Nearest Neighbors classifier: fits one of the exact indexes and
//! predicts by majority vote over the retrieved neighbor labels.

use std::collections::BTreeMap;

use num_traits::{AsPrimitive, Float};
use rayon::prelude::*;
use tracing::debug;

use super::brute_force::BruteForceIndex;
use super::kd_tree::KdTree;
use super::{NeighborIndex, SearchStrategy};
use crate::common_types::{DataPoint, Neighbor, validate_query, zip_training_set};
use crate::error::{KnnError, Result};

/// Options recognized by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnnConfig {
    /// Number of neighbors that vote.
    pub k: usize,
    /// Index built by `fit`.
    pub strategy: SearchStrategy,
    /// Fan batch prediction out over the rayon thread pool.
    pub parallel: bool,
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self {
            k: 5,
            strategy: SearchStrategy::KdTree,
            parallel: false,
        }
    }
}

impl KnnConfig {
    pub fn new(k: usize) -> Self {
        Self { k, ..Self::default() }
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// The index held by a fitted classifier.
#[derive(Debug)]
enum FittedIndex<F, L> {
    KdTree(KdTree<F, L>),
    BruteForce(BruteForceIndex<F, L>),
}

impl<F, L> NeighborIndex<F, L> for FittedIndex<F, L>
where
    F: Float + AsPrimitive<f64> + Send + Sync,
    L: Clone + Send + Sync,
{
    fn dimension(&self) -> usize {
        match self {
            FittedIndex::KdTree(tree) => tree.dimension(),
            FittedIndex::BruteForce(brute) => brute.dimension(),
        }
    }

    fn len(&self) -> usize {
        match self {
            FittedIndex::KdTree(tree) => tree.len(),
            FittedIndex::BruteForce(brute) => brute.len(),
        }
    }

    fn query_neighbors(&self, point: &[F], k: usize) -> Result<Vec<Neighbor<L>>> {
        match self {
            FittedIndex::KdTree(tree) => tree.query_neighbors(point, k),
            FittedIndex::BruteForce(brute) => brute.query_neighbors(point, k),
        }
    }
}

/// Picks the most frequent label. Ties go to the smallest label.
///
/// Returns `None` only for an empty slice.
pub fn majority_vote<L: Ord + Clone>(labels: &[L]) -> Option<L> {
    let mut label_counts: BTreeMap<&L, usize> = BTreeMap::new();
    for label in labels {
        *label_counts.entry(label).or_insert(0) += 1;
    }

    // BTreeMap iterates in ascending label order; only a strictly larger
    // count displaces the current winner.
    let mut winner: Option<(&L, usize)> = None;
    for (label, count) in label_counts {
        match winner {
            Some((_, best)) if count <= best => {}
            _ => winner = Some((label, count)),
        }
    }
    winner.map(|(label, _)| label.clone())
}

/// The K-Nearest Neighbors Classifier.
///
/// `Unfitted` until the first successful [`fit`](Self::fit); a later `fit`
/// replaces the index wholesale. A failed `fit` leaves the previous state.
#[derive(Debug)]
pub struct KnnClassifier<F, L> {
    config: KnnConfig,
    index: Option<FittedIndex<F, L>>,
}

impl<F, L> KnnClassifier<F, L>
where
    F: Float + AsPrimitive<f64> + Send + Sync,
    L: Clone + Ord + Send + Sync,
{
    /// Fails with `InvalidInput` if `config.k` is 0.
    pub fn new(config: KnnConfig) -> Result<Self> {
        if config.k == 0 {
            return Err(KnnError::invalid("k must be greater than 0"));
        }
        Ok(Self { config, index: None })
    }

    pub fn config(&self) -> &KnnConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.index.is_some()
    }

    /// Strategy of the fitted index, `None` before `fit`.
    pub fn search_strategy(&self) -> Option<SearchStrategy> {
        self.index.as_ref().map(|index| match index {
            FittedIndex::KdTree(_) => SearchStrategy::KdTree,
            FittedIndex::BruteForce(_) => SearchStrategy::BruteForce,
        })
    }

    /// Training dimension, `None` before `fit`.
    pub fn n_features(&self) -> Option<usize> {
        self.index.as_ref().map(|index| index.dimension())
    }

    /// Builds the configured index from a feature matrix and parallel labels.
    pub fn fit(&mut self, features: &[Vec<F>], labels: &[L]) -> Result<()> {
        self.fit_points(zip_training_set(features, labels)?)
    }

    /// Builds the configured index from owned data points.
    pub fn fit_points(&mut self, training_data: Vec<DataPoint<F, L>>) -> Result<()> {
        let index = match self.config.strategy {
            SearchStrategy::KdTree => FittedIndex::KdTree(KdTree::new(training_data)?),
            SearchStrategy::BruteForce => FittedIndex::BruteForce(BruteForceIndex::new(training_data)?),
        };
        debug!(
            strategy = ?self.config.strategy,
            points = index.len(),
            dims = index.dimension(),
            "fitted classifier"
        );
        self.index = Some(index);
        Ok(())
    }

    /// Predicts one label per query, in input order, with the configured `k`.
    pub fn predict(&self, queries: &[Vec<F>]) -> Result<Vec<L>> {
        self.predict_with_k(queries, self.config.k)
    }

    /// Predicts one label per query with an explicit neighbor count.
    ///
    /// All queries are validated before any is answered: one bad row fails the
    /// whole batch.
    pub fn predict_with_k(&self, queries: &[Vec<F>], k: usize) -> Result<Vec<L>> {
        let index = self.validated_index(queries, k)?;
        self.map_queries(queries, |query| {
            let labels = index.query(query, k)?;
            majority_vote(&labels).ok_or_else(|| KnnError::invalid("no neighbors retrieved"))
        })
    }

    pub fn predict_single(&self, query: &[F]) -> Result<L> {
        let index = self.index.as_ref().ok_or(KnnError::NotFitted)?;
        let labels = index.query(query, self.config.k)?;
        majority_vote(&labels).ok_or_else(|| KnnError::invalid("no neighbors retrieved"))
    }

    /// Per-query neighbor sets under the same batch contract as `predict`.
    ///
    /// K-d tree results are unordered; brute-force results ascend by distance.
    pub fn kneighbors(&self, queries: &[Vec<F>], k: usize) -> Result<Vec<Vec<Neighbor<L>>>> {
        let index = self.validated_index(queries, k)?;
        self.map_queries(queries, |query| index.query_neighbors(query, k))
    }

    fn validated_index(&self, queries: &[Vec<F>], k: usize) -> Result<&FittedIndex<F, L>> {
        let index = self.index.as_ref().ok_or(KnnError::NotFitted)?;
        if k == 0 {
            return Err(KnnError::invalid("k must be greater than 0"));
        }
        let dims = index.dimension();
        for (row, query) in queries.iter().enumerate() {
            validate_query(query, dims, k).map_err(|err| match err {
                KnnError::InvalidInput(message) => KnnError::invalid(format!("query row {}: {}", row, message)),
                other => other,
            })?;
        }
        Ok(index)
    }

    /// Runs `op` once per query and collects results in input order.
    ///
    /// In parallel mode the queries are split across the rayon pool. `op` only
    /// reads the fitted index (borrowed immutably for the whole call) and keeps
    /// its scratch state local, and the ordered collect fills output slot `i`
    /// from query `i` alone, so both modes return identical output.
    fn map_queries<T, G>(&self, queries: &[Vec<F>], op: G) -> Result<Vec<T>>
    where
        T: Send,
        G: Fn(&[F]) -> Result<T> + Sync + Send,
    {
        debug!(queries = queries.len(), parallel = self.config.parallel, "answering batch");
        if self.config.parallel {
            queries.par_iter().map(|query| op(query)).collect()
        } else {
            queries.iter().map(|query| op(query)).collect()
        }
    }
}
