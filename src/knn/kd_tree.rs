//! This module contains the k-d tree index.
//!
//! The tree is a balanced binary partition of the training points. At depth `d`
//! the split axis is `d % dims` and the node holds the median point along that
//! axis; points before the median go left, points after it go right. Queries are
//! exact: the far side of a split is skipped only when the splitting hyperplane
//! is farther away than the worst neighbor kept so far.

use num_traits::{AsPrimitive, Float};
use tracing::debug;

use super::heap_utils::KBestNeighbors;
use super::{NeighborIndex, squared_euclidean};
use crate::common_types::{DataPoint, Neighbor, validate_points, validate_query, zip_training_set};
use crate::error::Result;

#[derive(Debug)]
pub struct KdTree<F, L> {
    root: Option<Box<TreeNode<F, L>>>,
    dims: usize,
    len: usize,
}

#[derive(Debug)]
pub struct TreeNode<F, L> {
    point: DataPoint<F, L>,
    /// Row of `point` in the training set.
    index: usize,
    splitting_dimension: usize,
    /// Points whose coordinate on `splitting_dimension` is <= this node's.
    left: Option<Box<TreeNode<F, L>>>,
    /// The remaining points (coordinate >= this node's).
    right: Option<Box<TreeNode<F, L>>>,
}

impl<F, L> KdTree<F, L>
where
    F: Float + AsPrimitive<f64> + Send + Sync,
    L: Clone + Send + Sync,
{
    /// Builds the tree by recursive median selection.
    ///
    /// Fails with `InvalidInput` if `points` is empty, has zero-dimensional or
    /// ragged rows, or contains non-finite coordinates.
    pub fn new(points: Vec<DataPoint<F, L>>) -> Result<Self> {
        let dims = validate_points(&points)?;
        let len = points.len();

        let mut indexed: Vec<(usize, DataPoint<F, L>)> = points.into_iter().enumerate().collect();
        let root = Self::build_recursive(&mut indexed, dims, 0);
        let tree = KdTree { root, dims, len };

        debug!(points = len, dims, depth = tree.depth(), "built k-d tree");
        Ok(tree)
    }

    /// Builds the tree from a feature matrix and a parallel label sequence.
    pub fn from_features(features: &[Vec<F>], labels: &[L]) -> Result<Self> {
        Self::new(zip_training_set(features, labels)?)
    }

    fn build_recursive(
        points_slice: &mut [(usize, DataPoint<F, L>)],
        k_dimensions: usize,
        depth: usize,
    ) -> Option<Box<TreeNode<F, L>>> {
        if points_slice.is_empty() {
            return None;
        }

        let splitting_dimension = depth % k_dimensions;
        let median_idx = points_slice.len() / 2;

        // Linear-time selection. Ties on the axis fall back to the training row,
        // which makes the ordering total and the tree a pure function of the input.
        points_slice.select_nth_unstable_by(median_idx, |(ia, a), (ib, b)| {
            a.features[splitting_dimension]
                .partial_cmp(&b.features[splitting_dimension])
                .unwrap_or(std::cmp::Ordering::Equal) // coordinates are validated finite
                .then_with(|| ia.cmp(ib))
        });

        let (index, point) = points_slice[median_idx].clone();
        let (left_slice, rest) = points_slice.split_at_mut(median_idx);
        let right_slice = &mut rest[1..];

        let left = Self::build_recursive(left_slice, k_dimensions, depth + 1);
        let right = Self::build_recursive(right_slice, k_dimensions, depth + 1);

        Some(Box::new(TreeNode {
            point,
            index,
            splitting_dimension,
            left,
            right,
        }))
    }

    /// Number of levels on the longest root-to-leaf path. An empty tree has depth 0.
    pub fn depth(&self) -> usize {
        fn depth_of<F, L>(node: &Option<Box<TreeNode<F, L>>>) -> usize {
            match node {
                Some(n) => 1 + depth_of(&n.left).max(depth_of(&n.right)),
                None => 0,
            }
        }
        depth_of(&self.root)
    }

    /// Finds the `min(k, len)` nearest training points. The result is not ordered.
    pub fn find_nearest_neighbors(&self, target_features: &[F], n_neighbors: usize) -> Result<Vec<Neighbor<L>>> {
        validate_query(target_features, self.dims, n_neighbors)?;

        let mut best_n = KBestNeighbors::new(n_neighbors.min(self.len));
        Self::search_recursive(&self.root, target_features, &mut best_n);

        Ok(best_n
            .into_unordered_vec()
            .into_iter()
            .map(|(distance, index, label)| Neighbor { index, distance, label: label.clone() })
            .collect())
    }

    /// Recursive helper function for nearest neighbor search.
    fn search_recursive<'a>(
        current_node_opt: &'a Option<Box<TreeNode<F, L>>>,
        target_features: &[F],
        best_n: &mut KBestNeighbors<&'a L>,
    ) {
        let current_node = match current_node_opt {
            Some(node) => node,
            None => return,
        };

        let dist_to_node_point = squared_euclidean(target_features, &current_node.point.features);
        best_n.add(dist_to_node_point, current_node.index, &current_node.point.label);

        let splitting_dim = current_node.splitting_dimension;
        let node_coord_at_dim = current_node.point.features[splitting_dim];
        let target_coord_at_dim = target_features[splitting_dim];

        let (primary_child, secondary_child) = if target_coord_at_dim < node_coord_at_dim {
            (&current_node.left, &current_node.right)
        } else {
            (&current_node.right, &current_node.left)
        };

        Self::search_recursive(primary_child, target_features, best_n);

        // Any point across the plane is at least `diff^2` away. Equality still
        // descends so that an equally distant point with a lower row can win.
        let diff = target_coord_at_dim - node_coord_at_dim;
        let dist_to_hyperplane: f64 = (diff * diff).as_();

        if best_n.current_farthest_distance().map_or(true, |worst| dist_to_hyperplane <= worst) {
            Self::search_recursive(secondary_child, target_features, best_n);
        }
    }
}

impl<F, L> NeighborIndex<F, L> for KdTree<F, L>
where
    F: Float + AsPrimitive<f64> + Send + Sync,
    L: Clone + Send + Sync,
{
    fn dimension(&self) -> usize {
        self.dims
    }

    fn len(&self) -> usize {
        self.len
    }

    fn query_neighbors(&self, point: &[F], k: usize) -> Result<Vec<Neighbor<L>>> {
        self.find_nearest_neighbors(point, k)
    }
}

#[cfg(test)]
mod tests {
    use super::{KdTree, TreeNode};
    use crate::common_types::DataPoint;
    use crate::error::KnnError;
    use crate::knn::NeighborIndex;
    use crate::knn::brute_force::BruteForceIndex;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn make_dp(features: Vec<f64>, label: i64) -> DataPoint<f64, i64> {
        DataPoint { features, label }
    }

    fn random_points(rng: &mut StdRng, n: usize, dims: usize, n_labels: i64) -> Vec<DataPoint<f64, i64>> {
        (0..n)
            .map(|_| {
                let features = (0..dims).map(|_| rng.gen_range(-10.0..10.0)).collect();
                make_dp(features, rng.gen_range(0..n_labels))
            })
            .collect()
    }

    // Helper to check node properties
    fn check_node_props(
        node_opt: &Option<Box<TreeNode<f64, i64>>>,
        expected_features: &[f64],
        expected_label: i64,
        expected_dim: usize,
    ) {
        let node = node_opt.as_ref().expect("Node should exist but was None");
        assert_eq!(&node.point.features, expected_features, "Node point features mismatch");
        assert_eq!(node.point.label, expected_label, "Node point label mismatch");
        assert_eq!(node.splitting_dimension, expected_dim, "Node splitting dimension mismatch");
    }

    /// Walks the tree checking the split invariant against every descendant.
    fn assert_split_invariant(node_opt: &Option<Box<TreeNode<f64, i64>>>, dims: usize, depth: usize) -> usize {
        fn collect<'a>(node_opt: &'a Option<Box<TreeNode<f64, i64>>>, out: &mut Vec<&'a [f64]>) {
            if let Some(node) = node_opt {
                out.push(&node.point.features);
                collect(&node.left, out);
                collect(&node.right, out);
            }
        }

        let node = match node_opt {
            Some(node) => node,
            None => return 0,
        };
        assert_eq!(node.splitting_dimension, depth % dims);
        let axis = node.splitting_dimension;
        let pivot = node.point.features[axis];

        let mut left = Vec::new();
        collect(&node.left, &mut left);
        assert!(left.iter().all(|p| p[axis] <= pivot), "left subtree crosses the split");

        let mut right = Vec::new();
        collect(&node.right, &mut right);
        assert!(right.iter().all(|p| p[axis] >= pivot), "right subtree crosses the split");

        1 + assert_split_invariant(&node.left, dims, depth + 1) + assert_split_invariant(&node.right, dims, depth + 1)
    }

    fn sorted_labels(mut labels: Vec<i64>) -> Vec<i64> {
        labels.sort_unstable();
        labels
    }

    #[test]
    fn test_empty_input() {
        let points: Vec<DataPoint<f64, i64>> = vec![];
        assert!(matches!(KdTree::new(points), Err(KnnError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_dimensionality_points() {
        let points = vec![make_dp(vec![], 0)];
        assert!(matches!(KdTree::new(points), Err(KnnError::InvalidInput(_))));
    }

    #[test]
    fn test_inconsistent_dimensionality() {
        let points = vec![make_dp(vec![1.0, 2.0], 0), make_dp(vec![3.0], 1)];
        assert!(matches!(KdTree::new(points), Err(KnnError::InvalidInput(_))));
    }

    #[test]
    fn test_mismatched_feature_and_label_counts() {
        let features = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let labels = vec![1_i64];
        assert!(matches!(KdTree::from_features(&features, &labels), Err(KnnError::InvalidInput(_))));
    }

    #[test]
    fn test_single_point_tree() {
        let tree = KdTree::new(vec![make_dp(vec![1.0, 2.0], 42)]).expect("Tree creation failed for single point");
        check_node_props(&tree.root, &[1.0, 2.0], 42, 0);
        assert!(tree.root.as_ref().unwrap().left.is_none());
        assert!(tree.root.as_ref().unwrap().right.is_none());
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.query(&[100.0, -3.0], 1).unwrap(), vec![42]);
    }

    #[test]
    fn test_exact_median_construction_2d() {
        let points = vec![
            make_dp(vec![2.0, 3.0], 1), // P1
            make_dp(vec![5.0, 4.0], 2), // P2
            make_dp(vec![9.0, 6.0], 3), // P3
            make_dp(vec![4.0, 7.0], 4), // P4
            make_dp(vec![8.0, 1.0], 5), // P5
            make_dp(vec![7.0, 2.0], 6), // P6
        ];

        let tree = KdTree::new(points).expect("Exact median tree creation failed");

        // Root: P6(7,2), dim=0
        check_node_props(&tree.root, &[7.0, 2.0], 6, 0);
        let root_node = tree.root.as_ref().unwrap();

        // Left child of root: P2(5,4), dim=1
        check_node_props(&root_node.left, &[5.0, 4.0], 2, 1);
        let left_node = root_node.left.as_ref().unwrap();

        // Right child of root: P3(9,6), dim=1
        check_node_props(&root_node.right, &[9.0, 6.0], 3, 1);
        let right_node = root_node.right.as_ref().unwrap();

        check_node_props(&left_node.left, &[2.0, 3.0], 1, 0);
        check_node_props(&left_node.right, &[4.0, 7.0], 4, 0);
        check_node_props(&right_node.left, &[8.0, 1.0], 5, 0);
        assert!(right_node.right.is_none());

        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.dimension(), 2);
    }

    #[test]
    fn test_three_points_exact_median() {
        let points = vec![make_dp(vec![3.0], 3), make_dp(vec![1.0], 1), make_dp(vec![2.0], 2)];
        let tree = KdTree::new(points).unwrap();
        // dim 0 for every level (depth % 1). Median of [1, 2, 3] is 2.
        check_node_props(&tree.root, &[2.0], 2, 0);
        let root_node = tree.root.as_ref().unwrap();
        check_node_props(&root_node.left, &[1.0], 1, 0);
        check_node_props(&root_node.right, &[3.0], 3, 0);
    }

    #[test]
    fn test_duplicate_coordinates_keep_split_invariant() {
        let points: Vec<_> = (0..40).map(|i| make_dp(vec![(i % 3) as f64, (i % 5) as f64], i)).collect();
        let tree = KdTree::new(points).unwrap();
        assert_eq!(assert_split_invariant(&tree.root, 2, 0), 40);
    }

    #[test]
    fn test_random_tree_is_balanced_and_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 1000;
        let tree = KdTree::new(random_points(&mut rng, n, 3, 4)).unwrap();
        assert_eq!(assert_split_invariant(&tree.root, 3, 0), n);
        let max_depth = (n as f64).log2().floor() as usize + 1;
        assert!(tree.depth() <= max_depth, "depth {} exceeds {}", tree.depth(), max_depth);
    }

    #[test]
    fn test_query_scenario() {
        let tree = KdTree::from_features(
            &[vec![120.0, 8.5], vec![100.0, 6.5], vec![90.0, 5.5], vec![140.0, 9.5]],
            &[1_i64, 0, 0, 1],
        )
        .unwrap();

        let neighbors = tree.find_nearest_neighbors(&[115.0, 7.8], 3).unwrap();
        let mut rows: Vec<usize> = neighbors.iter().map(|n| n.index).collect();
        rows.sort_unstable();
        assert_eq!(rows, vec![0, 1, 3]);
        assert_eq!(sorted_labels(tree.query(&[115.0, 7.8], 3).unwrap()), vec![0, 1, 1]);
    }

    #[test]
    fn test_k_larger_than_training_set_returns_everything() {
        let tree = KdTree::from_features(
            &[vec![120.0, 8.5], vec![100.0, 6.5], vec![90.0, 5.5], vec![140.0, 9.5]],
            &[1_i64, 0, 0, 1],
        )
        .unwrap();
        assert_eq!(sorted_labels(tree.query(&[115.0, 7.8], 10).unwrap()), vec![0, 0, 1, 1]);
        assert_eq!(tree.query(&[115.0, 7.8], usize::MAX).unwrap().len(), 4);
    }

    #[test]
    fn test_query_rejects_bad_input() {
        let tree = KdTree::new(vec![make_dp(vec![1.0, 2.0], 0)]).unwrap();
        assert!(matches!(tree.query(&[1.0], 1), Err(KnnError::InvalidInput(_))));
        assert!(matches!(tree.query(&[1.0, 2.0, 3.0], 1), Err(KnnError::InvalidInput(_))));
        assert!(matches!(tree.query(&[1.0, 2.0], 0), Err(KnnError::InvalidInput(_))));
        assert!(matches!(tree.query(&[f64::NAN, 2.0], 1), Err(KnnError::InvalidInput(_))));
    }

    #[test]
    fn test_matches_brute_force_on_random_data() {
        let mut rng = StdRng::seed_from_u64(42);
        let points = random_points(&mut rng, 500, 4, 5);
        let tree = KdTree::new(points.clone()).unwrap();
        let brute = BruteForceIndex::new(points).unwrap();

        for _ in 0..200 {
            let query: Vec<f64> = (0..4).map(|_| rng.gen_range(-12.0..12.0)).collect();
            for k in [1, 3, 8, 25] {
                let mut from_tree = tree.query_neighbors(&query, k).unwrap();
                from_tree.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.index.cmp(&b.index)));
                let from_brute = brute.query_neighbors(&query, k).unwrap();
                assert_eq!(from_tree, from_brute, "k = {}", k);
            }
        }
    }

    #[test]
    fn test_matches_brute_force_with_many_ties() {
        // Integer grid with duplicates: lots of equal distances and equal split coordinates.
        let points: Vec<_> = (0..200)
            .map(|i| make_dp(vec![(i % 7) as f64, (i % 4) as f64], (i % 3) as i64))
            .collect();
        let tree = KdTree::new(points.clone()).unwrap();
        let brute = BruteForceIndex::new(points).unwrap();

        for x in 0..7 {
            for y in 0..4 {
                let query = [x as f64 + 0.5, y as f64];
                for k in [1, 4, 9, 30] {
                    let mut rows: Vec<usize> = tree.query_neighbors(&query, k).unwrap().iter().map(|n| n.index).collect();
                    rows.sort_unstable();
                    let mut expected: Vec<usize> = brute.query_neighbors(&query, k).unwrap().iter().map(|n| n.index).collect();
                    expected.sort_unstable();
                    assert_eq!(rows, expected);
                }
            }
        }
    }

    #[test]
    fn test_build_is_permutation_invariant() {
        let mut rng = StdRng::seed_from_u64(3);
        let points = random_points(&mut rng, 300, 2, 3);
        let mut shuffled = points.clone();
        shuffled.shuffle(&mut rng);

        let tree_a = KdTree::new(points).unwrap();
        let tree_b = KdTree::new(shuffled).unwrap();
        assert_eq!(assert_split_invariant(&tree_b.root, 2, 0), 300);

        for _ in 0..100 {
            let query = [rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0)];
            let a = sorted_labels(tree_a.query(&query, 7).unwrap());
            let b = sorted_labels(tree_b.query(&query, 7).unwrap());
            assert_eq!(a, b);
        }
    }
}
