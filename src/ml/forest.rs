//! Bagged ensemble of CART decision trees.
//!
//! Each tree is grown on a bootstrap sample of the training rows using Gini
//! impurity. At every node a random subset of features is searched for the
//! best threshold; features that are constant within the node do not count
//! toward that subset. Leaves store class fractions and the forest
//! probability is the mean over trees.

use crate::error::{AppError, Result};
use crate::ml::classifier::{check_width, Classifier, ModelSummary};
use crate::ml::models::ForestParams;
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        proba: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single fitted classification tree, stored as a flat node arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
    n_classes: usize,
}

impl DecisionTree {
    /// Class fractions at the leaf reached by `row`
    pub fn leaf_proba(&self, row: ArrayView1<'_, f64>) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { proba } => return proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// n_left * gini_left + n_right * gini_right
    weighted_impurity: f64,
}

struct TreeBuilder<'a> {
    x: ArrayView2<'a, f64>,
    y: &'a [u8],
    n_classes: usize,
    params: &'a ForestParams,
    max_features: usize,
    nodes: Vec<Node>,
    importances: Vec<f64>,
    rng: ChaCha8Rng,
}

impl<'a> TreeBuilder<'a> {
    fn new(
        x: ArrayView2<'a, f64>,
        y: &'a [u8],
        n_classes: usize,
        params: &'a ForestParams,
        seed: u64,
    ) -> Self {
        let n_features = x.ncols();
        Self {
            x,
            y,
            n_classes,
            params,
            max_features: params.max_features.resolve(n_features),
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Draw a bootstrap sample and grow the tree on it
    fn fit(mut self) -> (DecisionTree, Vec<f64>) {
        let n = self.y.len();
        let mut samples: Vec<usize> = (0..n).map(|_| self.rng.gen_range(0..n)).collect();
        self.grow(&mut samples, 0);

        let total: f64 = self.importances.iter().sum();
        if total > 0.0 {
            self.importances.iter_mut().for_each(|v| *v /= total);
        }

        let tree = DecisionTree {
            nodes: self.nodes,
            n_features: self.x.ncols(),
            n_classes: self.n_classes,
        };
        (tree, self.importances)
    }

    fn counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &i in samples {
            counts[self.y[i] as usize] += 1;
        }
        counts
    }

    fn grow(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let n = samples.len();
        let counts = self.counts(samples);
        let impurity = gini(&counts, n);

        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            proba: counts.iter().map(|&c| c as f64 / n as f64).collect(),
        });

        let depth_exhausted = self.params.max_depth.is_some_and(|max| depth >= max);
        if depth_exhausted
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || impurity <= f64::EPSILON
        {
            return node_id;
        }

        let Some(split) = self.best_split(samples, &counts) else {
            return node_id;
        };

        self.importances[split.feature] += n as f64 * impurity - split.weighted_impurity;

        let mut mid = 0;
        for k in 0..n {
            if self.x[[samples[k], split.feature]] <= split.threshold {
                samples.swap(k, mid);
                mid += 1;
            }
        }

        let (left_samples, right_samples) = samples.split_at_mut(mid);
        let left = self.grow(left_samples, depth + 1);
        let right = self.grow(right_samples, depth + 1);

        self.nodes[node_id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }

    fn best_split(&mut self, samples: &[usize], parent_counts: &[usize]) -> Option<SplitCandidate> {
        let n = samples.len();
        let min_leaf = self.params.min_samples_leaf;

        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(&mut self.rng);

        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0;
        let mut column: Vec<(f64, u8)> = Vec::with_capacity(n);

        for feature in features {
            if visited >= self.max_features {
                break;
            }

            column.clear();
            column.extend(samples.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            if column[0].0 >= column[n - 1].0 {
                // constant within this node
                continue;
            }
            visited += 1;

            let mut left = vec![0usize; self.n_classes];
            let mut right = parent_counts.to_vec();

            for k in 0..n - 1 {
                let (value, label) = column[k];
                left[label as usize] += 1;
                right[label as usize] -= 1;

                let next = column[k + 1].0;
                if next <= value {
                    continue;
                }

                let n_left = k + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let weighted = n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right);
                if best
                    .as_ref()
                    .map_or(true, |b| weighted < b.weighted_impurity)
                {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: midpoint(value, next),
                        weighted_impurity: weighted,
                    });
                }
            }
        }

        best
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

/// Threshold between two adjacent distinct values such that `lo` goes left
/// and `hi` goes right
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid >= hi {
        lo
    } else {
        mid
    }
}

/// Random forest classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
    n_classes: usize,
    feature_names: Vec<String>,
    feature_importances: Vec<f64>,
    params: ForestParams,
}

impl RandomForest {
    /// Fit a forest on `x` (n_samples × n_features) with labels in `0..n_classes`.
    ///
    /// Per-tree seeds are drawn from `params.seed` up front, so the fitted
    /// forest does not depend on how rayon schedules the trees.
    pub fn fit(x: &Array2<f64>, y: &[u8], n_classes: usize, params: &ForestParams) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(AppError::Training(format!(
                "feature rows ({}) and labels ({}) differ in length",
                x.nrows(),
                y.len()
            )));
        }
        if y.is_empty() {
            return Err(AppError::Training("no training rows".to_string()));
        }
        if x.ncols() == 0 {
            return Err(AppError::Training("no feature columns".to_string()));
        }
        if params.n_trees == 0 {
            return Err(AppError::Training("n_trees must be at least 1".to_string()));
        }
        if let Some(&bad) = y.iter().find(|&&label| label as usize >= n_classes) {
            return Err(AppError::Training(format!(
                "label {} outside 0..{}",
                bad, n_classes
            )));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(AppError::Training(
                "feature matrix contains non-finite values".to_string(),
            ));
        }

        let mut master = ChaCha8Rng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_trees).map(|_| master.gen()).collect();

        let view = x.view();
        let fitted: Vec<(DecisionTree, Vec<f64>)> = seeds
            .par_iter()
            .map(|&seed| TreeBuilder::new(view, y, n_classes, params, seed).fit())
            .collect();

        let mut feature_importances = vec![0.0; x.ncols()];
        let mut trees = Vec::with_capacity(fitted.len());
        for (tree, importances) in fitted {
            for (acc, v) in feature_importances.iter_mut().zip(importances) {
                *acc += v;
            }
            trees.push(tree);
        }
        let total: f64 = feature_importances.iter().sum();
        if total > 0.0 {
            feature_importances.iter_mut().for_each(|v| *v /= total);
        }

        debug!(
            n_trees = trees.len(),
            total_nodes = trees.iter().map(DecisionTree::n_nodes).sum::<usize>(),
            "Random forest fitted"
        );

        Ok(Self {
            trees,
            n_features: x.ncols(),
            n_classes,
            feature_names: (0..x.ncols()).map(|i| format!("feature_{}", i)).collect(),
            feature_importances,
            params: params.clone(),
        })
    }

    pub fn with_feature_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.len() == self.n_features {
            self.feature_names = names;
        }
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    fn row_proba(&self, row: ArrayView1<'_, f64>) -> Vec<f64> {
        let mut acc = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (a, p) in acc.iter_mut().zip(tree.leaf_proba(row)) {
                *a += p;
            }
        }
        let n_trees = self.trees.len() as f64;
        acc.iter_mut().for_each(|a| *a /= n_trees);
        acc
    }
}

impl Classifier for RandomForest {
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        check_width(features, self.n_features)?;

        let mut proba = Array2::zeros((features.nrows(), self.n_classes));
        for (i, row) in features.rows().into_iter().enumerate() {
            for (j, p) in self.row_proba(row).into_iter().enumerate() {
                proba[[i, j]] = p;
            }
        }
        Ok(proba)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn summary(&self) -> ModelSummary {
        ModelSummary {
            model_type: "random_forest".to_string(),
            n_trees: Some(self.trees.len()),
            n_features: self.n_features,
            feature_names: self.feature_names.clone(),
            feature_importances: self.feature_importances.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::models::MaxFeatures;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Vec<u8>) {
        let x = array![
            [9.0, 100.0, 95.0],
            [12.0, 100.0, 95.0],
            [15.0, 100.0, 95.0],
            [20.0, 100.0, 95.0],
            [25.0, 100.0, 95.0],
            [30.0, 100.0, 95.0],
        ];
        (x, vec![1, 1, 1, 0, 0, 0])
    }

    fn small_params(n_trees: usize) -> ForestParams {
        ForestParams {
            n_trees,
            ..Default::default()
        }
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(&[5, 0], 5), 0.0);
        assert!((gini(&[2, 2], 4) - 0.5).abs() < 1e-12);
        assert_eq!(gini(&[], 0), 0.0);
    }

    #[test]
    fn test_midpoint() {
        assert_eq!(midpoint(15.0, 20.0), 17.5);
        let lo = 1.0_f64;
        let hi = f64::from_bits(lo.to_bits() + 1);
        assert_eq!(midpoint(lo, hi), lo);
    }

    #[test]
    fn test_fit_produces_requested_trees() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, 2, &small_params(10)).unwrap();
        assert_eq!(forest.n_trees(), 10);
        assert_eq!(forest.n_features(), 3);
    }

    #[test]
    fn test_constant_features_are_skipped() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, 2, &small_params(20)).unwrap();
        // ages are constant, so all impurity decrease comes from length
        assert!((forest.feature_importances()[0] - 1.0).abs() < 1e-9);
        assert_eq!(forest.feature_importances()[1], 0.0);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, 2, &small_params(25)).unwrap();
        let proba = forest
            .predict_proba(&array![[12.0, 100.0, 95.0], [40.0, 90.0, 80.0]])
            .unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_separable_prediction() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, 2, &small_params(100)).unwrap();
        let labels = forest
            .predict(&array![[10.0, 100.0, 95.0], [28.0, 100.0, 95.0]])
            .unwrap();
        assert_eq!(labels, vec![1, 0]);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = separable();
        let a = RandomForest::fit(&x, &y, 2, &small_params(30)).unwrap();
        let b = RandomForest::fit(&x, &y, 2, &small_params(30)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_max_depth_limits_tree() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = vec![0, 1, 0, 1, 0, 1];
        let params = ForestParams {
            n_trees: 5,
            max_depth: Some(1),
            max_features: MaxFeatures::All,
            ..Default::default()
        };
        let forest = RandomForest::fit(&x, &y, 2, &params).unwrap();
        assert!(forest.trees().iter().all(|t| t.depth() <= 1));
    }

    #[test]
    fn test_pure_bootstrap_gives_single_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = vec![0, 0, 0];
        let forest = RandomForest::fit(&x, &y, 2, &small_params(3)).unwrap();
        assert!(forest.trees().iter().all(|t| t.n_leaves() == 1));
        let proba = forest.predict_proba(&array![[2.0]]).unwrap();
        assert_eq!(proba[[0, 0]], 1.0);
        assert_eq!(proba[[0, 1]], 0.0);
    }

    #[test]
    fn test_fit_rejects_mismatched_lengths() {
        let (x, _) = separable();
        let err = RandomForest::fit(&x, &[1, 0], 2, &small_params(3)).unwrap_err();
        assert!(matches!(err, AppError::Training(_)));
    }

    #[test]
    fn test_fit_rejects_out_of_range_label() {
        let x = array![[1.0], [2.0]];
        let err = RandomForest::fit(&x, &[0, 2], 2, &small_params(3)).unwrap_err();
        assert!(matches!(err, AppError::Training(_)));
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, 2, &small_params(3)).unwrap();
        assert!(matches!(
            forest.predict_proba(&array![[1.0, 2.0]]),
            Err(AppError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_feature_names() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, 2, &small_params(2))
            .unwrap()
            .with_feature_names(["length_m", "max_ma", "min_ma"]);
        assert_eq!(forest.feature_names()[2], "min_ma");
        assert_eq!(forest.summary().n_trees, Some(2));
    }
}
