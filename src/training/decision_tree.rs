//! Decision tree implementation

use crate::error::{Result, ScopeError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        /// Weighted class fractions (empty for regression)
        distribution: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node with split: `x[feature_idx] <= threshold` goes left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    pub fn n_samples(&self) -> usize {
        match self {
            TreeNode::Leaf { n_samples, .. } | TreeNode::Split { n_samples, .. } => *n_samples,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at each split (all when None)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for per-split feature sampling
    pub random_state: Option<u64>,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Is classification task
    is_classification: bool,
    /// Classes (for classification)
    classes: Vec<f64>,
}

/// Training data shared by the recursive build
struct FitContext<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    y_class: Vec<usize>,
    weights: Vec<f64>,
    n_classes: usize,
}

/// Weighted sufficient statistics of a node
struct NodeStats {
    weight: f64,
    class_weights: Vec<f64>,
    sum: f64,
    sq_sum: f64,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            feature_importances: None,
            is_classification: true,
            classes: Vec::new(),
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set number of features drawn at each split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        self.fit_weighted(x, y, None)
    }

    /// Fit the tree with per-sample weights
    pub fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(ScopeError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ScopeError::ValidationError("Cannot fit a tree on 0 samples".to_string()));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(ScopeError::ValidationError(
                "Input contains NaN or infinite values".to_string(),
            ));
        }

        let weights: Vec<f64> = match sample_weight {
            Some(w) => {
                if w.len() != n_samples {
                    return Err(ScopeError::ShapeError {
                        expected: format!("sample_weight length = {}", n_samples),
                        actual: format!("sample_weight length = {}", w.len()),
                    });
                }
                if w.iter().any(|&v| v < 0.0 || !v.is_finite()) {
                    return Err(ScopeError::ValidationError(
                        "Sample weights must be finite and non-negative".to_string(),
                    ));
                }
                w.to_vec()
            }
            None => vec![1.0; n_samples],
        };
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(ScopeError::ValidationError("Total sample weight is zero".to_string()));
        }

        self.n_features = n_features;

        let y_class = if self.is_classification {
            let mut classes: Vec<f64> = y.iter().copied().collect();
            classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            classes.dedup();
            let y_class = y
                .iter()
                .map(|v| classes.iter().position(|c| c == v).unwrap_or(0))
                .collect();
            self.classes = classes;
            y_class
        } else {
            Vec::new()
        };

        let ctx = FitContext {
            x,
            y,
            y_class,
            weights,
            n_classes: self.classes.len(),
        };

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));
        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(&ctx, indices, 0, &mut importances, &mut rng));

        // Normalize feature importances
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        ctx: &FitContext<'_>,
        indices: Vec<usize>,
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = self.node_stats(ctx, &indices);
        let impurity = self.stats_impurity(&stats);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf.max(1)
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        if should_stop {
            return self.make_leaf(&stats, n_samples);
        }

        let features = self.sample_features(ctx.x.ncols(), rng);
        let Some((best_feature, best_threshold, best_gain)) =
            self.find_best_split(ctx, &indices, &features, impurity, &stats)
        else {
            return self.make_leaf(&stats, n_samples);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| ctx.x[[i, best_feature]] <= best_threshold);

        importances[best_feature] += stats.weight * best_gain;

        let left = Box::new(self.build_tree(ctx, left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(ctx, right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best_feature,
            threshold: best_threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn sample_features(&self, n_features: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k > 0 && k < n_features => {
                let mut chosen = index::sample(rng, n_features, k).into_vec();
                chosen.sort_unstable();
                chosen
            }
            _ => (0..n_features).collect(),
        }
    }

    /// Best (feature, threshold, gain) over the candidate features, using a
    /// sorted sweep per feature.
    fn find_best_split(
        &self,
        ctx: &FitContext<'_>,
        indices: &[usize],
        features: &[usize],
        parent_impurity: f64,
        parent: &NodeStats,
    ) -> Option<(usize, f64, f64)> {
        let feature_results: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut order: Vec<(f64, usize)> =
                    indices.iter().map(|&i| (ctx.x[[i, feature_idx]], i)).collect();
                order.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

                let n = order.len();
                let mut left = NodeStats::empty(ctx.n_classes);
                let mut best: Option<(f64, f64)> = None;

                for pos in 0..n - 1 {
                    let (value, i) = order[pos];
                    left.add(ctx, i);

                    let next = order[pos + 1].0;
                    if next <= value {
                        continue;
                    }
                    let n_left = pos + 1;
                    if n_left < self.min_samples_leaf || n - n_left < self.min_samples_leaf {
                        continue;
                    }

                    let right_weight = parent.weight - left.weight;
                    if left.weight <= 0.0 || right_weight <= 0.0 {
                        continue;
                    }
                    let left_impurity = self.stats_impurity(&left);
                    let right_impurity = self.complement_impurity(parent, &left);
                    let weighted = (left.weight * left_impurity + right_weight * right_impurity)
                        / parent.weight;

                    let gain = parent_impurity - weighted;
                    if gain > best.map_or(0.0, |b| b.1) {
                        let mut threshold = (value + next) / 2.0;
                        if threshold >= next || !threshold.is_finite() {
                            threshold = value;
                        }
                        best = Some((threshold, gain));
                    }
                }

                best.map(|(threshold, gain)| (feature_idx, threshold, gain))
            })
            .collect();

        feature_results
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<(usize, f64, f64)>, cand| match acc {
                Some(a) if a.2 >= cand.2 => Some(a),
                _ => Some(cand),
            })
    }

    fn node_stats(&self, ctx: &FitContext<'_>, indices: &[usize]) -> NodeStats {
        let mut stats = NodeStats::empty(ctx.n_classes);
        for &i in indices {
            stats.add(ctx, i);
        }
        stats
    }

    fn stats_impurity(&self, stats: &NodeStats) -> f64 {
        match self.criterion {
            Criterion::Gini | Criterion::Entropy => {
                self.class_impurity(stats.class_weights.iter().copied(), stats.weight)
            }
            Criterion::MSE => variance(stats.weight, stats.sum, stats.sq_sum),
        }
    }

    /// Impurity of `parent - left`, without materializing the right node
    fn complement_impurity(&self, parent: &NodeStats, left: &NodeStats) -> f64 {
        let weight = parent.weight - left.weight;
        match self.criterion {
            Criterion::Gini | Criterion::Entropy => self.class_impurity(
                parent
                    .class_weights
                    .iter()
                    .zip(&left.class_weights)
                    .map(|(p, l)| p - l),
                weight,
            ),
            Criterion::MSE => variance(weight, parent.sum - left.sum, parent.sq_sum - left.sq_sum),
        }
    }

    fn class_impurity(&self, class_weights: impl Iterator<Item = f64>, total: f64) -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        match self.criterion {
            Criterion::Entropy => -class_weights
                .map(|w| {
                    let p = w / total;
                    if p > 0.0 { p * p.ln() } else { 0.0 }
                })
                .sum::<f64>(),
            _ => 1.0 - class_weights.map(|w| (w / total).powi(2)).sum::<f64>(),
        }
    }

    fn make_leaf(&self, stats: &NodeStats, n_samples: usize) -> TreeNode {
        if self.is_classification {
            let distribution: Vec<f64> = if stats.weight > 0.0 {
                stats.class_weights.iter().map(|w| w / stats.weight).collect()
            } else {
                vec![0.0; stats.class_weights.len()]
            };
            let value = argmax(&distribution)
                .and_then(|k| self.classes.get(k).copied())
                .unwrap_or(0.0);
            TreeNode::Leaf {
                value,
                distribution,
                n_samples,
            }
        } else {
            let value = if stats.weight > 0.0 { stats.sum / stats.weight } else { 0.0 };
            TreeNode::Leaf {
                value,
                distribution: Vec::new(),
                n_samples,
            }
        }
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(ScopeError::ModelNotFitted)?;
        self.check_width(x)?;

        let predictions: Vec<f64> = x
            .rows()
            .into_iter()
            .map(|row| match self.leaf_for(root, row) {
                TreeNode::Leaf { value, .. } => *value,
                TreeNode::Split { .. } => 0.0,
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Predict class probabilities, one column per entry of [`classes`](Self::classes)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let root = self.root.as_ref().ok_or(ScopeError::ModelNotFitted)?;
        if !self.is_classification {
            return Err(ScopeError::ValidationError(
                "predict_proba is only available for classification".to_string(),
            ));
        }
        self.check_width(x)?;

        let mut proba = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            if let TreeNode::Leaf { distribution, .. } = self.leaf_for(root, row) {
                for (j, &p) in distribution.iter().enumerate() {
                    proba[[i, j]] = p;
                }
            }
        }
        Ok(proba)
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features {
            return Err(ScopeError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    fn leaf_for<'a>(&self, node: &'a TreeNode, sample: ArrayView1<'_, f64>) -> &'a TreeNode {
        let mut node = node;
        loop {
            match node {
                TreeNode::Leaf { .. } => return node,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Root node of the fitted tree
    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    /// Sorted class labels seen at fit time
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn is_classifier(&self) -> bool {
        self.is_classification
    }

    /// Number of features seen at fit time
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth (a single leaf has depth 0)
    pub fn get_depth(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => node_depth(node),
        }
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => count_leaves(node),
        }
    }
}

impl NodeStats {
    fn empty(n_classes: usize) -> Self {
        Self {
            weight: 0.0,
            class_weights: vec![0.0; n_classes],
            sum: 0.0,
            sq_sum: 0.0,
        }
    }

    fn add(&mut self, ctx: &FitContext<'_>, i: usize) {
        let w = ctx.weights[i];
        let yi = ctx.y[i];
        self.weight += w;
        self.sum += w * yi;
        self.sq_sum += w * yi * yi;
        if let Some(c) = ctx.y_class.get(i) {
            self.class_weights[*c] += w;
        }
    }
}

fn variance(weight: f64, sum: f64, sq_sum: f64) -> f64 {
    if weight <= 0.0 {
        return 0.0;
    }
    (sq_sum / weight - (sum / weight).powi(2)).max(0.0)
}

fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

fn node_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 0,
        TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
    }
}

fn count_leaves(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [1.0, 1.0],
        ];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);

        match tree.root().unwrap() {
            TreeNode::Split { feature_idx, threshold, .. } => {
                assert_eq!(*feature_idx, 0);
                assert!((threshold - 0.5).abs() < 1e-12);
            }
            TreeNode::Leaf { .. } => panic!("expected a split at the root"),
        }
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions.iter().zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>() / y.len() as f64;

        assert!(mse < 1e-12, "MSE too high: {}", mse);
        assert!(tree.predict_proba(&x).is_err());
    }

    #[test]
    fn test_max_depth() {
        let x = array![
            [1.0, 1.0],
            [2.0, 2.0],
            [3.0, 3.0],
            [4.0, 4.0],
        ];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 1);
        assert!(tree.get_n_leaves() <= 2);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![
            [1.0, 0.0],
            [2.0, 0.0],
            [3.0, 0.0],
            [4.0, 0.0],
        ];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_leaf_distribution_uses_weights() {
        let x = array![[0.0], [0.0], [0.0], [0.0]];
        let y = array![0.0, 0.0, 0.0, 1.0];
        let w = array![1.0, 1.0, 1.0, 3.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit_weighted(&x, &y, Some(&w)).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert!((proba[[0, 0]] - 0.5).abs() < 1e-12);
        assert!((proba[[0, 1]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 2);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_feature_sampling_is_seeded() {
        let x = Array2::from_shape_fn((40, 6), |(i, j)| ((i * 7 + j * 13) % 11) as f64);
        let y = Array1::from_shape_fn(40, |i| if (i * 7) % 11 > 5 { 1.0 } else { 0.0 });

        let mut a = DecisionTree::new_classifier().with_max_features(2).with_random_state(9);
        let mut b = DecisionTree::new_classifier().with_max_features(2).with_random_state(9);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
        assert_eq!(a.feature_importances(), b.feature_importances());
    }

    #[test]
    fn test_rejects_nan_and_width_mismatch() {
        let x = array![[0.0], [f64::NAN]];
        let y = array![0.0, 1.0];
        assert!(DecisionTree::new_classifier().fit(&x, &y).is_err());

        let x = array![[0.0], [1.0]];
        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();
        assert!(matches!(
            tree.predict(&array![[0.0, 1.0]]),
            Err(ScopeError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_not_fitted() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.predict(&array![[0.0]]), Err(ScopeError::ModelNotFitted)));
    }
}
