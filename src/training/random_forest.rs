//! Random Forest classifier

use crate::error::{Result, ScopeError};
use super::decision_tree::{Criterion, DecisionTree};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features, in (0, 1]
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    /// Number of features to draw at each split, at least one
    pub fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).floor() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => Err(ScopeError::InvalidParameter {
                name: "max_features".to_string(),
                value: f.to_string(),
                reason: "fraction must be in (0, 1]".to_string(),
            }),
            MaxFeatures::Fixed(0) => Err(ScopeError::InvalidParameter {
                name: "max_features".to_string(),
                value: "0".to_string(),
                reason: "must draw at least one feature".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxFeatures::Sqrt => write!(f, "sqrt"),
            MaxFeatures::Log2 => write!(f, "log2"),
            MaxFeatures::Fraction(v) => write!(f, "{}", v),
            MaxFeatures::Fixed(n) => write!(f, "{}", n),
            MaxFeatures::All => write!(f, "all"),
        }
    }
}

/// Per-class sample weighting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeight {
    /// Every sample weighs 1
    #[default]
    None,
    /// Weight each class by `n_samples / (n_classes * class_count)`
    Balanced,
}

impl ClassWeight {
    /// Per-sample weights for the labels `y`
    pub fn sample_weights(&self, y: &Array1<f64>) -> Array1<f64> {
        match self {
            ClassWeight::None => Array1::ones(y.len()),
            ClassWeight::Balanced => {
                let classes = sorted_classes(y);
                let counts: Vec<usize> = classes
                    .iter()
                    .map(|c| y.iter().filter(|&v| v == c).count())
                    .collect();
                let n = y.len() as f64;
                let k = classes.len() as f64;
                y.mapv(|v| {
                    let idx = classes.iter().position(|&c| c == v).unwrap_or(0);
                    n / (k * counts[idx] as f64)
                })
            }
        }
    }
}

/// Random Forest classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at each split
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Class weighting
    pub class_weight: ClassWeight,
    /// Random state
    pub random_state: Option<u64>,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
    /// Sorted class labels
    classes: Vec<f64>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new_classifier(100)
    }
}

impl RandomForest {
    /// Create a new classifier forest
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            class_weight: ClassWeight::None,
            random_state: None,
            feature_importances: None,
            n_features: 0,
            classes: Vec::new(),
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

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set class weighting
    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    /// Enable or disable bootstrap sampling
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(ScopeError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ScopeError::ValidationError("Cannot fit a forest on 0 samples".to_string()));
        }
        if self.n_estimators == 0 {
            return Err(ScopeError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.max_features.validate()?;

        self.n_features = n_features;
        self.classes = sorted_classes(y);
        let max_features = self.max_features.resolve(n_features);
        let sample_weight = self.class_weight.sample_weights(y);

        // Build trees in parallel
        let base_seed = self.random_state.unwrap_or(42);

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                // Bootstrap sample
                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);
                let w_boot = sample_weight.select(Axis(0), &sample_indices);

                let mut tree = DecisionTree::new_classifier()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_criterion(self.criterion)
                    .with_max_features(max_features)
                    .with_random_state(rng.gen());
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }

                tree.fit_weighted(&x_boot, &y_boot, Some(&w_boot))?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut total_importances = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (i, &val) in imp.iter().enumerate().take(self.n_features) {
                    total_importances[i] += val;
                }
            }
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// Predict the most probable class per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        let predictions = proba
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                for (j, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = j;
                    }
                }
                self.classes[best]
            })
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    /// Class probabilities: the mean of the trees' leaf class distributions.
    /// Columns follow [`classes`](Self::classes).
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(ScopeError::ModelNotFitted);
        }

        let per_tree: Vec<Array2<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;

        let mut proba = Array2::zeros((x.nrows(), self.classes.len()));
        for (tree, tree_proba) in self.trees.iter().zip(&per_tree) {
            // A bootstrap sample can miss a class, so align columns by label
            for (j, class) in tree.classes().iter().enumerate() {
                if let Some(k) = self.classes.iter().position(|c| c == class) {
                    let mut target = proba.column_mut(k);
                    target += &tree_proba.column(j);
                }
            }
        }
        proba /= self.trees.len() as f64;

        Ok(proba)
    }

    /// Probability of the greatest class label, i.e. the positive class of a
    /// binary problem
    pub fn positive_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.classes.len() < 2 && !self.trees.is_empty() {
            return Err(ScopeError::ValidationError(
                "Positive-class probability needs at least two classes".to_string(),
            ));
        }
        let proba = self.predict_proba(x)?;
        Ok(proba.column(self.classes.len() - 1).to_owned())
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Sorted class labels seen at fit time
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Fitted trees
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Sorted distinct labels
pub(crate) fn sorted_classes(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.iter().copied().collect();
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    classes.dedup();
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier() {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.2],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut rf = RandomForest::new_classifier(10)
            .with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();

        let accuracy = predictions.iter().zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count() as f64 / y.len() as f64;

        assert!(accuracy >= 0.8, "Accuracy too low: {}", accuracy);
    }

    #[test]
    fn test_predict_proba() {
        let x = array![
            [0.0, 0.0],
            [1.0, 1.0],
        ];
        let y = array![0.0, 1.0];

        let mut rf = RandomForest::new_classifier(10)
            .with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();

        assert_eq!(proba.nrows(), 2);
        assert_eq!(proba.ncols(), 2);

        // Probabilities should sum to 1
        for i in 0..proba.nrows() {
            let row_sum: f64 = proba.row(i).sum();
            assert!((row_sum - 1.0).abs() < 1e-6, "Row {} sum: {}", i, row_sum);
        }

        let positive = rf.positive_proba(&x).unwrap();
        assert_eq!(positive, proba.column(1));
    }

    #[test]
    fn test_same_seed_same_model() {
        let x = Array2::from_shape_fn((60, 5), |(i, j)| ((i * 31 + j * 17) % 23) as f64);
        let y = Array1::from_shape_fn(60, |i| if (i * 31) % 23 > 14 { 1.0 } else { 0.0 });

        let fit = |seed| {
            let mut rf = RandomForest::new_classifier(8)
                .with_max_depth(3)
                .with_max_features(MaxFeatures::Fraction(0.55))
                .with_class_weight(ClassWeight::Balanced)
                .with_random_state(seed);
            rf.fit(&x, &y).unwrap();
            rf.positive_proba(&x).unwrap()
        };

        assert_eq!(fit(7), fit(7));
    }

    #[test]
    fn test_balanced_weights() {
        let y = array![0.0, 0.0, 0.0, 1.0];
        let w = ClassWeight::Balanced.sample_weights(&y);
        assert!((w[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((w[3] - 2.0).abs() < 1e-12);
        // Each class carries the same total weight
        assert!((w.slice(ndarray::s![..3]).sum() - w[3]).abs() < 1e-12);

        assert_eq!(ClassWeight::None.sample_weights(&y), Array1::<f64>::ones(4));
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Fraction(0.1).resolve(14), 1);
        assert_eq!(MaxFeatures::Fraction(0.325).resolve(14), 4);
        assert_eq!(MaxFeatures::Fraction(0.55).resolve(14), 7);
        assert_eq!(MaxFeatures::Fraction(0.775).resolve(14), 10);
        assert_eq!(MaxFeatures::Fraction(1.0).resolve(14), 14);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(3), 1);
        assert_eq!(MaxFeatures::Sqrt.resolve(16), 4);
        assert!(MaxFeatures::Fraction(0.0).validate().is_err());
        assert!(MaxFeatures::Fraction(1.5).validate().is_err());
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

        let mut rf = RandomForest::new_classifier(10)
            .with_max_features(MaxFeatures::All)
            .with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] >= importances[1]);
    }

    #[test]
    fn test_not_fitted() {
        let rf = RandomForest::new_classifier(3);
        assert!(matches!(rf.predict_proba(&array![[0.0]]), Err(ScopeError::ModelNotFitted)));
    }
}
