//! Bagged decision trees over random row and column subsets

use crate::error::{Result, ScopeError};
use super::decision_tree::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Rows drawn for each estimator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxSamples {
    /// Absolute number of rows
    Count(usize),
    /// Fraction of the rows, in (0, 1]
    Fraction(f64),
}

impl Default for MaxSamples {
    fn default() -> Self {
        MaxSamples::Fraction(1.0)
    }
}

impl MaxSamples {
    /// Resolve to a row count for `n_samples` rows. Counts above
    /// `n_samples` are clamped with a warning.
    pub fn resolve(&self, n_samples: usize) -> Result<usize> {
        match *self {
            MaxSamples::Fraction(f) => {
                if !(f > 0.0 && f <= 1.0) {
                    return Err(ScopeError::InvalidParameter {
                        name: "max_samples".to_string(),
                        value: f.to_string(),
                        reason: "fraction must be in (0, 1]".to_string(),
                    });
                }
                Ok(((f * n_samples as f64).floor() as usize).max(1))
            }
            MaxSamples::Count(0) => Err(ScopeError::InvalidParameter {
                name: "max_samples".to_string(),
                value: "0".to_string(),
                reason: "must draw at least one row".to_string(),
            }),
            MaxSamples::Count(n) if n > n_samples => {
                warn!(
                    max_samples = n,
                    n_samples,
                    "max_samples is larger than the number of samples; using all samples"
                );
                Ok(n_samples)
            }
            MaxSamples::Count(n) => Ok(n),
        }
    }
}

/// Bagging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaggingConfig {
    /// Number of estimators
    pub n_estimators: usize,
    /// Rows drawn per estimator
    pub max_samples: MaxSamples,
    /// Fraction of columns drawn per estimator, in (0, 1]
    pub max_features: f64,
    /// Draw rows with replacement
    pub bootstrap: bool,
    /// Draw columns with replacement
    pub bootstrap_features: bool,
    /// Base seed; estimator `i` uses `random_state + i`
    pub random_state: u64,
}

impl BaggingConfig {
    /// Columns drawn per estimator out of `n_features`
    pub fn n_features_per_estimator(&self, n_features: usize) -> usize {
        ((self.max_features * n_features as f64).floor() as usize).clamp(1, n_features.max(1))
    }
}

impl Default for BaggingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 10,
            max_samples: MaxSamples::default(),
            max_features: 1.0,
            bootstrap: true,
            bootstrap_features: false,
            random_state: 0,
        }
    }
}

/// A fitted tree and the rows and columns it was trained on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaggedEstimator {
    pub tree: DecisionTree,
    /// Drawn row indices (may repeat when bootstrapping)
    pub samples: Vec<usize>,
    /// Drawn column indices, local tree feature `j` is global `features[j]`
    pub features: Vec<usize>,
}

impl BaggedEstimator {
    /// Rows never drawn for this estimator
    pub fn out_of_bag(&self, n_samples: usize) -> Vec<usize> {
        let mut in_bag = vec![false; n_samples];
        for &i in &self.samples {
            in_bag[i] = true;
        }
        (0..n_samples).filter(|&i| !in_bag[i]).collect()
    }
}

/// Ensemble of trees fitted on random subsets
#[derive(Debug, Clone)]
pub struct BaggingEnsemble {
    base: DecisionTree,
    config: BaggingConfig,
    estimators: Vec<BaggedEstimator>,
}

impl BaggingEnsemble {
    /// `base` is cloned, reseeded and fitted once per estimator
    pub fn new(base: DecisionTree, config: BaggingConfig) -> Self {
        Self {
            base,
            config,
            estimators: Vec::new(),
        }
    }

    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if y.len() != n_samples {
            return Err(ScopeError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(ScopeError::ValidationError(format!(
                "Cannot bag over a {}x{} matrix",
                n_samples, n_features
            )));
        }
        if self.config.n_estimators == 0 {
            return Err(ScopeError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let f = self.config.max_features;
        if !(f > 0.0 && f <= 1.0) {
            return Err(ScopeError::InvalidParameter {
                name: "max_samples_features".to_string(),
                value: f.to_string(),
                reason: "fraction must be in (0, 1]".to_string(),
            });
        }

        let n_draw = self.config.max_samples.resolve(n_samples)?;
        let n_cols = self.config.n_features_per_estimator(n_features);
        let config = &self.config;
        let base = &self.base;

        let estimators = (0..config.n_estimators)
            .into_par_iter()
            .map(|idx| -> Result<BaggedEstimator> {
                let mut rng = ChaCha8Rng::seed_from_u64(config.random_state.wrapping_add(idx as u64));

                let features = draw(&mut rng, n_features, n_cols, config.bootstrap_features);
                let samples = draw(&mut rng, n_samples, n_draw, config.bootstrap);

                let x_sub = x.select(Axis(0), &samples).select(Axis(1), &features);
                let y_sub = y.select(Axis(0), &samples);
                let w_sub = sample_weight.map(|w| w.select(Axis(0), &samples));

                let mut tree = base.clone().with_random_state(rng.gen());
                tree.fit_weighted(&x_sub, &y_sub, w_sub.as_ref())?;

                Ok(BaggedEstimator {
                    tree,
                    samples,
                    features,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.estimators = estimators;
        Ok(self)
    }

    pub fn estimators(&self) -> &[BaggedEstimator] {
        &self.estimators
    }

    pub fn config(&self) -> &BaggingConfig {
        &self.config
    }
}

/// `k` indices from `0..n`, with or without replacement
fn draw(rng: &mut ChaCha8Rng, n: usize, k: usize, replace: bool) -> Vec<usize> {
    if replace {
        (0..k).map(|_| rng.gen_range(0..n)).collect()
    } else {
        let mut chosen = index::sample(rng, n, k.min(n)).into_vec();
        chosen.sort_unstable();
        chosen
    }
}
