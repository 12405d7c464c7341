//! Rule estimator configuration

use crate::training::{MaxFeatures, MaxSamples};
use serde::{Deserialize, Serialize};

/// Configuration of [`SkopeRules`](super::SkopeRules)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkopeRulesConfig {
    /// Column names used in rules; `c0, c1, ...` when unset
    pub feature_names: Option<Vec<String>>,

    /// Minimum out-of-bag precision of a kept rule
    pub precision_min: f64,

    /// Minimum out-of-bag recall of a kept rule
    pub recall_min: f64,

    /// Trees per bagged ensemble, and the number of rules used for scoring
    pub n_estimators: usize,

    /// Jaccard similarity above which the earlier of two rules is dropped
    pub similarity_thres: f64,

    /// Rows drawn per tree
    pub max_samples: MaxSamples,

    /// Fraction of columns drawn per tree
    pub max_samples_features: f64,

    /// Draw rows with replacement
    pub bootstrap: bool,

    /// Draw columns with replacement
    pub bootstrap_features: bool,

    /// Maximum tree depth, i.e. the longest rule
    pub max_depth: Option<usize>,

    /// Features drawn at each split
    pub max_features: MaxFeatures,

    /// Minimum samples to split a node
    pub min_samples_split: usize,

    /// Worker threads; the global pool when unset
    pub n_jobs: Option<usize>,

    /// Base seed of the bagged ensembles
    pub random_state: Option<u64>,
}

impl Default for SkopeRulesConfig {
    fn default() -> Self {
        Self {
            feature_names: None,
            precision_min: 0.5,
            recall_min: 0.01,
            n_estimators: 10,
            similarity_thres: 0.99,
            max_samples: MaxSamples::Fraction(0.8),
            max_samples_features: 1.0,
            bootstrap: false,
            bootstrap_features: false,
            max_depth: Some(3),
            max_features: MaxFeatures::Fraction(1.0),
            min_samples_split: 2,
            n_jobs: None,
            random_state: None,
        }
    }
}

impl SkopeRulesConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for the credit default analysis: more trees, half of the
    /// columns per tree and per split, stricter precision
    pub fn credit_default() -> Self {
        Self {
            precision_min: 0.6,
            recall_min: 0.02,
            n_estimators: 30,
            similarity_thres: 0.9,
            max_samples_features: 0.5,
            max_depth: Some(3),
            max_features: MaxFeatures::Fraction(0.5),
            ..Self::default()
        }
    }

    /// Builder method to set the column names
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    /// Builder method to set the minimum precision
    pub fn with_precision_min(mut self, precision_min: f64) -> Self {
        self.precision_min = precision_min;
        self
    }

    /// Builder method to set the minimum recall
    pub fn with_recall_min(mut self, recall_min: f64) -> Self {
        self.recall_min = recall_min;
        self
    }

    /// Builder method to set the number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Builder method to set the similarity threshold
    pub fn with_similarity_thres(mut self, thres: f64) -> Self {
        self.similarity_thres = thres;
        self
    }

    /// Builder method to set the rows drawn per tree
    pub fn with_max_samples(mut self, max_samples: MaxSamples) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Builder method to set the fraction of columns drawn per tree
    pub fn with_max_samples_features(mut self, fraction: f64) -> Self {
        self.max_samples_features = fraction;
        self
    }

    /// Builder method to draw rows with replacement
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Builder method to set the maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Builder method to set the features drawn at each split
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Builder method to enable a dedicated thread pool
    pub fn with_n_jobs(mut self, n: usize) -> Self {
        self.n_jobs = Some(n);
        self
    }

    /// Builder method to set the seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }
}
