//! Grid search configuration

use crate::training::{CVStrategy, ClassWeight};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hyperparameters of one forest candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Maximum tree depth
    pub max_depth: usize,
    /// Fraction of features drawn at each split
    pub max_features: f64,
}

impl fmt::Display for ForestParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "max_depth={}, max_features={}", self.max_depth, self.max_features)
    }
}

/// Configuration for the cross-validated grid search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSearchConfig {
    /// Fold strategy
    pub cv: CVStrategy,

    /// Trees per forest
    pub n_estimators: usize,

    /// Candidate maximum depths
    pub max_depth_grid: Vec<usize>,

    /// Candidate feature fractions
    pub max_features_grid: Vec<f64>,

    /// Class weighting of every forest
    pub class_weight: ClassWeight,

    /// Worker threads; the global pool when unset
    pub n_jobs: Option<usize>,

    /// Seed of every forest
    pub random_state: u64,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            cv: CVStrategy::default(),
            n_estimators: 30,
            max_depth_grid: (3..8).collect(),
            max_features_grid: linspace(0.1, 1.0, 5),
            class_weight: ClassWeight::Balanced,
            n_jobs: None,
            random_state: 0,
        }
    }
}

impl GridSearchConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the fold strategy
    pub fn with_cv(mut self, cv: CVStrategy) -> Self {
        self.cv = cv;
        self
    }

    /// Builder method to set the number of folds, keeping the strategy
    pub fn with_cv_folds(mut self, n: usize) -> Self {
        self.cv = self.cv.with_n_splits(n);
        self
    }

    /// Builder method to set the number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Builder method to set the depth grid
    pub fn with_max_depth_grid(mut self, grid: Vec<usize>) -> Self {
        self.max_depth_grid = grid;
        self
    }

    /// Builder method to set the feature fraction grid
    pub fn with_max_features_grid(mut self, grid: Vec<f64>) -> Self {
        self.max_features_grid = grid;
        self
    }

    /// Builder method to set class weighting
    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    /// Builder method to enable a dedicated thread pool
    pub fn with_n_jobs(mut self, n: usize) -> Self {
        self.n_jobs = Some(n);
        self
    }

    /// Builder method to set the forest seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Cartesian product of the grids, depth-major
    pub fn candidates(&self) -> Vec<ForestParams> {
        self.max_depth_grid
            .iter()
            .flat_map(|&max_depth| {
                self.max_features_grid.iter().map(move |&max_features| ForestParams {
                    max_depth,
                    max_features,
                })
            })
            .collect()
    }
}

/// `num` evenly spaced values from `start` to `stop` inclusive
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|i| if i == num - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}
