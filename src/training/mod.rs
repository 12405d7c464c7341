//! Model training module
//!
//! Provides the tree models used for classification and rule induction:
//! - Decision trees (classification and regression, sample weights)
//! - Random Forests with class weighting
//! - Bagged trees over row and column subsets
//! - Cross-validation splitters

pub mod bagging;
pub mod cross_validation;
pub mod decision_tree;
pub mod random_forest;

pub use bagging::{BaggedEstimator, BaggingConfig, BaggingEnsemble, MaxSamples};
pub use cross_validation::{CrossValidator, CVStrategy, CVSplit, CVResults};
pub use decision_tree::{DecisionTree, TreeNode, Criterion};
pub use random_forest::{RandomForest, MaxFeatures, ClassWeight};
