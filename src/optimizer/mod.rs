//! Hyperparameter search
//!
//! Cross-validated grid search over random forest hyperparameters, run in
//! parallel over (candidate, fold) pairs.

mod config;
pub mod grid_search;

pub use config::{linspace, ForestParams, GridSearchConfig};
pub use grid_search::{CandidateResult, GridSearchCV};
