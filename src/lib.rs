//! credit-scope - Credit card default analysis
//!
//! This crate reproduces a credit default study end to end:
//! - Loading the client table from a workbook sheet or CSV file
//! - Seeded shuffling and historical aggregate features
//! - Random forest selection by cross-validated grid search on ROC AUC
//! - Interpretable rule induction from bagged trees
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - Spreadsheet/CSV loading and the in-memory observation table
//! - [`feature_engineering`] - Row-wise aggregates over column groups
//!
//! ## Models
//! - [`training`] - Decision trees, random forests, bagging, cross-validation
//! - [`optimizer`] - Grid search over forest hyperparameters
//! - [`rules`] - Rule extraction and rule-based scoring
//! - [`metrics`] - ROC / precision-recall curves and classification metrics
//!
//! ## Services
//! - [`pipeline`] - The analysis stages wired together
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod data;
pub mod feature_engineering;

// Models
pub mod training;
pub mod optimizer;
pub mod rules;
pub mod metrics;

// Services
pub mod pipeline;
pub mod cli;

pub use error::{Result, ScopeError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, ScopeError};

    // Data
    pub use crate::data::{DataConfig, DataLoader, Dataset};

    // Feature engineering
    pub use crate::feature_engineering::{FeatureEngineeringConfig, FeatureTransformer, RowAggregates};

    // Training
    pub use crate::training::{
        ClassWeight, CrossValidator, CVStrategy, DecisionTree, MaxFeatures, RandomForest,
    };

    // Optimization
    pub use crate::optimizer::{ForestParams, GridSearchCV, GridSearchConfig};

    // Rules
    pub use crate::rules::{Rule, ScoredRule, SkopeRules, SkopeRulesConfig};

    // Metrics
    pub use crate::metrics::{roc_auc_score, ClassificationMetrics};

    // Pipeline
    pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineReport};
}
