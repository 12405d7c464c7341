//! Pipeline configuration

use crate::data::DataConfig;
use crate::error::{Result, ScopeError};
use crate::feature_engineering::FeatureEngineeringConfig;
use crate::optimizer::GridSearchConfig;
use crate::rules::SkopeRulesConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Every stage of the analysis in one place
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Source table and column handling
    pub data: DataConfig,

    /// Derived historical aggregates
    pub features: FeatureEngineeringConfig,

    /// Forest hyperparameter search
    pub search: GridSearchConfig,

    /// Rule extraction; skipped when unset
    pub rules: Option<SkopeRulesConfig>,

    /// Seed of the row shuffle, and of rule extraction when it has none
    pub random_state: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            features: FeatureEngineeringConfig::default(),
            search: GridSearchConfig::default(),
            rules: Some(SkopeRulesConfig::credit_default()),
            random_state: 1,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| {
            ScopeError::ConfigError(format!("{}: {}", path.display(), e))
        })
    }

    /// Builder method to set the data configuration
    pub fn with_data(mut self, data: DataConfig) -> Self {
        self.data = data;
        self
    }

    /// Builder method to set the feature engineering configuration
    pub fn with_features(mut self, features: FeatureEngineeringConfig) -> Self {
        self.features = features;
        self
    }

    /// Builder method to set the grid search configuration
    pub fn with_search(mut self, search: GridSearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Builder method to set (or disable, with `None`) rule extraction
    pub fn with_rules(mut self, rules: Option<SkopeRulesConfig>) -> Self {
        self.rules = rules;
        self
    }

    /// Builder method to set the seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Reject settings that would only fail deep inside a stage
    pub fn validate(&self) -> Result<()> {
        if self.data.path.is_none() {
            return Err(ScopeError::ConfigError("No input file configured".to_string()));
        }
        if self.data.target_column.is_empty() {
            return Err(ScopeError::ConfigError("Target column name is empty".to_string()));
        }
        if self.search.max_depth_grid.is_empty() || self.search.max_features_grid.is_empty() {
            return Err(ScopeError::ConfigError("Search grid is empty".to_string()));
        }
        if self.search.n_estimators == 0 {
            return Err(ScopeError::ConfigError("Forest needs at least one tree".to_string()));
        }
        Ok(())
    }
}
