//! Feature engineering module
//!
//! Provides feature generation over named feature matrices:
//! - Row-wise aggregates (mean, standard deviation) over column groups

pub mod aggregates;

pub use aggregates::{AggregateGroup, FeatureEngineeringConfig, RowAggregates, RowStatistic};

use crate::error::Result;
use ndarray::Array2;

/// Trait for feature transformers
pub trait FeatureTransformer: Send + Sync {
    /// Fit the transformer against a matrix and its column names
    fn fit(&mut self, x: &Array2<f64>, feature_names: &[String]) -> Result<()>;

    /// Transform data
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Fit and transform in one step
    fn fit_transform(&mut self, x: &Array2<f64>, feature_names: &[String]) -> Result<Array2<f64>> {
        self.fit(x, feature_names)?;
        self.transform(x)
    }

    /// Get output feature names
    fn get_feature_names(&self) -> Vec<String>;
}
