//! In-memory observation table: named feature matrix plus label vector

use crate::error::{Result, ScopeError};
use crate::feature_engineering::FeatureTransformer;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Feature matrix with column names and aligned labels
#[derive(Debug, Clone)]
pub struct Dataset {
    feature_names: Vec<String>,
    features: Array2<f64>,
    target: Array1<f64>,
}

impl Dataset {
    /// Create a dataset, checking that names, columns and rows line up
    pub fn new(feature_names: Vec<String>, features: Array2<f64>, target: Array1<f64>) -> Result<Self> {
        if feature_names.len() != features.ncols() {
            return Err(ScopeError::ShapeError {
                expected: format!("{} feature names", features.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }
        if target.len() != features.nrows() {
            return Err(ScopeError::ShapeError {
                expected: format!("target length = {}", features.nrows()),
                actual: format!("target length = {}", target.len()),
            });
        }
        Ok(Self {
            feature_names,
            features,
            target,
        })
    }

    /// Separate the label column from the feature columns of a DataFrame.
    /// Missing feature cells become NaN; a missing label is an error.
    pub fn from_dataframe(df: &DataFrame, target_column: &str) -> Result<Self> {
        let target_values = column_values(df, target_column)?;
        if let Some(row) = target_values.iter().position(|v| v.is_nan()) {
            return Err(ScopeError::DataError(format!(
                "Missing value in target column '{}' at row {}",
                target_column, row
            )));
        }

        let feature_names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .filter(|n| n != target_column)
            .collect();

        let features = columns_to_array2(df, &feature_names)?;
        Self::new(feature_names, features, Array1::from_vec(target_values))
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn target(&self) -> &Array1<f64> {
        &self.target
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Position of a named column
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.feature_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ScopeError::FeatureNotFound(name.to_string()))
    }

    /// View of a named column
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self.column_index(name)?;
        Ok(self.features.column(idx))
    }

    /// Reorder rows with a seeded permutation, keeping features and labels aligned
    pub fn shuffle(&self, seed: u64) -> Self {
        let order = permutation(self.n_samples(), seed);
        self.select_rows(&order)
    }

    /// Rows at the given positions, in that order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            features: self.features.select(Axis(0), indices),
            target: self.target.select(Axis(0), indices),
        }
    }

    /// Remove named columns; every name must exist
    pub fn drop_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut drop = Vec::with_capacity(names.len());
        for name in names {
            drop.push(self.column_index(name.as_ref())?);
        }

        let keep: Vec<usize> = (0..self.n_features()).filter(|j| !drop.contains(j)).collect();
        Ok(Self {
            feature_names: keep.iter().map(|&j| self.feature_names[j].clone()).collect(),
            features: self.features.select(Axis(1), &keep),
            target: self.target.clone(),
        })
    }

    /// Rename a column in place
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        if from != to && self.feature_names.iter().any(|n| n == to) {
            return Err(ScopeError::DataError(format!(
                "Cannot rename '{}' to '{}': column already exists",
                from, to
            )));
        }
        let idx = self.column_index(from)?;
        self.feature_names[idx] = to.to_string();
        Ok(())
    }

    /// Fit a transformer on this dataset and return the transformed copy
    pub fn transform<T: FeatureTransformer>(&self, transformer: &mut T) -> Result<Self> {
        let features = transformer.fit_transform(&self.features, &self.feature_names)?;
        Self::new(transformer.get_feature_names(), features, self.target.clone())
    }

    /// Prefix of `n_train` rows and the remaining suffix
    pub fn split_at(&self, n_train: usize) -> Result<(Self, Self)> {
        if n_train > self.n_samples() {
            return Err(ScopeError::ValidationError(format!(
                "Cannot take {} training rows from {} samples",
                n_train,
                self.n_samples()
            )));
        }
        let train: Vec<usize> = (0..n_train).collect();
        let test: Vec<usize> = (n_train..self.n_samples()).collect();
        Ok((self.select_rows(&train), self.select_rows(&test)))
    }

    /// First half for training, second half for testing
    pub fn split_half(&self) -> (Self, Self) {
        let n_train = midpoint(self.n_samples());
        let train: Vec<usize> = (0..n_train).collect();
        let test: Vec<usize> = (n_train..self.n_samples()).collect();
        (self.select_rows(&train), self.select_rows(&test))
    }

    /// Whether any feature cell is missing
    pub fn has_missing(&self) -> bool {
        self.features.iter().any(|v| v.is_nan())
    }

    /// Share of rows with a positive label
    pub fn positive_rate(&self) -> f64 {
        if self.target.is_empty() {
            return 0.0;
        }
        self.target.iter().filter(|&&v| v > 0.0).count() as f64 / self.target.len() as f64
    }
}

/// Seeded permutation of `0..n`
pub fn permutation(n: usize, seed: u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    order.shuffle(&mut rng);
    order
}

/// Number of training rows of a half split
pub fn midpoint(n_samples: usize) -> usize {
    n_samples / 2
}

fn column_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| ScopeError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Extract named columns from a DataFrame into a row-major Array2<f64>
fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| column_values(df, name))
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_refs[c][r]))
}
