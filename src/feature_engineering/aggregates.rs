//! Row-wise aggregates over groups of historical columns

use crate::error::{Result, ScopeError};
use crate::feature_engineering::FeatureTransformer;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Statistic computed across the columns of a group, per row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatistic {
    /// Arithmetic mean
    Mean,
    /// Population standard deviation (divisor n)
    Std,
}

impl RowStatistic {
    /// Apply the statistic, skipping missing values.
    /// Returns NaN when every value is missing.
    pub fn apply(&self, values: &[f64]) -> f64 {
        let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if present.is_empty() {
            return f64::NAN;
        }
        let n = present.len() as f64;
        let mean = present.iter().sum::<f64>() / n;
        match self {
            RowStatistic::Mean => mean,
            RowStatistic::Std => {
                let var = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                var.sqrt()
            }
        }
    }

    /// Suffix used in output column names
    pub fn suffix(&self) -> &'static str {
        match self {
            RowStatistic::Mean => "mean",
            RowStatistic::Std => "std",
        }
    }
}

/// A group of source columns summarized by one or more statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateGroup {
    /// Prefix of the output columns (`{name}_{statistic}`)
    pub name: String,
    /// Source columns
    pub columns: Vec<String>,
    /// Statistics to compute, in output order
    pub statistics: Vec<RowStatistic>,
}

impl AggregateGroup {
    pub fn new(name: impl Into<String>, columns: &[&str], statistics: Vec<RowStatistic>) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            statistics,
        }
    }

    /// Names of the columns this group produces
    pub fn output_names(&self) -> Vec<String> {
        self.statistics
            .iter()
            .map(|s| format!("{}_{}", self.name, s.suffix()))
            .collect()
    }
}

/// Feature engineering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureEngineeringConfig {
    /// Aggregate groups, in output order
    pub groups: Vec<AggregateGroup>,
    /// Remove the source columns after aggregation
    pub drop_sources: bool,
}

impl Default for FeatureEngineeringConfig {
    /// The four oldest months of payment status, bill amount and payment amount
    fn default() -> Self {
        Self {
            groups: vec![
                AggregateGroup::new(
                    "PAY_old",
                    &["PAY_3", "PAY_4", "PAY_5", "PAY_6"],
                    vec![RowStatistic::Mean],
                ),
                AggregateGroup::new(
                    "BILL_AMT_old",
                    &["BILL_AMT3", "BILL_AMT4", "BILL_AMT5", "BILL_AMT6"],
                    vec![RowStatistic::Mean, RowStatistic::Std],
                ),
                AggregateGroup::new(
                    "PAY_AMT_old",
                    &["PAY_AMT3", "PAY_AMT4", "PAY_AMT5", "PAY_AMT6"],
                    vec![RowStatistic::Mean, RowStatistic::Std],
                ),
            ],
            drop_sources: true,
        }
    }
}

/// Appends per-row aggregates of column groups and drops the sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowAggregates {
    groups: Vec<AggregateGroup>,
    drop_sources: bool,
    /// Input names seen at fit time
    feature_names_in: Option<Vec<String>>,
    /// Source column indices per group
    group_indices: Option<Vec<Vec<usize>>>,
    /// Input columns passed through
    kept: Option<Vec<usize>>,
}

impl RowAggregates {
    pub fn new(config: FeatureEngineeringConfig) -> Self {
        Self {
            groups: config.groups,
            drop_sources: config.drop_sources,
            feature_names_in: None,
            group_indices: None,
            kept: None,
        }
    }

    pub fn groups(&self) -> &[AggregateGroup] {
        &self.groups
    }
}

impl Default for RowAggregates {
    fn default() -> Self {
        Self::new(FeatureEngineeringConfig::default())
    }
}

impl FeatureTransformer for RowAggregates {
    fn fit(&mut self, x: &Array2<f64>, feature_names: &[String]) -> Result<()> {
        if feature_names.len() != x.ncols() {
            return Err(ScopeError::ShapeError {
                expected: format!("{} feature names", x.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }

        let mut group_indices = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            if group.columns.is_empty() {
                return Err(ScopeError::ConfigError(format!(
                    "Aggregate group '{}' has no columns",
                    group.name
                )));
            }
            let indices = group
                .columns
                .iter()
                .map(|col| {
                    feature_names
                        .iter()
                        .position(|n| n == col)
                        .ok_or_else(|| ScopeError::FeatureNotFound(col.clone()))
                })
                .collect::<Result<Vec<usize>>>()?;
            group_indices.push(indices);
        }

        let kept: Vec<usize> = if self.drop_sources {
            (0..x.ncols())
                .filter(|j| !group_indices.iter().any(|g| g.contains(j)))
                .collect()
        } else {
            (0..x.ncols()).collect()
        };

        self.feature_names_in = Some(feature_names.to_vec());
        self.group_indices = Some(group_indices);
        self.kept = Some(kept);
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (group_indices, kept, names_in) = match (&self.group_indices, &self.kept, &self.feature_names_in) {
            (Some(g), Some(k), Some(n)) => (g, k, n),
            _ => {
                return Err(ScopeError::ValidationError(
                    "Transformer not fitted".to_string(),
                ))
            }
        };

        if x.ncols() != names_in.len() {
            return Err(ScopeError::ShapeError {
                expected: format!("{} columns", names_in.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let n_derived: usize = self.groups.iter().map(|g| g.statistics.len()).sum();
        let mut result = Array2::zeros((x.nrows(), kept.len() + n_derived));

        for (i, row) in x.rows().into_iter().enumerate() {
            let mut col_idx = 0;
            for &j in kept {
                result[[i, col_idx]] = row[j];
                col_idx += 1;
            }

            for (group, indices) in self.groups.iter().zip(group_indices) {
                let values: Vec<f64> = indices.iter().map(|&j| row[j]).collect();
                for stat in &group.statistics {
                    result[[i, col_idx]] = stat.apply(&values);
                    col_idx += 1;
                }
            }
        }

        Ok(result)
    }

    fn get_feature_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let (Some(kept), Some(names_in)) = (&self.kept, &self.feature_names_in) {
            names.extend(kept.iter().map(|&j| names_in[j].clone()));
        }
        for group in &self.groups {
            names.extend(group.output_names());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn credit_like() -> (Array2<f64>, Vec<String>) {
        let names: Vec<String> = [
            "LIMIT_BAL", "PAY_1", "PAY_3", "PAY_4", "PAY_5", "PAY_6",
            "BILL_AMT3", "BILL_AMT4", "BILL_AMT5", "BILL_AMT6",
            "PAY_AMT3", "PAY_AMT4", "PAY_AMT5", "PAY_AMT6",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let x = Array2::from_shape_fn((6, names.len()), |(i, j)| (i * 10 + j) as f64 * 1.5);
        (x, names)
    }

    #[test]
    fn test_statistics() {
        assert_eq!(RowStatistic::Mean.apply(&[1.0, 2.0, 3.0, 6.0]), 3.0);
        let std = RowStatistic::Std.apply(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((std - 2.0).abs() < 1e-12);
        assert_eq!(RowStatistic::Std.apply(&[5.0]), 0.0);
    }

    #[test]
    fn test_statistics_skip_missing() {
        assert_eq!(RowStatistic::Mean.apply(&[1.0, f64::NAN, 3.0]), 2.0);
        assert_eq!(RowStatistic::Std.apply(&[1.0, f64::NAN, 3.0]), 1.0);
        assert!(RowStatistic::Mean.apply(&[f64::NAN, f64::NAN]).is_nan());
    }

    #[test]
    fn test_sources_replaced_by_summaries() {
        let (x, names) = credit_like();
        let mut agg = RowAggregates::default();
        let out = agg.fit_transform(&x, &names).unwrap();
        let out_names = agg.get_feature_names();

        assert_eq!(out.nrows(), x.nrows());
        assert_eq!(out.ncols(), out_names.len());
        assert_eq!(
            out_names,
            vec![
                "LIMIT_BAL", "PAY_1", "PAY_old_mean", "BILL_AMT_old_mean",
                "BILL_AMT_old_std", "PAY_AMT_old_mean", "PAY_AMT_old_std",
            ]
        );
        for removed in ["PAY_3", "PAY_6", "BILL_AMT3", "BILL_AMT6", "PAY_AMT3", "PAY_AMT6"] {
            assert!(!out_names.iter().any(|n| n == removed));
        }
    }

    #[test]
    fn test_spot_check_rows() {
        let (x, names) = credit_like();
        let mut agg = RowAggregates::default();
        let out = agg.fit_transform(&x, &names).unwrap();

        for i in [0, 3, 5] {
            let bill: Vec<f64> = (6..10).map(|j| x[[i, j]]).collect();
            let mean = bill.iter().sum::<f64>() / 4.0;
            let std = (bill.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0).sqrt();
            assert!((out[[i, 3]] - mean).abs() < 1e-9);
            assert!((out[[i, 4]] - std).abs() < 1e-9);

            let pay_mean = (2..6).map(|j| x[[i, j]]).sum::<f64>() / 4.0;
            assert!((out[[i, 2]] - pay_mean).abs() < 1e-9);
        }
    }

    #[test]
    fn test_keep_sources() {
        let (x, names) = credit_like();
        let config = FeatureEngineeringConfig {
            drop_sources: false,
            ..FeatureEngineeringConfig::default()
        };
        let mut agg = RowAggregates::new(config);
        let out = agg.fit_transform(&x, &names).unwrap();
        assert_eq!(out.ncols(), names.len() + 5);
    }

    #[test]
    fn test_missing_source_column() {
        let (x, mut names) = credit_like();
        names[2] = "PAY_2".to_string();
        let mut agg = RowAggregates::default();
        assert!(matches!(agg.fit(&x, &names), Err(ScopeError::FeatureNotFound(c)) if c == "PAY_3"));
    }

    #[test]
    fn test_transform_before_fit() {
        let (x, _) = credit_like();
        assert!(RowAggregates::default().transform(&x).is_err());
    }
}
