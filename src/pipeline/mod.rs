//! End-to-end credit default analysis
//!
//! Loads the observation table, shuffles it, derives the historical
//! aggregates, splits it in half, selects a random forest by cross-validated
//! grid search and, optionally, extracts interpretable rules from the
//! training half. Both models are scored on the held-out half.

mod config;

pub use config::PipelineConfig;

use crate::data::{DataLoader, Dataset};
use crate::error::{Result, ScopeError};
use crate::feature_engineering::RowAggregates;
use crate::metrics::{ClassificationMetrics, RankingCurves};
use crate::optimizer::{CandidateResult, ForestParams, GridSearchCV};
use crate::rules::SkopeRules;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Forest probability at or above which a row is predicted to default
pub const FOREST_THRESHOLD: f64 = 0.5;

/// A rule and its out-of-bag scores, as reported
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSummary {
    pub rule: String,
    pub precision: f64,
    pub recall: f64,
    pub n_occurrences: usize,
}

/// Outcome of rule extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesReport {
    /// Number of rules kept after deduplication
    pub n_rules: usize,
    /// Kept rules, most precise first
    pub top_rules: Vec<RuleSummary>,
    /// Held-out metrics of "any selected rule matches"
    pub test_metrics: ClassificationMetrics,
    /// Held-out ROC and precision-recall curves of the separate rule score
    pub score_curves: RankingCurves,
}

/// Everything the analysis found
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Rows after loading
    pub n_rows: usize,
    pub n_train: usize,
    pub n_test: usize,
    /// Training rows with a positive label
    pub train_positive_rate: f64,
    /// Model input columns, in matrix order
    pub feature_names: Vec<String>,
    pub best_params: ForestParams,
    /// Mean cross-validated ROC AUC of the best candidate
    pub best_cv_score: f64,
    /// Every candidate, in grid order
    pub cv_results: Vec<CandidateResult>,
    /// Impurity importances of the refit forest, largest first
    pub feature_importances: Vec<(String, f64)>,
    /// Held-out metrics of the refit forest
    pub test_metrics: ClassificationMetrics,
    /// Held-out ROC and precision-recall curves of the forest probabilities
    pub test_curves: RankingCurves,
    /// Present when rule extraction ran
    pub rules: Option<RulesReport>,
    pub elapsed_secs: f64,
}

/// Runs the analysis stages described by a [`PipelineConfig`]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline. Rule extraction without a seed of its own takes
    /// the pipeline seed.
    pub fn new(mut config: PipelineConfig) -> Self {
        if let Some(rules) = config.rules.as_mut() {
            rules.random_state.get_or_insert(config.random_state);
        }
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load, shuffle, drop identifiers, rename, derive aggregates and split
    /// in half. Returns `(train, test)` and the number of loaded rows.
    pub fn prepare(&self) -> Result<(Dataset, Dataset, usize)> {
        let data = &self.config.data;
        let path = data
            .path
            .as_deref()
            .ok_or_else(|| ScopeError::ConfigError("No input file configured".to_string()))?;

        let df = DataLoader::from_config(data).load(path)?;
        let dataset = Dataset::from_dataframe(&df, &data.target_column)?;
        let n_rows = dataset.n_samples();
        if n_rows < 2 {
            return Err(ScopeError::DataError(format!(
                "Need at least 2 rows to split, found {}",
                n_rows
            )));
        }

        let mut dataset = dataset
            .shuffle(self.config.random_state)
            .drop_columns(&data.drop_columns[..])?;

        for rename in &data.renames {
            if dataset.column_index(&rename.from).is_err() {
                warn!(from = %rename.from, to = %rename.to, "Rename source column not found; skipping");
                continue;
            }
            dataset.rename_column(&rename.from, &rename.to)?;
        }

        let mut aggregates = RowAggregates::new(self.config.features.clone());
        let dataset = dataset.transform(&mut aggregates)?;
        if dataset.has_missing() {
            warn!("Feature matrix contains missing values; model fitting will reject them");
        }

        let (train, test) = dataset.split_half();
        info!(
            rows = n_rows,
            train = train.n_samples(),
            test = test.n_samples(),
            features = train.n_features(),
            "Prepared observation table"
        );
        Ok((train, test, n_rows))
    }

    /// Grid search over the forest hyperparameters on the training rows
    pub fn select_model(&self, train: &Dataset) -> Result<GridSearchCV> {
        let mut search = GridSearchCV::new(self.config.search.clone());
        search.fit(train.features(), train.target())?;
        Ok(search)
    }

    /// Rules from the training rows, or `None` when extraction is disabled
    pub fn extract_rules(&self, train: &Dataset) -> Result<Option<SkopeRules>> {
        let Some(config) = &self.config.rules else {
            return Ok(None);
        };
        let config = config.clone().with_feature_names(train.feature_names().to_vec());
        let mut skope = SkopeRules::new(config);
        skope.fit(train.features(), train.target(), None)?;
        Ok(Some(skope))
    }

    /// Run every stage and score both models on the held-out rows
    pub fn run(&self) -> Result<PipelineReport> {
        let start = Instant::now();
        let (train, test, n_rows) = self.prepare()?;

        let search = self.select_model(&train)?;
        let skope = self.extract_rules(&train)?;
        self.evaluate(n_rows, &train, &test, &search, skope.as_ref(), start)
    }

    /// Score the fitted models on the held-out rows and assemble the report
    pub fn evaluate(
        &self,
        n_rows: usize,
        train: &Dataset,
        test: &Dataset,
        search: &GridSearchCV,
        skope: Option<&SkopeRules>,
        start: Instant,
    ) -> Result<PipelineReport> {
        let best_params = *search
            .best_params()
            .ok_or_else(|| ScopeError::OptimizationError("No candidate was selected".to_string()))?;
        let best_cv_score = search.best_score().unwrap_or(f64::NAN);

        let forest = search.best_estimator().ok_or(ScopeError::ModelNotFitted)?;
        let proba = forest.positive_proba(test.features())?;
        let test_metrics = ClassificationMetrics::compute(test.target(), &proba, FOREST_THRESHOLD)?;
        let test_curves = RankingCurves::compute(test.target(), &proba)?;
        info!(
            params = %best_params,
            cv_auc = best_cv_score,
            test_auc = ?test_metrics.auc_roc,
            "Scored the selected forest on held-out rows"
        );

        let mut feature_importances: Vec<(String, f64)> = match forest.feature_importances() {
            Some(imp) => train
                .feature_names()
                .iter()
                .cloned()
                .zip(imp.iter().copied())
                .collect(),
            None => Vec::new(),
        };
        feature_importances.sort_by(|a, b| b.1.total_cmp(&a.1));

        let rules = match skope {
            Some(skope) => Some(rules_report(skope, test)?),
            None => None,
        };

        Ok(PipelineReport {
            n_rows,
            n_train: train.n_samples(),
            n_test: test.n_samples(),
            train_positive_rate: train.positive_rate(),
            feature_names: train.feature_names().to_vec(),
            best_params,
            best_cv_score,
            cv_results: search.cv_results().to_vec(),
            feature_importances,
            test_metrics,
            test_curves,
            rules,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }
}

fn rules_report(skope: &SkopeRules, test: &Dataset) -> Result<RulesReport> {
    // any matching rule contributes a positive precision
    let scores = skope.decision_function(test.features())?;
    let test_metrics = ClassificationMetrics::compute(test.target(), &scores, f64::MIN_POSITIVE)?;
    // ranked by the precision rank of the best matching rule
    let separate = skope.separate_rule_score(test.features())?;
    let score_curves = RankingCurves::compute(test.target(), &separate)?;

    let top_rules: Vec<RuleSummary> = skope
        .rules()
        .iter()
        .map(|r| RuleSummary {
            rule: r.rule.to_string(),
            precision: r.precision,
            recall: r.recall,
            n_occurrences: r.n_occurrences,
        })
        .collect();

    info!(
        rules = top_rules.len(),
        precision = test_metrics.precision,
        score_auc = ?score_curves.roc_auc,
        "Scored the rules on held-out rows"
    );
    Ok(RulesReport {
        n_rules: top_rules.len(),
        top_rules,
        test_metrics,
        score_curves,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::roc_auc_score;
    use crate::rules::SkopeRulesConfig;
    use ndarray::{Array1, Array2};

    #[test]
    fn test_rules_inherit_pipeline_seed() {
        let pipeline = Pipeline::new(PipelineConfig::default().with_random_state(42));
        assert_eq!(pipeline.config().rules.as_ref().unwrap().random_state, Some(42));

        let own = SkopeRulesConfig::default().with_random_state(3);
        let pipeline = Pipeline::new(PipelineConfig::default().with_rules(Some(own)));
        assert_eq!(pipeline.config().rules.as_ref().unwrap().random_state, Some(3));
    }

    fn thresholded(n: usize) -> Dataset {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| ((i * (j + 3) * 7) % 23) as f64);
        let y = Array1::from_shape_fn(n, |i| if (i * 21) % 23 > 17 { 1.0 } else { 0.0 });
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        Dataset::new(names, x, y).unwrap()
    }

    #[test]
    fn test_rules_report_ranks_by_separate_score() {
        let train = thresholded(120);
        let test = thresholded(60);
        let mut skope = SkopeRules::new(SkopeRulesConfig::default().with_random_state(4));
        skope.fit(train.features(), train.target(), None).unwrap();

        let report = rules_report(&skope, &test).unwrap();
        let scores = skope.separate_rule_score(test.features()).unwrap();
        let expected = roc_auc_score(test.target(), &scores).unwrap();

        let curves = &report.score_curves;
        assert!((curves.roc_auc.unwrap() - expected).abs() < 1e-12);
        assert!(scores.iter().all(|&s| s >= 0.0 && s <= report.n_rules as f64));
        assert_eq!(curves.roc.as_ref().unwrap().thresholds[0], f64::INFINITY);
        let pr = curves.pr.as_ref().unwrap();
        assert_eq!(pr.precision.len(), pr.thresholds.len() + 1);
        assert!(curves.pr_auc.is_some());
    }

    #[test]
    fn test_prepare_without_path() {
        let pipeline = Pipeline::new(PipelineConfig::default());
        assert!(matches!(pipeline.prepare(), Err(ScopeError::ConfigError(_))));
    }
}
