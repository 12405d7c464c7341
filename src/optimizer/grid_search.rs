//! Exhaustive cross-validated search over forest hyperparameters

use crate::error::{Result, ScopeError};
use crate::metrics::roc_auc_score;
use crate::training::{CVSplit, CVResults, CrossValidator, MaxFeatures, RandomForest};
use super::config::{ForestParams, GridSearchConfig};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cross-validation outcome of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    /// Hyperparameters
    pub params: ForestParams,
    /// Per-fold ROC AUC; NaN where the fold could not be scored
    pub fold_scores: Vec<f64>,
    /// Mean over folds (NaN if any fold is NaN)
    pub mean_score: f64,
    /// Standard deviation over folds
    pub std_score: f64,
    /// 1 for the best mean; NaN candidates rank last
    pub rank: usize,
}

/// Grid search over `max_depth` x `max_features` of a random forest,
/// scored by ROC AUC and refit on the full training data
pub struct GridSearchCV {
    config: GridSearchConfig,
    results: Vec<CandidateResult>,
    best_index: Option<usize>,
    best_estimator: Option<RandomForest>,
}

impl GridSearchCV {
    pub fn new(config: GridSearchConfig) -> Self {
        Self {
            config,
            results: Vec::new(),
            best_index: None,
            best_estimator: None,
        }
    }

    pub fn config(&self) -> &GridSearchConfig {
        &self.config
    }

    fn build_forest(&self, params: &ForestParams) -> RandomForest {
        RandomForest::new_classifier(self.config.n_estimators)
            .with_max_depth(params.max_depth)
            .with_max_features(MaxFeatures::Fraction(params.max_features))
            .with_class_weight(self.config.class_weight)
            .with_random_state(self.config.random_state)
    }

    fn validate(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Vec<ForestParams>> {
        if x.nrows() != y.len() {
            return Err(ScopeError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if x.iter().any(|v| v.is_nan()) {
            return Err(ScopeError::DataError(
                "Input contains missing values (NaN); impute or drop them before fitting".to_string(),
            ));
        }
        if self.config.n_estimators == 0 {
            return Err(ScopeError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(&f) = self
            .config
            .max_features_grid
            .iter()
            .find(|&&f| !(f > 0.0 && f <= 1.0))
        {
            return Err(ScopeError::InvalidParameter {
                name: "max_features_grid".to_string(),
                value: f.to_string(),
                reason: "fractions must be in (0, 1]".to_string(),
            });
        }
        if self.config.max_depth_grid.contains(&0) {
            return Err(ScopeError::InvalidParameter {
                name: "max_depth_grid".to_string(),
                value: "0".to_string(),
                reason: "depths must be at least 1".to_string(),
            });
        }

        let candidates = self.config.candidates();
        if candidates.is_empty() {
            return Err(ScopeError::ConfigError("Parameter grid is empty".to_string()));
        }
        Ok(candidates)
    }

    /// ROC AUC of one candidate on one fold, NaN when it cannot be computed
    fn score_fold(&self, params: &ForestParams, split: &CVSplit, x: &Array2<f64>, y: &Array1<f64>) -> f64 {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut forest = self.build_forest(params);
        let scored = forest
            .fit(&x_train, &y_train)
            .and_then(|f| f.positive_proba(&x_test))
            .and_then(|scores| roc_auc_score(&y_test, &scores));

        match scored {
            Ok(auc) => auc,
            Err(e) => {
                warn!(params = %params, fold = split.fold_idx, error = %e, "Fold could not be scored");
                f64::NAN
            }
        }
    }

    /// Evaluate every candidate on every fold, pick the best mean ROC AUC and
    /// refit it on all rows
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let start = Instant::now();
        let candidates = self.validate(x, y)?;
        let splits = CrossValidator::new(self.config.cv.clone()).split(x.nrows(), Some(y))?;
        let n_folds = splits.len();

        info!(
            n_candidates = candidates.len(),
            n_folds,
            n_samples = x.nrows(),
            n_features = x.ncols(),
            "Starting grid search"
        );

        let jobs: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..n_folds).map(move |f| (c, f)))
            .collect();

        let run = || -> Vec<f64> {
            jobs.par_iter()
                .map(|&(c, f)| self.score_fold(&candidates[c], &splits[f], x, y))
                .collect()
        };

        let flat_scores = match self.config.n_jobs {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| ScopeError::ThreadPoolError(e.to_string()))?
                .install(run),
            None => run(),
        };

        let mut results: Vec<CandidateResult> = candidates
            .iter()
            .zip(flat_scores.chunks(n_folds))
            .map(|(params, scores)| {
                let cv = CVResults::from_scores(scores.to_vec());
                debug!(params = %params, mean = cv.mean_score, std = cv.std_score, "Candidate scored");
                CandidateResult {
                    params: *params,
                    fold_scores: cv.scores,
                    mean_score: cv.mean_score,
                    std_score: cv.std_score,
                    rank: 0,
                }
            })
            .collect();

        assign_ranks(&mut results);

        let best_index = best_candidate(&results).ok_or_else(|| {
            ScopeError::OptimizationError(
                "Every candidate produced an undefined cross-validation score".to_string(),
            )
        })?;
        let best_params = results[best_index].params;

        let mut best = self.build_forest(&best_params);
        best.fit(x, y)?;

        info!(
            best = %best_params,
            score = results[best_index].mean_score,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Grid search finished"
        );

        self.results = results;
        self.best_index = Some(best_index);
        self.best_estimator = Some(best);
        Ok(self)
    }

    /// Hyperparameters of the winning candidate
    pub fn best_params(&self) -> Option<&ForestParams> {
        self.best_index.map(|i| &self.results[i].params)
    }

    /// Mean cross-validated ROC AUC of the winning candidate
    pub fn best_score(&self) -> Option<f64> {
        self.best_index.map(|i| self.results[i].mean_score)
    }

    /// Winning forest refit on all training rows
    pub fn best_estimator(&self) -> Option<&RandomForest> {
        self.best_estimator.as_ref()
    }

    /// Per-candidate results in grid order
    pub fn cv_results(&self) -> &[CandidateResult] {
        &self.results
    }

    /// Class probabilities from the refit forest
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.best_estimator
            .as_ref()
            .ok_or(ScopeError::ModelNotFitted)?
            .predict_proba(x)
    }

    /// Positive-class probability from the refit forest
    pub fn positive_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.best_estimator
            .as_ref()
            .ok_or(ScopeError::ModelNotFitted)?
            .positive_proba(x)
    }
}

/// Highest non-NaN mean; the earliest candidate wins ties
fn best_candidate(results: &[CandidateResult]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, r) in results.iter().enumerate() {
        if r.mean_score.is_nan() {
            continue;
        }
        match best {
            Some(b) if results[b].mean_score >= r.mean_score => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Rank by mean score, equal means share the lower rank
fn assign_ranks(results: &mut [CandidateResult]) {
    let means: Vec<f64> = results.iter().map(|r| r.mean_score).collect();
    let n_valid = means.iter().filter(|m| !m.is_nan()).count();
    for (r, &m) in results.iter_mut().zip(&means) {
        r.rank = if m.is_nan() {
            n_valid + 1
        } else {
            1 + means.iter().filter(|&&o| !o.is_nan() && o > m).count()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::CVStrategy;

    fn separable(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => i as f64,
            1 => ((i * 7) % 5) as f64,
            _ => ((i * 3) % 11) as f64,
        });
        let y = Array1::from_shape_fn(n, |i| if i >= n / 2 { 1.0 } else { 0.0 });
        (x, y)
    }

    fn small_config() -> GridSearchConfig {
        GridSearchConfig::new()
            .with_n_estimators(5)
            .with_max_depth_grid(vec![2, 3])
            .with_max_features_grid(vec![0.5, 1.0])
            .with_cv_folds(3)
            .with_random_state(1)
    }

    #[test]
    fn test_grid_search_selects_in_grid() {
        let (x, y) = separable(60);
        let mut search = GridSearchCV::new(small_config());
        search.fit(&x, &y).unwrap();

        let best = search.best_params().unwrap();
        assert!([2, 3].contains(&best.max_depth));
        assert!([0.5, 1.0].contains(&best.max_features));
        assert_eq!(search.cv_results().len(), 4);
        assert!(search.cv_results().iter().all(|r| r.fold_scores.len() == 3));
        assert!(search.best_score().unwrap() > 0.9);

        let scores = search.positive_proba(&x).unwrap();
        assert_eq!(scores.len(), 60);
        assert!(scores.iter().all(|&s| (0.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_dedicated_pool_matches_global_pool() {
        let (x, y) = separable(40);
        let mut a = GridSearchCV::new(small_config());
        let mut b = GridSearchCV::new(small_config().with_n_jobs(2));
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        let sa: Vec<f64> = a.cv_results().iter().map(|r| r.mean_score).collect();
        let sb: Vec<f64> = b.cv_results().iter().map(|r| r.mean_score).collect();
        assert_eq!(sa, sb);
        assert_eq!(a.best_params(), b.best_params());
    }

    #[test]
    fn test_rejects_missing_values() {
        let (mut x, y) = separable(20);
        x[[3, 1]] = f64::NAN;
        let mut search = GridSearchCV::new(small_config());
        assert!(matches!(search.fit(&x, &y), Err(ScopeError::DataError(_))));
    }

    #[test]
    fn test_single_class_folds_fail_search() {
        let (x, _) = separable(20);
        let y = Array1::zeros(20);
        let config = small_config().with_cv(CVStrategy::KFold { n_splits: 2, shuffle: false });
        let mut search = GridSearchCV::new(config);
        assert!(matches!(search.fit(&x, &y), Err(ScopeError::OptimizationError(_))));
    }

    #[test]
    fn test_best_candidate_ties_and_nan() {
        let mk = |mean: f64| CandidateResult {
            params: ForestParams { max_depth: 3, max_features: 1.0 },
            fold_scores: vec![mean],
            mean_score: mean,
            std_score: 0.0,
            rank: 0,
        };
        let mut results = vec![mk(f64::NAN), mk(0.7), mk(0.8), mk(0.8)];
        assert_eq!(best_candidate(&results), Some(2));

        assign_ranks(&mut results);
        let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![4, 3, 1, 1]);

        assert_eq!(best_candidate(&[mk(f64::NAN)]), None);
    }

    #[test]
    fn test_not_fitted() {
        let search = GridSearchCV::new(small_config());
        assert!(search.best_params().is_none());
        assert!(matches!(
            search.positive_proba(&Array2::zeros((1, 3))),
            Err(ScopeError::ModelNotFitted)
        ));
    }
}
