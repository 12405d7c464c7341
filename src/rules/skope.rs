//! Rule induction from bagged trees
//!
//! Two bagged ensembles (classification trees on the labels, regression trees
//! on a weight-aware target) are grown on row and column subsets. Every
//! root-to-leaf path becomes a candidate rule, scored on the rows its tree did
//! not see. Precise, non-trivial rules are kept, averaged across trees,
//! sorted by precision, and near-duplicates are removed.

use crate::error::{Result, ScopeError};
use crate::training::random_forest::sorted_classes;
use crate::training::{BaggedEstimator, BaggingConfig, BaggingEnsemble, DecisionTree, MaxSamples};
use super::config::SkopeRulesConfig;
use super::rule::{extract_rules, Rule};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// A kept rule with its averaged out-of-bag performance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRule {
    pub rule: Rule,
    /// Mean out-of-bag precision over the trees that produced the rule
    pub precision: f64,
    /// Mean out-of-bag recall over the trees that produced the rule
    pub recall: f64,
    /// Number of trees that produced the rule
    pub n_occurrences: usize,
}

/// Interpretable rule-based classifier
pub struct SkopeRules {
    config: SkopeRulesConfig,
    feature_names: Vec<String>,
    n_features: Option<usize>,
    max_samples: usize,
    estimators: Vec<BaggedEstimator>,
    rules: Vec<ScoredRule>,
}

impl SkopeRules {
    pub fn new(config: SkopeRulesConfig) -> Self {
        Self {
            config,
            feature_names: Vec::new(),
            n_features: None,
            max_samples: 0,
            estimators: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn config(&self) -> &SkopeRulesConfig {
        &self.config
    }

    /// Fit the rules on `x` and binary labels `y`. Sample weights only shape
    /// the target of the regression trees.
    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<&mut Self> {
        let (n_samples, n_features) = x.dim();
        if y.len() != n_samples {
            return Err(ScopeError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if x.iter().any(|v| v.is_nan()) {
            return Err(ScopeError::DataError(
                "Input contains missing values (NaN); impute or drop them before fitting".to_string(),
            ));
        }

        let classes = sorted_classes(y);
        if classes.len() < 2 {
            return Err(ScopeError::ValidationError(format!(
                "Rule induction needs samples of at least 2 classes, found only {:?}",
                classes
            )));
        }
        let y = if classes != [0.0, 1.0] {
            warn!(
                ?classes,
                "Labels are not {{0, 1}}; any label above 0 is treated as the target class"
            );
            y.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
        } else {
            y.clone()
        };

        let thres = self.config.similarity_thres;
        if !(thres > 0.0 && thres <= 1.0) {
            return Err(ScopeError::InvalidParameter {
                name: "similarity_thres".to_string(),
                value: thres.to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }
        self.config.max_features.validate()?;

        let feature_names = match &self.config.feature_names {
            Some(names) if names.len() != n_features => {
                return Err(ScopeError::ShapeError {
                    expected: format!("{} feature names", n_features),
                    actual: format!("{} feature names", names.len()),
                })
            }
            Some(names) => names.clone(),
            None => (0..n_features).map(|i| format!("c{}", i)).collect(),
        };

        let max_samples = self.config.max_samples.resolve(n_samples)?;
        let bagging = BaggingConfig {
            n_estimators: self.config.n_estimators,
            max_samples: MaxSamples::Count(max_samples),
            max_features: self.config.max_samples_features,
            bootstrap: self.config.bootstrap,
            bootstrap_features: self.config.bootstrap_features,
            random_state: self.config.random_state.unwrap_or(0),
        };
        let per_split = self
            .config
            .max_features
            .resolve(bagging.n_features_per_estimator(n_features));

        info!(
            n_samples,
            n_features,
            max_samples,
            n_estimators = self.config.n_estimators,
            "Fitting rule ensembles"
        );

        let y_reg = regression_target(&y, sample_weight)?;
        let clf_base = self.base_tree(DecisionTree::new_classifier(), per_split);
        let reg_base = self.base_tree(DecisionTree::new_regressor(), per_split);

        let work = || -> Result<Vec<(Rule, f64, f64)>> {
            let mut clf = BaggingEnsemble::new(clf_base, bagging.clone());
            clf.fit(x, &y, None)?;
            let mut reg = BaggingEnsemble::new(reg_base, bagging.clone());
            reg.fit(x, &y_reg, None)?;

            let estimators: Vec<&BaggedEstimator> =
                clf.estimators().iter().chain(reg.estimators()).collect();

            let per_tree: Vec<Vec<(Rule, f64, f64)>> = estimators
                .par_iter()
                .map(|est| score_tree_rules(est, x, &y, &feature_names))
                .collect();

            self.estimators = estimators.into_iter().cloned().collect();
            Ok(per_tree.into_iter().flatten().collect())
        };

        let candidates = match self.config.n_jobs {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| ScopeError::ThreadPoolError(e.to_string()))?
                .install(work)?,
            None => work()?,
        };

        let n_candidates = candidates.len();
        let mut rules = self.aggregate(candidates);
        sort_by_performance(&mut rules);
        let n_kept = rules.len();
        let rules = deduplicate(rules, x, thres);

        debug!(n_candidates, n_kept, "Rules filtered on out-of-bag performance");
        info!(n_rules = rules.len(), "Rule induction finished");

        self.feature_names = feature_names;
        self.n_features = Some(n_features);
        self.max_samples = max_samples;
        self.rules = rules;
        Ok(self)
    }

    fn base_tree(&self, tree: DecisionTree, max_features: usize) -> DecisionTree {
        let tree = tree
            .with_min_samples_split(self.config.min_samples_split)
            .with_max_features(max_features);
        match self.config.max_depth {
            Some(d) => tree.with_max_depth(d),
            None => tree,
        }
    }

    /// Keep rules meeting both minimums and average repeated rules
    fn aggregate(&self, candidates: Vec<(Rule, f64, f64)>) -> Vec<ScoredRule> {
        let mut rules: Vec<ScoredRule> = Vec::new();
        let mut index: HashMap<Rule, usize> = HashMap::new();

        for (rule, precision, recall) in candidates {
            if precision < self.config.precision_min || recall < self.config.recall_min {
                continue;
            }
            match index.get(&rule) {
                Some(&i) => {
                    let entry = &mut rules[i];
                    entry.n_occurrences += 1;
                    let c = entry.n_occurrences as f64;
                    entry.precision += (precision - entry.precision) / c;
                    entry.recall += (recall - entry.recall) / c;
                }
                None => {
                    index.insert(rule.clone(), rules.len());
                    rules.push(ScoredRule {
                        rule,
                        precision,
                        recall,
                        n_occurrences: 1,
                    });
                }
            }
        }
        rules
    }

    fn check_input(&self, x: &Array2<f64>) -> Result<&[ScoredRule]> {
        let n_features = self.n_features.ok_or(ScopeError::ModelNotFitted)?;
        if x.ncols() != n_features {
            return Err(ScopeError::ShapeError {
                expected: format!("{} features, as at fit time", n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let m = self.config.n_estimators.min(self.rules.len());
        Ok(&self.rules[..m])
    }

    /// Number of selected rules matching each row
    pub fn rules_vote(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let selected = self.check_input(x)?;
        Ok(Array1::from_iter(x.rows().into_iter().map(|row| {
            selected.iter().filter(|r| r.rule.matches(row)).count() as f64
        })))
    }

    /// Sum of the precisions of the selected rules matching each row
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let selected = self.check_input(x)?;
        Ok(Array1::from_iter(x.rows().into_iter().map(|row| {
            selected
                .iter()
                .filter(|r| r.rule.matches(row))
                .map(|r| r.precision)
                .sum::<f64>()
        })))
    }

    /// 1 where at least one selected rule matches, else 0
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .decision_function(x)?
            .mapv(|s| if s > 0.0 { 1.0 } else { 0.0 }))
    }

    /// `m - k` where `k` is the position of the most precise matching rule
    /// among the `m` selected rules, 0 when none matches. Higher scores come
    /// from more precise rules.
    pub fn separate_rule_score(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let selected = self.check_input(x)?;
        let m = selected.len();
        Ok(Array1::from_iter(x.rows().into_iter().map(|row| {
            selected
                .iter()
                .position(|r| r.rule.matches(row))
                .map_or(0.0, |k| (m - k) as f64)
        })))
    }

    /// Kept rules, most precise first
    pub fn rules(&self) -> &[ScoredRule] {
        &self.rules
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Rows drawn per tree
    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    /// Classification trees followed by regression trees
    pub fn estimators(&self) -> &[BaggedEstimator] {
        &self.estimators
    }
}

/// Target of the regression trees. Without weights it is the label itself;
/// with weights `w' = w - min(w)` and positive rate `c` it is
/// `sigmoid(sqrt(w') / (2c) * [y = 1] - sqrt(mean(w')) * [y = 0])`.
fn regression_target(y: &Array1<f64>, sample_weight: Option<&Array1<f64>>) -> Result<Array1<f64>> {
    let Some(w) = sample_weight else {
        return Ok(y.clone());
    };
    if w.len() != y.len() {
        return Err(ScopeError::ShapeError {
            expected: format!("sample_weight length = {}", y.len()),
            actual: format!("sample_weight length = {}", w.len()),
        });
    }
    if w.iter().any(|v| !v.is_finite()) {
        return Err(ScopeError::ValidationError("Sample weights must be finite".to_string()));
    }

    let min = w.iter().copied().fold(f64::INFINITY, f64::min);
    let shifted = w.mapv(|v| v - min);
    let contamination = y.sum() / y.len() as f64;
    let negative_term = shifted.mean().unwrap_or(0.0).sqrt();

    Ok(Array1::from_iter(shifted.iter().zip(y.iter()).map(|(&wi, &yi)| {
        let z = if yi > 0.0 {
            wi.sqrt() * 0.5 / contamination
        } else {
            -negative_term
        };
        1.0 / (1.0 + (-z).exp())
    })))
}

/// Distinct rules of one tree with their out-of-bag (precision, recall)
fn score_tree_rules(
    est: &BaggedEstimator,
    x: &Array2<f64>,
    y: &Array1<f64>,
    names: &[String],
) -> Vec<(Rule, f64, f64)> {
    let n_samples = x.nrows();
    let mut rows = est.out_of_bag(n_samples);
    if rows.is_empty() {
        warn!("No out-of-bag rows; scoring rules in-bag, expect optimistic precision");
        rows = est.samples.clone();
        rows.sort_unstable();
        rows.dedup();
    }

    let mut seen = HashSet::new();
    extract_rules(&est.tree, &est.features, names)
        .into_iter()
        .filter(|rule| seen.insert(rule.clone()))
        .map(|rule| {
            let (precision, recall) = rule_performance(&rule, x, y, &rows);
            (rule, precision, recall)
        })
        .collect()
}

/// Precision and recall of a rule over the given rows. Fewer than two matches
/// or no true positive gives (0, 0).
fn rule_performance(rule: &Rule, x: &Array2<f64>, y: &Array1<f64>, rows: &[usize]) -> (f64, f64) {
    let detected: Vec<usize> = rows
        .iter()
        .copied()
        .filter(|&i| rule.matches(x.row(i)))
        .collect();
    if detected.len() <= 1 {
        return (0.0, 0.0);
    }
    let true_pos = detected.iter().filter(|&&i| y[i] > 0.0).count();
    if true_pos == 0 {
        return (0.0, 0.0);
    }
    let positives = rows.iter().filter(|&&i| y[i] > 0.0).count();
    (
        true_pos as f64 / detected.len() as f64,
        true_pos as f64 / positives as f64,
    )
}

/// Precision then recall, descending; stable for equal scores
fn sort_by_performance(rules: &mut [ScoredRule]) {
    rules.sort_by(|a, b| {
        b.precision
            .partial_cmp(&a.precision)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.recall.partial_cmp(&a.recall).unwrap_or(std::cmp::Ordering::Equal))
    });
}

/// Walk the sorted rules; when rule `i` covers nearly the same training rows
/// as an earlier, still-kept rule `j` (Jaccard above `thres`), drop `j`.
fn deduplicate(rules: Vec<ScoredRule>, x: &Array2<f64>, thres: f64) -> Vec<ScoredRule> {
    let masks: Vec<Vec<bool>> = rules.par_iter().map(|r| r.rule.mask(x)).collect();
    let mut omitted = vec![false; rules.len()];

    for i in 0..rules.len() {
        for j in 0..i {
            if omitted[j] {
                continue;
            }
            let (mut inter, mut union) = (0usize, 0usize);
            for (&a, &b) in masks[i].iter().zip(&masks[j]) {
                inter += (a && b) as usize;
                union += (a || b) as usize;
            }
            if union > 0 && inter as f64 / union as f64 > thres {
                omitted[j] = true;
            }
        }
    }

    rules
        .into_iter()
        .zip(omitted)
        .filter(|(_, omit)| !omit)
        .map(|(r, _)| r)
        .collect()
}
