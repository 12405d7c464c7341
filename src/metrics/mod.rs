//! Evaluation metrics
//!
//! - Ranking metrics over continuous scores (ROC, precision-recall, AUC)
//! - Thresholded classification metrics

pub mod ranking;

pub use ranking::{
    auc, pr_auc_score, precision_recall_curve, roc_auc_score, roc_curve, PrecisionRecallCurve,
    RocCurve,
};

use crate::error::{Result, ScopeError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Metrics for a binary scoring of held-out rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Accuracy at the threshold
    pub accuracy: f64,
    /// Precision at the threshold
    pub precision: f64,
    /// Recall at the threshold
    pub recall: f64,
    /// F1 score at the threshold
    pub f1_score: f64,
    /// AUC-ROC (None when only one class is present)
    pub auc_roc: Option<f64>,
    /// Area under the precision-recall curve (None without positives)
    pub pr_auc: Option<f64>,
    /// Score at or above which a row is predicted positive
    pub threshold: f64,
    /// Number of scored rows
    pub n_samples: usize,
    /// Number of positive rows
    pub n_positive: usize,
}

impl ClassificationMetrics {
    /// Compute metrics for `scores` against binary labels (positive when `> 0`)
    pub fn compute(y_true: &Array1<f64>, scores: &Array1<f64>, threshold: f64) -> Result<Self> {
        if y_true.len() != scores.len() {
            return Err(ScopeError::ShapeError {
                expected: format!("scores length = {}", y_true.len()),
                actual: format!("scores length = {}", scores.len()),
            });
        }
        if y_true.is_empty() {
            return Err(ScopeError::ValidationError("Cannot evaluate an empty sample".to_string()));
        }

        let y_pred = scores.mapv(|s| if s >= threshold { 1.0 } else { 0.0 });
        let (tp, fp, tn, fn_) = confusion_counts(y_true, &y_pred);

        let accuracy = (tp + tn) as f64 / y_true.len() as f64;
        let precision = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
        let recall = if tp + fn_ > 0 { tp as f64 / (tp + fn_) as f64 } else { 0.0 };
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self {
            accuracy,
            precision,
            recall,
            f1_score,
            auc_roc: roc_auc_score(y_true, scores).ok(),
            pr_auc: pr_auc_score(y_true, scores).ok(),
            threshold,
            n_samples: y_true.len(),
            n_positive: tp + fn_,
        })
    }
}

/// Full ROC and precision-recall curves of a score, for plotting or comparing
/// rankers. Curves are `None` when the labels do not define them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingCurves {
    pub roc: Option<RocCurve>,
    pub pr: Option<PrecisionRecallCurve>,
    pub roc_auc: Option<f64>,
    pub pr_auc: Option<f64>,
}

impl RankingCurves {
    pub fn compute(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<Self> {
        if y_true.len() != scores.len() {
            return Err(ScopeError::ShapeError {
                expected: format!("scores length = {}", y_true.len()),
                actual: format!("scores length = {}", scores.len()),
            });
        }
        let roc = roc_curve(y_true, scores).ok();
        let pr = precision_recall_curve(y_true, scores).ok();
        let roc_auc = match &roc {
            Some(c) => Some(auc(&c.fpr, &c.tpr)?),
            None => None,
        };
        let pr_auc = match &pr {
            Some(c) => Some(auc(&c.recall, &c.precision)?),
            None => None,
        };
        Ok(Self { roc, pr, roc_auc, pr_auc })
    }
}

/// (tp, fp, tn, fn) of binary predictions
fn confusion_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (usize, usize, usize, usize) {
    let mut tp = 0;
    let mut fp = 0;
    let mut tn = 0;
    let mut fn_ = 0;

    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        match (*t > 0.0, *p > 0.0) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (false, false) => tn += 1,
            (true, false) => fn_ += 1,
        }
    }

    (tp, fp, tn, fn_)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classification_metrics() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let scores = array![0.9, 0.2, 0.8, 0.4, 0.1, 0.7, 0.6, 0.3];

        let metrics = ClassificationMetrics::compute(&y_true, &scores, 0.5).unwrap();

        // tp 3, fp 1, tn 3, fn 1
        assert!((metrics.accuracy - 0.75).abs() < 1e-12);
        assert!((metrics.precision - 0.75).abs() < 1e-12);
        assert!((metrics.recall - 0.75).abs() < 1e-12);
        assert!((metrics.f1_score - 0.75).abs() < 1e-12);
        assert_eq!(metrics.n_positive, 4);
        assert!(metrics.auc_roc.unwrap() > 0.8);
        assert!(metrics.pr_auc.is_some());
    }

    #[test]
    fn test_single_class_has_no_auc() {
        let metrics =
            ClassificationMetrics::compute(&array![0.0, 0.0], &array![0.3, 0.7], 0.5).unwrap();
        assert!(metrics.auc_roc.is_none());
        assert!(metrics.pr_auc.is_none());
        assert_eq!(metrics.precision, 0.0);
        assert!((metrics.accuracy - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_ranking_curves() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let curves = RankingCurves::compute(&y, &array![0.1, 0.4, 0.35, 0.8]).unwrap();
        assert!((curves.roc_auc.unwrap() - 0.75).abs() < 1e-12);
        assert_eq!(curves.roc.as_ref().unwrap().fpr.len(), 5);
        assert_eq!(curves.pr.as_ref().unwrap().recall.last(), Some(&0.0));

        let single = RankingCurves::compute(&array![0.0, 0.0], &array![0.2, 0.4]).unwrap();
        assert!(single.roc.is_none() && single.pr.is_none());
        assert!(single.roc_auc.is_none());
    }

    #[test]
    fn test_length_mismatch() {
        assert!(ClassificationMetrics::compute(&array![0.0], &array![0.3, 0.7], 0.5).is_err());
    }
}
