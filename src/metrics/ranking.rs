//! Ranking metrics over continuous scores: ROC and precision-recall curves

use crate::error::{Result, ScopeError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Receiver operating characteristic curve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocCurve {
    /// False positive rate at each threshold
    pub fpr: Vec<f64>,
    /// True positive rate at each threshold
    pub tpr: Vec<f64>,
    /// Decreasing score thresholds; the first is `+inf`
    pub thresholds: Vec<f64>,
}

/// Precision-recall curve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecisionRecallCurve {
    /// Precision, ending with 1
    pub precision: Vec<f64>,
    /// Recall (decreasing), ending with 0
    pub recall: Vec<f64>,
    /// Increasing score thresholds, one fewer than the points
    pub thresholds: Vec<f64>,
}

/// Cumulative true/false positive counts at each distinct score, highest
/// score first
struct BinaryCounts {
    fps: Vec<f64>,
    tps: Vec<f64>,
    thresholds: Vec<f64>,
}

fn binary_counts(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<BinaryCounts> {
    if y_true.len() != scores.len() {
        return Err(ScopeError::ShapeError {
            expected: format!("scores length = {}", y_true.len()),
            actual: format!("scores length = {}", scores.len()),
        });
    }
    if y_true.is_empty() {
        return Err(ScopeError::ValidationError("Cannot rank an empty sample".to_string()));
    }
    if scores.iter().any(|s| s.is_nan()) {
        return Err(ScopeError::ValidationError("Scores contain NaN".to_string()));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));

    let mut counts = BinaryCounts {
        fps: Vec::new(),
        tps: Vec::new(),
        thresholds: Vec::new(),
    };
    let (mut tp, mut fp) = (0.0, 0.0);
    for (pos, &i) in order.iter().enumerate() {
        if y_true[i] > 0.0 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_value = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_value {
            counts.tps.push(tp);
            counts.fps.push(fp);
            counts.thresholds.push(scores[i]);
        }
    }
    Ok(counts)
}

/// ROC curve of `scores` against binary labels (positive when `> 0`)
pub fn roc_curve(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<RocCurve> {
    let counts = binary_counts(y_true, scores)?;
    let total_pos = counts.tps.last().copied().unwrap_or(0.0);
    let total_neg = counts.fps.last().copied().unwrap_or(0.0);
    if total_pos == 0.0 || total_neg == 0.0 {
        return Err(ScopeError::ValidationError(
            "Only one class present in y_true; the ROC curve is not defined".to_string(),
        ));
    }

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    for ((fp, tp), t) in counts.fps.iter().zip(&counts.tps).zip(&counts.thresholds) {
        curve.fpr.push(fp / total_neg);
        curve.tpr.push(tp / total_pos);
        curve.thresholds.push(*t);
    }
    Ok(curve)
}

/// Precision-recall pairs for every distinct threshold down to the first one
/// reaching full recall
pub fn precision_recall_curve(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<PrecisionRecallCurve> {
    let counts = binary_counts(y_true, scores)?;
    let total_pos = counts.tps.last().copied().unwrap_or(0.0);
    if total_pos == 0.0 {
        return Err(ScopeError::ValidationError(
            "No positive sample in y_true; recall is not defined".to_string(),
        ));
    }

    // Lower thresholds add no recall
    let last = counts
        .tps
        .iter()
        .position(|&tp| tp == total_pos)
        .unwrap_or(counts.tps.len() - 1);
    let mut curve = PrecisionRecallCurve {
        precision: Vec::with_capacity(last + 2),
        recall: Vec::with_capacity(last + 2),
        thresholds: Vec::with_capacity(last + 1),
    };
    // Lowest threshold first so recall decreases along the curve
    for k in (0..=last).rev() {
        let (tp, fp) = (counts.tps[k], counts.fps[k]);
        let predicted = tp + fp;
        curve.precision.push(if predicted > 0.0 { tp / predicted } else { 0.0 });
        curve.recall.push(tp / total_pos);
        curve.thresholds.push(counts.thresholds[k]);
    }
    curve.precision.push(1.0);
    curve.recall.push(0.0);
    Ok(curve)
}

/// Area under a curve by the trapezoidal rule. `x` must be monotonic,
/// increasing or decreasing.
pub fn auc(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(ScopeError::ShapeError {
            expected: format!("y length = {}", x.len()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.len() < 2 {
        return Err(ScopeError::ValidationError(format!(
            "At least 2 points are needed to compute an area, got {}",
            x.len()
        )));
    }

    let dx: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let direction = if dx.iter().all(|&d| d >= 0.0) {
        1.0
    } else if dx.iter().all(|&d| d <= 0.0) {
        -1.0
    } else {
        return Err(ScopeError::ComputationError(
            "x is neither increasing nor decreasing".to_string(),
        ));
    };

    let area: f64 = dx
        .iter()
        .zip(y.windows(2))
        .map(|(d, w)| d * (w[0] + w[1]) / 2.0)
        .sum();
    Ok(direction * area)
}

/// Area under the ROC curve
pub fn roc_auc_score(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    let curve = roc_curve(y_true, scores)?;
    auc(&curve.fpr, &curve.tpr)
}

/// Area under the precision-recall curve
pub fn pr_auc_score(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    let curve = precision_recall_curve(y_true, scores)?;
    auc(&curve.recall, &curve.precision)
}
