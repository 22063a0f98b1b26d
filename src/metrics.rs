//! Binary classification metrics.

use crate::error::{ChurnError, Result};
use serde::{Deserialize, Serialize};

/// Counts of a binary confusion matrix (positive class = 1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrix {
    /// Tally predictions against ground truth.
    ///
    /// # Errors
    /// Returns [`ChurnError::InvalidParameter`] if the slices differ in length.
    pub fn from_labels(y_true: &[u8], y_pred: &[u8]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(ChurnError::InvalidParameter(format!(
                "{} labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        let mut cm = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t == 1, p == 1) {
                (true, true) => cm.true_positives += 1,
                (false, true) => cm.false_positives += 1,
                (false, false) => cm.true_negatives += 1,
                (true, false) => cm.false_negatives += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }
}

/// Summary metrics of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion: ConfusionMatrix,
}

impl ClassificationReport {
    pub fn from_labels(y_true: &[u8], y_pred: &[u8]) -> Result<Self> {
        Ok(Self::from_confusion(ConfusionMatrix::from_labels(y_true, y_pred)?))
    }

    pub fn from_confusion(confusion: ConfusionMatrix) -> Self {
        let precision = Metrics::precision(&confusion);
        let recall = Metrics::recall(&confusion);
        Self {
            accuracy: Metrics::accuracy(&confusion),
            precision,
            recall,
            f1: Metrics::f1(precision, recall),
            confusion,
        }
    }
}

/// Metric formulas. Undefined ratios (zero denominators) are reported as 0.
pub struct Metrics;

impl Metrics {
    /// (TP + TN) / total
    pub fn accuracy(cm: &ConfusionMatrix) -> f64 {
        ratio(cm.true_positives + cm.true_negatives, cm.total())
    }

    /// TP / (TP + FP)
    pub fn precision(cm: &ConfusionMatrix) -> f64 {
        ratio(cm.true_positives, cm.true_positives + cm.false_positives)
    }

    /// TP / (TP + FN)
    pub fn recall(cm: &ConfusionMatrix) -> f64 {
        ratio(cm.true_positives, cm.true_positives + cm.false_negatives)
    }

    /// Harmonic mean of precision and recall.
    pub fn f1(precision: f64, recall: f64) -> f64 {
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
