use serde::{Deserialize, Serialize};

/// Held-out evaluation recorded with a trained model. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    #[serde(default)]
    pub brier: f64,
    #[serde(default)]
    pub log_loss: f64,
    pub train_samples: usize,
    pub test_samples: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ClassCounts {
    tp: usize,
    fp: usize,
    fn_: usize,
    support: usize,
}

fn class_counts(y_pred: &[usize], y_true: &[usize], n_classes: usize) -> Vec<ClassCounts> {
    let mut counts = vec![ClassCounts::default(); n_classes];
    for (&p, &t) in y_pred.iter().zip(y_true) {
        if t < n_classes {
            counts[t].support += 1;
        }
        if p == t {
            if t < n_classes {
                counts[t].tp += 1;
            }
        } else {
            if p < n_classes {
                counts[p].fp += 1;
            }
            if t < n_classes {
                counts[t].fn_ += 1;
            }
        }
    }
    counts
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

pub fn accuracy(y_pred: &[usize], y_true: &[usize]) -> f64 {
    if y_true.is_empty() || y_pred.len() != y_true.len() {
        return 0.0;
    }
    let correct = y_pred.iter().zip(y_true).filter(|(p, t)| p == t).count();
    correct as f64 / y_true.len() as f64
}

/// Support-weighted precision, recall and F1 over `n_classes`; a class with no
/// predictions contributes 0 precision.
pub fn weighted_precision_recall_f1(
    y_pred: &[usize],
    y_true: &[usize],
    n_classes: usize,
) -> (f64, f64, f64) {
    if y_true.is_empty() || y_pred.len() != y_true.len() {
        return (0.0, 0.0, 0.0);
    }
    let counts = class_counts(y_pred, y_true, n_classes);
    let total: usize = counts.iter().map(|c| c.support).sum();
    if total == 0 {
        return (0.0, 0.0, 0.0);
    }

    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;
    for c in &counts {
        let w = c.support as f64 / total as f64;
        let p = ratio(c.tp, c.tp + c.fp);
        let r = ratio(c.tp, c.tp + c.fn_);
        let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
        precision += w * p;
        recall += w * r;
        f1 += w * f;
    }
    (precision, recall, f1)
}

/// Mean multi-class Brier score and log loss of probability rows against true labels.
pub fn brier_and_log_loss(probs: &[Vec<f64>], y_true: &[usize]) -> (f64, f64) {
    if probs.is_empty() || probs.len() != y_true.len() {
        return (0.0, 0.0);
    }
    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    for (p, &t) in probs.iter().zip(y_true) {
        for (k, pk) in p.iter().enumerate() {
            let y = if k == t { 1.0 } else { 0.0 };
            brier_sum += (pk - y).powi(2);
        }
        let actual = p.get(t).copied().unwrap_or(0.0).clamp(1e-12, 1.0);
        log_loss_sum += -actual.ln();
    }
    let n = probs.len() as f64;
    (brier_sum / n, log_loss_sum / n)
}

/// Index of the largest probability; ties go to the lowest index.
pub fn argmax(p: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in p.iter().enumerate() {
        if *v > p[best] {
            best = i;
        }
    }
    best
}
