//! Evaluation metrics for classification models.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use super::pipeline::{Pipeline, PipelineError};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Confusion matrix for a `K`-class classifier.
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }
}

/// Precision/recall statistics for a single class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerClassStats {
    pub class_id: String,
    /// `TP / (TP + FP)`.
    pub precision: f64,
    /// `TP / (TP + FN)`.
    pub recall: f64,
    /// Total number of true examples for the class.
    pub support: u32,
}

/// Held-out performance of a fitted pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub rows: usize,
    /// Fraction of rows predicted correctly, including rows whose label
    /// never appeared in training.
    pub accuracy: f64,
    pub per_class: Vec<PerClassStats>,
    /// Rows whose true label is not one of the pipeline's classes.
    pub unseen_labels: usize,
    #[serde(skip)]
    pub confusion: Option<ConfusionMatrix>,
}

/// Compute per-class precision and recall from a confusion matrix.
pub fn precision_recall_by_class(cm: &ConfusionMatrix, classes: &[String]) -> Vec<PerClassStats> {
    let k = cm.n_classes;
    let mut stats = Vec::with_capacity(k);
    for class_idx in 0..k {
        let tp = cm.get(class_idx, class_idx) as f64;
        let mut fp = 0f64;
        let mut fn_ = 0f64;
        let mut support = 0u32;
        for j in 0..k {
            let v = cm.get(class_idx, j);
            support = support.saturating_add(v);
            if j != class_idx {
                fn_ += v as f64;
            }
        }
        for i in 0..k {
            if i != class_idx {
                fp += cm.get(i, class_idx) as f64;
            }
        }
        let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
        let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
        stats.push(PerClassStats {
            class_id: classes.get(class_idx).cloned().unwrap_or_default(),
            precision,
            recall,
            support,
        });
    }
    stats
}

/// Overall accuracy; `unscored` rows are counted as misses.
pub fn accuracy(cm: &ConfusionMatrix, unscored: usize) -> f64 {
    let mut correct = 0u64;
    let mut total = unscored as u64;
    for truth in 0..cm.n_classes {
        for predicted in 0..cm.n_classes {
            let v = cm.get(truth, predicted) as u64;
            total += v;
            if truth == predicted {
                correct += v;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        (correct as f64) / (total as f64)
    }
}

/// Score `pipeline` against labeled rows it was not trained on.
pub fn evaluate(
    pipeline: &Pipeline,
    features: ArrayView2<'_, f64>,
    labels: &[String],
) -> Result<Evaluation, PipelineError> {
    let classes = pipeline.classes();
    let predictions = pipeline.transform_and_predict_batch(features)?;
    let mut cm = ConfusionMatrix::new(classes.len());
    let mut unseen_labels = 0usize;
    for (truth, predicted) in labels.iter().zip(&predictions) {
        let truth_idx = classes.iter().position(|class| class == truth);
        let predicted_idx = classes.iter().position(|class| class == predicted);
        match (truth_idx, predicted_idx) {
            (Some(t), Some(p)) => cm.add(t, p),
            _ => unseen_labels += 1,
        }
    }
    Ok(Evaluation {
        rows: predictions.len(),
        accuracy: accuracy(&cm, unseen_labels),
        per_class: precision_recall_by_class(&cm, classes),
        unseen_labels,
        confusion: Some(cm),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::pipeline::{PipelineOptions, tests::monster_rows};
    use ndarray::array;

    #[test]
    fn precision_recall_from_counts() {
        let mut cm = ConfusionMatrix::new(2);
        cm.add(0, 0);
        cm.add(0, 0);
        cm.add(0, 1);
        cm.add(1, 1);
        cm.add(5, 0);
        let classes = vec!["fake".to_string(), "real".to_string()];
        let stats = precision_recall_by_class(&cm, &classes);
        assert_eq!(stats[0].class_id, "fake");
        assert_eq!(stats[0].support, 3);
        assert!((stats[0].precision - 1.0).abs() < 1e-12);
        assert!((stats[0].recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((stats[1].precision - 0.5).abs() < 1e-12);
        assert!((accuracy(&cm, 0) - 0.75).abs() < 1e-12);
        assert!((accuracy(&cm, 1) - 0.6).abs() < 1e-12);
        assert_eq!(accuracy(&ConfusionMatrix::new(2), 0), 0.0);
    }

    #[test]
    fn evaluate_counts_unseen_labels_as_misses() {
        let (x, y) = monster_rows();
        let pipeline = Pipeline::fit(x.view(), &y, &PipelineOptions::default()).unwrap();
        let test_x = array![[8.0, 125.0], [5.4, 400.0], [8.2, 115.0]];
        let test_y = vec!["fake".to_string(), "real".to_string(), "ghost".to_string()];
        let eval = evaluate(&pipeline, test_x.view(), &test_y).unwrap();
        assert_eq!(eval.rows, 3);
        assert_eq!(eval.unseen_labels, 1);
        assert!((eval.accuracy - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(eval.confusion.unwrap().counts, vec![1, 0, 0, 1]);
    }
}
