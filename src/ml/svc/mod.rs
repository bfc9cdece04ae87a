//! Linear support-vector classifier.
//!
//! Binary problems use a single separator whose positive side is the second
//! class in sorted order. Three or more classes use one-vs-rest separators and
//! pick the class with the largest decision value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod train;
pub use train::{TrainOptions, train_linear_svc};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SvcError {
    #[error("cannot train on zero rows")]
    EmptyDataset,
    #[error("training labels contain fewer than two classes ({0:?})")]
    SingleClass(Vec<String>),
    #[error("{rows} feature rows but {labels} labels")]
    LabelCountMismatch { rows: usize, labels: usize },
    #[error("expected {expected} feature values, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },
    #[error("invalid training option: {0}")]
    InvalidOption(&'static str),
    #[error("decision value is not finite")]
    NonFiniteDecision,
    #[error("invalid model: {0}")]
    InvalidModel(String),
}

/// Fitted separator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSvcModel {
    pub model_version: i64,
    pub n_features: usize,
    pub classes: Vec<String>,
    /// Row-major `separators x n_features` weights.
    pub weights: Vec<f64>,
    pub intercepts: Vec<f64>,
    /// Coordinate-descent passes used by the slowest separator.
    #[serde(default)]
    pub iterations: usize,
    #[serde(default)]
    pub converged: bool,
}

/// Number of separators needed for `n_classes` classes.
pub fn separator_count(n_classes: usize) -> usize {
    if n_classes == 2 { 1 } else { n_classes }
}

impl LinearSvcModel {
    pub fn separators(&self) -> usize {
        self.intercepts.len()
    }

    pub fn validate(&self) -> Result<(), SvcError> {
        let classes = self.classes.len();
        if classes < 2 {
            return Err(SvcError::SingleClass(self.classes.clone()));
        }
        if self.n_features == 0 {
            return Err(SvcError::InvalidModel("n_features must be > 0".into()));
        }
        let separators = separator_count(classes);
        if self.intercepts.len() != separators {
            return Err(SvcError::InvalidModel("intercepts length mismatch".into()));
        }
        if self.weights.len() != separators * self.n_features {
            return Err(SvcError::InvalidModel("weights length mismatch".into()));
        }
        if self
            .weights
            .iter()
            .chain(&self.intercepts)
            .any(|value| !value.is_finite())
        {
            return Err(SvcError::InvalidModel("non-finite parameter".into()));
        }
        Ok(())
    }

    /// Signed distance-like score per separator for an already scaled row.
    pub fn decision_function(&self, row: &[f64]) -> Result<Vec<f64>, SvcError> {
        if row.len() != self.n_features {
            return Err(SvcError::WidthMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        let scores: Vec<f64> = self
            .weights
            .chunks(self.n_features)
            .zip(&self.intercepts)
            .map(|(w, b)| b + w.iter().zip(row).map(|(wi, xi)| wi * xi).sum::<f64>())
            .collect();
        if scores.iter().any(|score| !score.is_finite()) {
            return Err(SvcError::NonFiniteDecision);
        }
        Ok(scores)
    }

    pub fn predict_class_index(&self, row: &[f64]) -> Result<usize, SvcError> {
        let scores = self.decision_function(row)?;
        if scores.len() == 1 {
            return Ok(usize::from(scores[0] > 0.0));
        }
        let mut best = 0usize;
        let mut best_val = f64::NEG_INFINITY;
        for (idx, &score) in scores.iter().enumerate() {
            if score > best_val {
                best_val = score;
                best = idx;
            }
        }
        Ok(best)
    }

    pub fn predict(&self, row: &[f64]) -> Result<&str, SvcError> {
        let index = self.predict_class_index(row)?;
        Ok(&self.classes[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_model() -> LinearSvcModel {
        LinearSvcModel {
            model_version: 1,
            n_features: 2,
            classes: vec!["fake".into(), "real".into()],
            weights: vec![1.0, -1.0],
            intercepts: vec![0.5],
            iterations: 1,
            converged: true,
        }
    }

    #[test]
    fn binary_decision_picks_positive_side() {
        let model = binary_model();
        model.validate().unwrap();
        assert_eq!(model.decision_function(&[2.0, 1.0]).unwrap(), vec![1.5]);
        assert_eq!(model.predict(&[2.0, 1.0]).unwrap(), "real");
        assert_eq!(model.predict(&[0.0, 1.0]).unwrap(), "fake");
    }

    #[test]
    fn one_vs_rest_uses_argmax() {
        let model = LinearSvcModel {
            model_version: 1,
            n_features: 1,
            classes: vec!["a".into(), "b".into(), "c".into()],
            weights: vec![-1.0, 0.0, 1.0],
            intercepts: vec![0.0, 0.5, 0.0],
            iterations: 1,
            converged: true,
        };
        model.validate().unwrap();
        assert_eq!(model.predict(&[-3.0]).unwrap(), "a");
        assert_eq!(model.predict(&[0.1]).unwrap(), "b");
        assert_eq!(model.predict(&[3.0]).unwrap(), "c");
    }

    #[test]
    fn validate_catches_shape_errors() {
        let mut model = binary_model();
        model.weights.push(0.0);
        assert!(matches!(model.validate(), Err(SvcError::InvalidModel(_))));
        let mut model = binary_model();
        model.classes.truncate(1);
        assert!(matches!(model.validate(), Err(SvcError::SingleClass(_))));
    }

    #[test]
    fn overflowing_decision_is_reported() {
        let mut model = binary_model();
        model.weights = vec![f64::MAX, f64::MAX];
        assert_eq!(
            model.decision_function(&[1.0, 1.0]).unwrap_err(),
            SvcError::NonFiniteDecision
        );
        assert!(matches!(
            model.predict(&[1.0]),
            Err(SvcError::WidthMismatch { expected: 2, actual: 1 })
        ));
    }
}
