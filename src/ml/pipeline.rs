//! Scaler → classifier composition.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::scaler::{FittedScaler, ScalerError, StandardScaler, ZeroVariancePolicy};
use super::svc::{self, LinearSvcModel, SvcError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("scaler: {0}")]
    Scaler(#[from] ScalerError),
    #[error("classifier: {0}")]
    Classifier(#[from] SvcError),
    #[error("scaler expects {scaler} features but classifier expects {classifier}")]
    Mismatch { scaler: usize, classifier: usize },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOptions {
    pub zero_variance: ZeroVariancePolicy,
    pub svc: svc::TrainOptions,
}

/// A scaler and classifier that were fitted together on the same training rows.
///
/// The only way to predict is through [`Pipeline::transform_and_predict`],
/// which always standardizes first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    scaler: FittedScaler,
    classifier: LinearSvcModel,
}

impl Pipeline {
    /// Fit the scaler on `features`, then the classifier on the scaled rows.
    pub fn fit(
        features: ArrayView2<'_, f64>,
        labels: &[String],
        options: &PipelineOptions,
    ) -> Result<Self, PipelineError> {
        let scaler = StandardScaler::new(options.zero_variance).fit(features)?;
        let scaled = scaler.apply(features)?;
        let classifier = svc::train_linear_svc(scaled.view(), labels, &options.svc)?;
        let pipeline = Self { scaler, classifier };
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Check that both stages agree after deserialization.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.scaler.validate()?;
        self.classifier.validate()?;
        if self.scaler.n_features() != self.classifier.n_features {
            return Err(PipelineError::Mismatch {
                scaler: self.scaler.n_features(),
                classifier: self.classifier.n_features,
            });
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.scaler.n_features()
    }

    pub fn classes(&self) -> &[String] {
        &self.classifier.classes
    }

    pub fn scaler(&self) -> &FittedScaler {
        &self.scaler
    }

    /// Whether the classifier's solver reached its tolerance.
    pub fn converged(&self) -> bool {
        self.classifier.converged
    }

    pub fn transform_and_predict(&self, raw: &[f64]) -> Result<&str, PipelineError> {
        let scaled = self.scaler.apply_row(raw)?;
        Ok(self.classifier.predict(&scaled)?)
    }

    pub fn transform_and_predict_batch(
        &self,
        raw: ArrayView2<'_, f64>,
    ) -> Result<Vec<String>, PipelineError> {
        let scaled = self.scaler.apply(raw)?;
        scaled
            .rows()
            .into_iter()
            .map(|row| {
                let row = row.to_vec();
                Ok(self.classifier.predict(&row)?.to_string())
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn from_parts(scaler: FittedScaler, classifier: LinearSvcModel) -> Self {
        Self { scaler, classifier }
    }
}
