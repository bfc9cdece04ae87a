//! Served model: a fitted pipeline plus its name, input prototype and metadata.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::ml::{Pipeline, PipelineError};

pub mod prototype;

pub use prototype::{FeatureSpec, FeatureType, InputPrototype, RawRow, SchemaError, parse_request};

/// On-disk layout version of [`ModelWrapper`] JSON.
pub const WRAPPER_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum WrapperError {
    #[error("model name must not be empty")]
    EmptyName,
    #[error("prototype declares {prototype} features but the pipeline expects {pipeline}")]
    WidthMismatch { prototype: usize, pipeline: usize },
    #[error("invalid pipeline: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("invalid prototype: {0}")]
    Prototype(#[from] SchemaError),
    #[error("unsupported wrapper format version {0}")]
    FormatVersion(u32),
    #[error("fingerprint mismatch: stored {stored}, computed {computed}")]
    FingerprintMismatch { stored: String, computed: String },
    #[error("failed to serialize model: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to format timestamp: {0}")]
    Time(#[from] time::error::Format),
}

/// Failure of a prediction request.
#[derive(Debug, Error)]
pub enum PredictError {
    /// The caller sent rows that do not match the prototype.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The rows were valid but the model could not score them.
    #[error("model failed to score request: {0}")]
    Internal(#[from] PipelineError),
}

/// How the wrapped pipeline was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub dataset: String,
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub test_fraction: f64,
    pub seed: u64,
    pub converged: bool,
    #[serde(default)]
    pub test_accuracy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// RFC 3339 UTC timestamp of wrapper creation.
    pub created_at: String,
    /// BLAKE3 hex digest of the serialized pipeline.
    pub fingerprint: String,
    #[serde(default)]
    pub training: Option<TrainingSummary>,
}

/// Read-only view served on `/metadata`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescription {
    pub name: String,
    pub format_version: u32,
    pub version: Option<String>,
    pub fingerprint: String,
    pub created_at: String,
    pub feature_names: Vec<String>,
    pub classes: Vec<String>,
    pub training: Option<TrainingSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWrapper {
    format_version: u32,
    name: String,
    prototype: InputPrototype,
    pipeline: Pipeline,
    metadata: ModelMetadata,
    /// Registry version this wrapper was loaded from, if any.
    #[serde(skip)]
    version: Option<String>,
}

impl ModelWrapper {
    pub fn new(
        name: impl Into<String>,
        pipeline: Pipeline,
        prototype: InputPrototype,
    ) -> Result<Self, WrapperError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(WrapperError::EmptyName);
        }
        check_parts(&pipeline, &prototype)?;
        let fingerprint = fingerprint(&pipeline)?;
        let created_at = OffsetDateTime::now_utc().format(&Rfc3339)?;
        Ok(Self {
            format_version: WRAPPER_FORMAT_VERSION,
            name,
            prototype,
            pipeline,
            metadata: ModelMetadata {
                created_at,
                fingerprint,
                training: None,
            },
            version: None,
        })
    }

    pub fn with_training(mut self, training: TrainingSummary) -> Self {
        self.metadata.training = Some(training);
        self
    }

    pub(crate) fn with_version(mut self, version: String) -> Self {
        self.version = Some(version);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn prototype(&self) -> &InputPrototype {
        &self.prototype
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn fingerprint(&self) -> &str {
        &self.metadata.fingerprint
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn description(&self) -> ModelDescription {
        ModelDescription {
            name: self.name.clone(),
            format_version: self.format_version,
            version: self.version.clone(),
            fingerprint: self.metadata.fingerprint.clone(),
            created_at: self.metadata.created_at.clone(),
            feature_names: self.prototype.feature_names(),
            classes: self.pipeline.classes().to_vec(),
            training: self.metadata.training.clone(),
        }
    }

    pub fn validate_request(&self, raw_row: &RawRow) -> Result<Vec<f64>, SchemaError> {
        self.prototype.validate(raw_row)
    }

    /// Validate every row, then score them together.
    ///
    /// A schema violation in any row rejects the whole request.
    pub fn predict(&self, raw_rows: &[RawRow]) -> Result<Vec<String>, PredictError> {
        if raw_rows.is_empty() {
            return Err(SchemaError::Empty.into());
        }
        let width = self.prototype.width();
        let mut data = Vec::with_capacity(raw_rows.len() * width);
        for (row, raw) in raw_rows.iter().enumerate() {
            let values = self.validate_request(raw).map_err(|source| {
                if raw_rows.len() == 1 {
                    source
                } else {
                    SchemaError::InRow {
                        row,
                        source: Box::new(source),
                    }
                }
            })?;
            data.extend(values);
        }
        let features = Array2::from_shape_vec((raw_rows.len(), width), data).map_err(|_| {
            SchemaError::ColumnCount {
                expected: width,
                actual: 0,
            }
        })?;
        Ok(self.pipeline.transform_and_predict_batch(features.view())?)
    }

    pub fn to_json_pretty(&self) -> Result<String, WrapperError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and re-check a stored wrapper, including its fingerprint.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, WrapperError> {
        let wrapper: ModelWrapper = serde_json::from_slice(bytes)?;
        if wrapper.format_version != WRAPPER_FORMAT_VERSION {
            return Err(WrapperError::FormatVersion(wrapper.format_version));
        }
        if wrapper.name.trim().is_empty() {
            return Err(WrapperError::EmptyName);
        }
        wrapper.prototype.check_integrity()?;
        check_parts(&wrapper.pipeline, &wrapper.prototype)?;
        let computed = fingerprint(&wrapper.pipeline)?;
        if computed != wrapper.metadata.fingerprint {
            return Err(WrapperError::FingerprintMismatch {
                stored: wrapper.metadata.fingerprint.clone(),
                computed,
            });
        }
        Ok(wrapper)
    }
}

fn check_parts(pipeline: &Pipeline, prototype: &InputPrototype) -> Result<(), WrapperError> {
    pipeline.validate()?;
    if prototype.width() != pipeline.n_features() {
        return Err(WrapperError::WidthMismatch {
            prototype: prototype.width(),
            pipeline: pipeline.n_features(),
        });
    }
    Ok(())
}

/// BLAKE3 digest of the pipeline's JSON form.
pub fn fingerprint(pipeline: &Pipeline) -> Result<String, WrapperError> {
    let bytes = serde_json::to_vec(pipeline)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
