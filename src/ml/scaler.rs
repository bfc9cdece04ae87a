//! Per-feature standardization fitted on training rows only.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Relative tolerance below which a column's standard deviation counts as zero.
const ZERO_VARIANCE_EPS: f64 = 10.0 * f64::EPSILON;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScalerError {
    #[error("cannot fit a scaler on zero rows")]
    Empty,
    #[error("feature column {column} has zero variance")]
    DegenerateFeature { column: usize },
    #[error("feature column {column} contains non-finite values")]
    NonFinite { column: usize },
    #[error("expected {expected} feature values, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },
}

/// What to do with a feature whose training standard deviation is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariancePolicy {
    /// Fail the fit with [`ScalerError::DegenerateFeature`].
    Reject,
    /// Keep the column, centering it but dividing by `1.0`.
    #[default]
    UnitScale,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardScaler {
    pub zero_variance: ZeroVariancePolicy,
}

/// Fitted `(mean, scale)` pairs, one per feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
    /// Columns that were fitted with zero variance and use unit scale.
    #[serde(default)]
    degenerate: Vec<usize>,
}

impl StandardScaler {
    pub fn new(zero_variance: ZeroVariancePolicy) -> Self {
        Self { zero_variance }
    }

    /// Compute population mean and standard deviation per column.
    pub fn fit(&self, features: ArrayView2<'_, f64>) -> Result<FittedScaler, ScalerError> {
        if features.nrows() == 0 {
            return Err(ScalerError::Empty);
        }
        for (column, values) in features.axis_iter(Axis(1)).enumerate() {
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ScalerError::NonFinite { column });
            }
        }
        let mean = features.mean_axis(Axis(0)).ok_or(ScalerError::Empty)?;
        let std_dev = features.std_axis(Axis(0), 0.0);

        let mut scale = Vec::with_capacity(std_dev.len());
        let mut degenerate = Vec::new();
        for (column, (&sd, &mu)) in std_dev.iter().zip(mean.iter()).enumerate() {
            if sd <= ZERO_VARIANCE_EPS * mu.abs().max(1.0) {
                match self.zero_variance {
                    ZeroVariancePolicy::Reject => {
                        return Err(ScalerError::DegenerateFeature { column });
                    }
                    ZeroVariancePolicy::UnitScale => {
                        tracing::warn!(column, "Zero-variance feature; using unit scale");
                        degenerate.push(column);
                        scale.push(1.0);
                    }
                }
            } else {
                scale.push(sd);
            }
        }
        Ok(FittedScaler {
            mean: mean.to_vec(),
            scale,
            degenerate,
        })
    }
}

impl FittedScaler {
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn degenerate_columns(&self) -> &[usize] {
        &self.degenerate
    }

    /// Check internal consistency after deserialization.
    pub fn validate(&self) -> Result<(), ScalerError> {
        if self.scale.len() != self.mean.len() {
            return Err(ScalerError::WidthMismatch {
                expected: self.mean.len(),
                actual: self.scale.len(),
            });
        }
        for (column, (&mu, &sd)) in self.mean.iter().zip(&self.scale).enumerate() {
            if !mu.is_finite() || !sd.is_finite() || sd <= 0.0 {
                return Err(ScalerError::NonFinite { column });
            }
        }
        Ok(())
    }

    /// Standardize one row: `(x - mean) / scale`.
    pub fn apply_row(&self, row: &[f64]) -> Result<Vec<f64>, ScalerError> {
        if row.len() != self.mean.len() {
            return Err(ScalerError::WidthMismatch {
                expected: self.mean.len(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mu, sd))| (x - mu) / sd)
            .collect())
    }

    /// Standardize every row of a feature table.
    pub fn apply(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>, ScalerError> {
        if features.ncols() != self.mean.len() {
            return Err(ScalerError::WidthMismatch {
                expected: self.mean.len(),
                actual: features.ncols(),
            });
        }
        let mut out = features.to_owned();
        for mut row in out.rows_mut() {
            for ((value, mu), sd) in row.iter_mut().zip(&self.mean).zip(&self.scale) {
                *value = (*value - mu) / sd;
            }
        }
        Ok(out)
    }
}
