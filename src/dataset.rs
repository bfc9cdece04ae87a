//! In-memory labeled datasets and the helpers that load and partition them.

use std::collections::BTreeSet;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use thiserror::Error;

pub mod loader;
pub mod split;

pub use loader::{ColumnSelector, DatasetLoadError, DatasetSpec, load_dataset};
pub use split::{Split, SplitError, train_test_split};

/// Shape violations detected while assembling a [`Dataset`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatasetError {
    #[error("dataset needs at least one feature column")]
    NoFeatures,
    #[error("{names} feature names for {columns} feature columns")]
    NameCountMismatch { names: usize, columns: usize },
    #[error("{rows} feature rows but {labels} labels")]
    LabelCountMismatch { rows: usize, labels: usize },
    #[error("feature values do not fill a {rows}x{columns} table")]
    Shape { rows: usize, columns: usize },
    #[error("row {row} has {actual} feature values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Feature table plus aligned label column.
///
/// Every row carries exactly `n_features()` values and one label.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    feature_names: Vec<String>,
    features: Array2<f64>,
    labels: Vec<String>,
}

/// Borrowed view of a single observation.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub features: ArrayView1<'a, f64>,
    pub label: &'a str,
}

impl Dataset {
    pub fn new(
        feature_names: Vec<String>,
        features: Array2<f64>,
        labels: Vec<String>,
    ) -> Result<Self, DatasetError> {
        if features.ncols() == 0 {
            return Err(DatasetError::NoFeatures);
        }
        if feature_names.len() != features.ncols() {
            return Err(DatasetError::NameCountMismatch {
                names: feature_names.len(),
                columns: features.ncols(),
            });
        }
        if features.nrows() != labels.len() {
            return Err(DatasetError::LabelCountMismatch {
                rows: features.nrows(),
                labels: labels.len(),
            });
        }
        Ok(Self {
            feature_names,
            features,
            labels,
        })
    }

    /// Build a dataset from row-major records, naming features `x0..xN`.
    pub fn from_rows(rows: &[(Vec<f64>, String)]) -> Result<Self, DatasetError> {
        let width = rows.first().map(|(values, _)| values.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * width);
        let mut labels = Vec::with_capacity(rows.len());
        for (row, (values, label)) in rows.iter().enumerate() {
            if values.len() != width {
                return Err(DatasetError::RaggedRow {
                    row,
                    expected: width,
                    actual: values.len(),
                });
            }
            data.extend_from_slice(values);
            labels.push(label.clone());
        }
        let names = (0..width).map(|idx| format!("x{idx}")).collect();
        let features =
            Array2::from_shape_vec((rows.len(), width), data).map_err(|_| DatasetError::Shape {
                rows: rows.len(),
                columns: width,
            })?;
        Self::new(names, features, labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        let label = self.labels.get(index)?;
        Some(Row {
            features: self.features.index_axis(Axis(0), index),
            label,
        })
    }

    /// Distinct labels in sorted order.
    pub fn class_ids(&self) -> Vec<String> {
        self.labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
