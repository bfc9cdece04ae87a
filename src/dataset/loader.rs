//! Dataset loader for Arrow IPC (Feather v2) and CSV files.

use std::fs::File;
use std::io::Seek;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::csv::reader::{Format, ReaderBuilder};
use arrow::datatypes::{DataType, Float64Type, SchemaRef};
use arrow::error::ArrowError;
use arrow::ipc::reader::FileReader;
use arrow::record_batch::RecordBatch;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Dataset, DatasetError};

#[derive(Debug, Error)]
pub enum DatasetLoadError {
    #[error("failed to open dataset {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("arrow error reading {path}: {source}")]
    Arrow { path: PathBuf, source: ArrowError },
    #[error("unsupported dataset format for {0} (expected .arrow, .feather, .ipc or .csv)")]
    UnsupportedFormat(PathBuf),
    #[error("column `{0}` not found")]
    ColumnNotFound(String),
    #[error("column index {index} out of range ({columns} columns)")]
    ColumnOutOfRange { index: usize, columns: usize },
    #[error("feature column `{column}` is not numeric ({data_type})")]
    NonNumericColumn { column: String, data_type: DataType },
    #[error("label column `{column}` has unsupported type {data_type}")]
    UnsupportedLabelType { column: String, data_type: DataType },
    #[error("null value in column `{column}` at row {row}")]
    NullValue { column: String, row: usize },
    #[error("no feature columns selected")]
    NoFeatureColumns,
    #[error(transparent)]
    Shape(#[from] DatasetError),
}

/// Selects a column by 0-based position or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSelector {
    Index(usize),
    Name(String),
}

impl std::fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnSelector::Index(index) => write!(f, "#{index}"),
            ColumnSelector::Name(name) => f.write_str(name),
        }
    }
}

/// Which columns of a file become features and which one is the label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    pub feature_columns: Vec<ColumnSelector>,
    pub label_column: ColumnSelector,
}

/// Load a labeled dataset from `path`, picking the reader from the file extension.
pub fn load_dataset(path: &Path, spec: &DatasetSpec) -> Result<Dataset, DatasetLoadError> {
    if spec.feature_columns.is_empty() {
        return Err(DatasetLoadError::NoFeatureColumns);
    }
    let (schema, batches) = read_batches(path)?;
    let feature_indices = spec
        .feature_columns
        .iter()
        .map(|selector| resolve_column(&schema, selector))
        .collect::<Result<Vec<_>, _>>()?;
    let label_index = resolve_column(&schema, &spec.label_column)?;

    let feature_names: Vec<String> = feature_indices
        .iter()
        .map(|&idx| schema.field(idx).name().clone())
        .collect();
    let label_name = schema.field(label_index).name().clone();

    let mut columns = vec![Vec::new(); feature_indices.len()];
    let mut labels = Vec::new();
    let mut row_offset = 0usize;
    for batch in &batches {
        for (slot, &idx) in feature_indices.iter().enumerate() {
            append_numeric(
                &mut columns[slot],
                batch.column(idx),
                &feature_names[slot],
                row_offset,
                path,
            )?;
        }
        append_labels(&mut labels, batch.column(label_index), &label_name, row_offset, path)?;
        row_offset += batch.num_rows();
    }

    let rows = labels.len();
    let width = columns.len();
    let mut data = Vec::with_capacity(rows * width);
    for row in 0..rows {
        for column in &columns {
            data.push(column[row]);
        }
    }
    let features = Array2::from_shape_vec((rows, width), data).map_err(|_| DatasetError::Shape {
        rows,
        columns: width,
    })?;
    let dataset = Dataset::new(feature_names, features, labels)?;
    tracing::info!(
        rows = dataset.len(),
        features = dataset.n_features(),
        label = %label_name,
        "Loaded dataset from {}",
        path.display()
    );
    Ok(dataset)
}

fn read_batches(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>), DatasetLoadError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let io_err = |source| DatasetLoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let arrow_err = |source| DatasetLoadError::Arrow {
        path: path.to_path_buf(),
        source,
    };
    match extension.as_str() {
        "arrow" | "feather" | "ipc" => {
            let file = File::open(path).map_err(io_err)?;
            let reader = FileReader::try_new(file, None).map_err(arrow_err)?;
            let schema = reader.schema();
            let batches = reader.collect::<Result<Vec<_>, _>>().map_err(arrow_err)?;
            Ok((schema, batches))
        }
        "csv" => {
            let mut file = File::open(path).map_err(io_err)?;
            let format = Format::default().with_header(true);
            let (schema, _) = format.infer_schema(&mut file, None).map_err(arrow_err)?;
            file.rewind().map_err(io_err)?;
            let schema = Arc::new(schema);
            let reader = ReaderBuilder::new(schema.clone())
                .with_header(true)
                .build(file)
                .map_err(arrow_err)?;
            let batches = reader.collect::<Result<Vec<_>, _>>().map_err(arrow_err)?;
            Ok((schema, batches))
        }
        _ => Err(DatasetLoadError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn resolve_column(schema: &SchemaRef, selector: &ColumnSelector) -> Result<usize, DatasetLoadError> {
    match selector {
        ColumnSelector::Index(index) => {
            let columns = schema.fields().len();
            if *index < columns {
                Ok(*index)
            } else {
                Err(DatasetLoadError::ColumnOutOfRange {
                    index: *index,
                    columns,
                })
            }
        }
        ColumnSelector::Name(name) => schema
            .index_of(name)
            .map_err(|_| DatasetLoadError::ColumnNotFound(name.clone())),
    }
}

fn append_numeric(
    out: &mut Vec<f64>,
    column: &ArrayRef,
    name: &str,
    row_offset: usize,
    path: &Path,
) -> Result<(), DatasetLoadError> {
    if !column.data_type().is_numeric() {
        return Err(DatasetLoadError::NonNumericColumn {
            column: name.to_string(),
            data_type: column.data_type().clone(),
        });
    }
    let values = cast(column, &DataType::Float64).map_err(|source| DatasetLoadError::Arrow {
        path: path.to_path_buf(),
        source,
    })?;
    for (row, value) in values.as_primitive::<Float64Type>().iter().enumerate() {
        let value = value.ok_or_else(|| DatasetLoadError::NullValue {
            column: name.to_string(),
            row: row_offset + row,
        })?;
        out.push(value);
    }
    Ok(())
}

fn append_labels(
    out: &mut Vec<String>,
    column: &ArrayRef,
    name: &str,
    row_offset: usize,
    path: &Path,
) -> Result<(), DatasetLoadError> {
    let supported = match column.data_type() {
        DataType::Dictionary(_, value) => matches!(
            value.as_ref(),
            DataType::Utf8 | DataType::LargeUtf8
        ),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Boolean => true,
        other => other.is_integer(),
    };
    if !supported {
        return Err(DatasetLoadError::UnsupportedLabelType {
            column: name.to_string(),
            data_type: column.data_type().clone(),
        });
    }
    let values = cast(column, &DataType::Utf8).map_err(|source| DatasetLoadError::Arrow {
        path: path.to_path_buf(),
        source,
    })?;
    for (row, value) in values.as_string::<i32>().iter().enumerate() {
        let value = value.ok_or_else(|| DatasetLoadError::NullValue {
            column: name.to_string(),
            row: row_offset + row,
        })?;
        out.push(value.to_string());
    }
    Ok(())
}
