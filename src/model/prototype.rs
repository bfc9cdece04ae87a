//! Declared input shape of a served model and request row validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a request row does not match the model's input prototype.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("expected {expected} feature values, got {actual}")]
    ColumnCount { expected: usize, actual: usize },
    #[error("feature `{column}` must be a number, got {found}")]
    NotNumeric { column: String, found: &'static str },
    #[error("missing feature `{0}`")]
    MissingColumn(String),
    #[error("unexpected feature `{0}`")]
    UnexpectedColumn(String),
    #[error("expected a row (array or object), got {0}")]
    NotARow(&'static str),
    #[error("request contains no rows")]
    Empty,
    #[error("row {row}: {source}")]
    InRow {
        row: usize,
        #[source]
        source: Box<SchemaError>,
    },
    #[error("prototype has {names} feature names but an example of {values} values")]
    Prototype { names: usize, values: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    Float64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub dtype: FeatureType,
}

/// Column names, types and one representative training row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPrototype {
    features: Vec<FeatureSpec>,
    example: Vec<f64>,
}

/// One request row, either positional or keyed by feature name.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

impl InputPrototype {
    pub fn from_example(names: &[String], example: &[f64]) -> Result<Self, SchemaError> {
        if names.is_empty() || names.len() != example.len() {
            return Err(SchemaError::Prototype {
                names: names.len(),
                values: example.len(),
            });
        }
        Ok(Self {
            features: names
                .iter()
                .map(|name| FeatureSpec {
                    name: name.clone(),
                    dtype: FeatureType::Float64,
                })
                .collect(),
            example: example.to_vec(),
        })
    }

    pub fn width(&self) -> usize {
        self.features.len()
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn example(&self) -> &[f64] {
        &self.example
    }

    /// Check a row against the declared columns and return its values in
    /// prototype order.
    pub fn validate(&self, row: &RawRow) -> Result<Vec<f64>, SchemaError> {
        match row {
            RawRow::Positional(values) => {
                if values.len() != self.width() {
                    return Err(SchemaError::ColumnCount {
                        expected: self.width(),
                        actual: values.len(),
                    });
                }
                values
                    .iter()
                    .zip(&self.features)
                    .map(|(value, spec)| numeric(value, &spec.name))
                    .collect()
            }
            RawRow::Named(map) => {
                if let Some(extra) = map
                    .keys()
                    .find(|key| !self.features.iter().any(|f| &f.name == *key))
                {
                    return Err(SchemaError::UnexpectedColumn(extra.clone()));
                }
                self.features
                    .iter()
                    .map(|spec| {
                        let value = map
                            .get(&spec.name)
                            .ok_or_else(|| SchemaError::MissingColumn(spec.name.clone()))?;
                        numeric(value, &spec.name)
                    })
                    .collect()
            }
        }
    }

    pub(crate) fn check_integrity(&self) -> Result<(), SchemaError> {
        if self.features.is_empty() || self.features.len() != self.example.len() {
            return Err(SchemaError::Prototype {
                names: self.features.len(),
                values: self.example.len(),
            });
        }
        Ok(())
    }
}

impl RawRow {
    pub fn from_json(value: Value) -> Result<Self, SchemaError> {
        match value {
            Value::Array(values) => Ok(RawRow::Positional(values)),
            Value::Object(map) => Ok(RawRow::Named(map)),
            other => Err(SchemaError::NotARow(json_type(&other))),
        }
    }
}

/// Split a request body into rows.
///
/// An object or an array of scalars is a single row; an array of arrays or
/// objects is a batch.
pub fn parse_request(body: Value) -> Result<Vec<RawRow>, SchemaError> {
    match body {
        Value::Object(map) => Ok(vec![RawRow::Named(map)]),
        Value::Array(items) => {
            let Some(first) = items.first() else {
                return Err(SchemaError::Empty);
            };
            if !matches!(first, Value::Array(_) | Value::Object(_)) {
                return Ok(vec![RawRow::Positional(items)]);
            }
            items
                .into_iter()
                .enumerate()
                .map(|(row, item)| {
                    RawRow::from_json(item).map_err(|source| SchemaError::InRow {
                        row,
                        source: Box::new(source),
                    })
                })
                .collect()
        }
        other => Err(SchemaError::NotARow(json_type(&other))),
    }
}

fn numeric(value: &Value, column: &str) -> Result<f64, SchemaError> {
    match value {
        Value::Number(number) => number.as_f64().ok_or_else(|| SchemaError::NotNumeric {
            column: column.to_string(),
            found: "number",
        }),
        other => Err(SchemaError::NotNumeric {
            column: column.to_string(),
            found: json_type(other),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prototype() -> InputPrototype {
        InputPrototype::from_example(&["height".into(), "weight".into()], &[7.2, 180.0]).unwrap()
    }

    #[test]
    fn positional_rows_need_exact_numeric_width() {
        let proto = prototype();
        let ok = RawRow::from_json(json!([1, 2.5])).unwrap();
        assert_eq!(proto.validate(&ok).unwrap(), vec![1.0, 2.5]);

        let short = RawRow::from_json(json!([1.0])).unwrap();
        assert_eq!(
            proto.validate(&short).unwrap_err(),
            SchemaError::ColumnCount {
                expected: 2,
                actual: 1
            }
        );
        let text = RawRow::from_json(json!(["tall", 2.0])).unwrap();
        assert_eq!(
            proto.validate(&text).unwrap_err(),
            SchemaError::NotNumeric {
                column: "height".into(),
                found: "string"
            }
        );
        let flag = RawRow::from_json(json!([1.0, true])).unwrap();
        assert!(matches!(
            proto.validate(&flag),
            Err(SchemaError::NotNumeric { found: "boolean", .. })
        ));
    }

    #[test]
    fn named_rows_are_reordered_and_checked() {
        let proto = prototype();
        let row = RawRow::from_json(json!({"weight": 150, "height": 6.0})).unwrap();
        assert_eq!(proto.validate(&row).unwrap(), vec![6.0, 150.0]);

        let missing = RawRow::from_json(json!({"height": 6.0})).unwrap();
        assert_eq!(
            proto.validate(&missing).unwrap_err(),
            SchemaError::MissingColumn("weight".into())
        );
        let extra = RawRow::from_json(json!({"height": 6.0, "weight": 1, "fur": 3})).unwrap();
        assert_eq!(
            proto.validate(&extra).unwrap_err(),
            SchemaError::UnexpectedColumn("fur".into())
        );
    }

    #[test]
    fn request_bodies_split_into_rows() {
        assert_eq!(parse_request(json!([1.0, 2.0])).unwrap().len(), 1);
        assert_eq!(parse_request(json!({"height": 1.0})).unwrap().len(), 1);
        assert_eq!(parse_request(json!([[1.0, 2.0], [3.0, 4.0]])).unwrap().len(), 2);
        assert_eq!(parse_request(json!([])).unwrap_err(), SchemaError::Empty);
        assert_eq!(
            parse_request(json!("hello")).unwrap_err(),
            SchemaError::NotARow("string")
        );
        assert!(matches!(
            parse_request(json!([[1.0, 2.0], 3.0])),
            Err(SchemaError::InRow { row: 1, .. })
        ));
    }

    #[test]
    fn prototype_needs_matching_example() {
        assert_eq!(
            InputPrototype::from_example(&["a".into()], &[1.0, 2.0]).unwrap_err(),
            SchemaError::Prototype {
                names: 1,
                values: 2
            }
        );
        assert!(InputPrototype::from_example(&[], &[]).is_err());
    }
}
