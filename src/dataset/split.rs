//! Seeded train/test partitioning.

use ndarray::{Array2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

use super::Dataset;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SplitError {
    #[error("test fraction {fraction} must lie in (0, 1) and leave both partitions non-empty for {rows} rows")]
    InvalidFraction { fraction: f64, rows: usize },
    #[error("cannot split an empty dataset")]
    EmptyDataset,
}

/// Disjoint, covering partition of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train_features: Array2<f64>,
    pub test_features: Array2<f64>,
    pub train_labels: Vec<String>,
    pub test_labels: Vec<String>,
    /// Source row indices, in the order the rows appear in `train_*`.
    pub train_indices: Vec<usize>,
    /// Source row indices, in the order the rows appear in `test_*`.
    pub test_indices: Vec<usize>,
}

impl Split {
    pub fn train_len(&self) -> usize {
        self.train_labels.len()
    }

    pub fn test_len(&self) -> usize {
        self.test_labels.len()
    }
}

/// Number of rows assigned to the test partition: `ceil(rows * fraction)`.
pub fn test_row_count(rows: usize, fraction: f64) -> Result<usize, SplitError> {
    if rows == 0 {
        return Err(SplitError::EmptyDataset);
    }
    let invalid = SplitError::InvalidFraction { fraction, rows };
    if !fraction.is_finite() || fraction <= 0.0 || fraction >= 1.0 {
        return Err(invalid);
    }
    let test = (rows as f64 * fraction).ceil() as usize;
    if test == 0 || test >= rows {
        return Err(invalid);
    }
    Ok(test)
}

/// Shuffle row indices with a `seed`-ed RNG and cut off the test share.
///
/// The permutation only depends on `seed` and the row count, so the same file
/// splits identically across restarts.
pub fn train_test_split(
    dataset: &Dataset,
    test_fraction: f64,
    seed: u64,
) -> Result<Split, SplitError> {
    let rows = dataset.len();
    let test_n = test_row_count(rows, test_fraction)?;

    let mut permutation: Vec<usize> = (0..rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    permutation.shuffle(&mut rng);
    let (test_indices, train_indices) = permutation.split_at(test_n);

    let features = dataset.features();
    let labels = dataset.labels();
    let pick = |indices: &[usize]| -> Vec<String> {
        indices.iter().map(|&i| labels[i].clone()).collect()
    };

    tracing::debug!(
        rows,
        train = train_indices.len(),
        test = test_indices.len(),
        seed,
        "Split dataset"
    );
    Ok(Split {
        train_features: features.select(Axis(0), train_indices),
        test_features: features.select(Axis(0), test_indices),
        train_labels: pick(train_indices),
        test_labels: pick(test_indices),
        train_indices: train_indices.to_vec(),
        test_indices: test_indices.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn dataset(rows: usize) -> Dataset {
        let rows: Vec<(Vec<f64>, String)> = (0..rows)
            .map(|i| {
                let label = if i % 2 == 0 { "real" } else { "fake" };
                (vec![i as f64, (i * 3) as f64], label.to_string())
            })
            .collect();
        Dataset::from_rows(&rows).unwrap()
    }

    #[test]
    fn same_seed_gives_same_partition() {
        let data = dataset(50);
        let a = train_test_split(&data, 0.2, 500).unwrap();
        let b = train_test_split(&data, 0.2, 500).unwrap();
        assert_eq!(a, b);
        let c = train_test_split(&data, 0.2, 501).unwrap();
        assert_ne!(a.test_indices, c.test_indices);
    }

    #[test]
    fn partitions_are_disjoint_and_covering() {
        let data = dataset(37);
        let split = train_test_split(&data, 0.3, 7).unwrap();
        let train: BTreeSet<_> = split.train_indices.iter().copied().collect();
        let test: BTreeSet<_> = split.test_indices.iter().copied().collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), 37);
        assert_eq!(train.union(&test).count(), 37);
        for (pos, &src) in split.test_indices.iter().enumerate() {
            let row = data.row(src).unwrap();
            assert_eq!(split.test_labels[pos], row.label);
            assert_eq!(split.test_features.row(pos), row.features);
        }
    }

    #[test]
    fn test_share_is_within_one_row_of_fraction() {
        for rows in 5..120 {
            for fraction in [0.1, 0.2, 0.25, 0.5, 0.75] {
                let Ok(split) = train_test_split(&dataset(rows), fraction, 500) else {
                    continue;
                };
                let expected = rows as f64 * fraction;
                assert!((split.test_len() as f64 - expected).abs() <= 1.0);
                assert_eq!(split.train_len() + split.test_len(), rows);
            }
        }
    }

    #[test]
    fn hundred_rows_split_eighty_twenty() {
        let split = train_test_split(&dataset(100), 0.2, 500).unwrap();
        assert_eq!(split.train_len(), 80);
        assert_eq!(split.test_len(), 20);
        assert_eq!(split.train_features.nrows(), 80);
        assert_eq!(split.test_features.nrows(), 20);
    }

    #[test]
    fn rejects_out_of_range_fractions() {
        let data = dataset(10);
        for fraction in [0.0, 1.0, -0.2, 1.5, f64::NAN] {
            assert!(matches!(
                train_test_split(&data, fraction, 1),
                Err(SplitError::InvalidFraction { .. })
            ));
        }
        assert!(matches!(
            train_test_split(&dataset(2), 0.9, 1),
            Err(SplitError::InvalidFraction { rows: 2, .. })
        ));
    }

    #[test]
    fn rejects_empty_dataset() {
        let empty = Dataset::new(
            vec!["a".into(), "b".into()],
            Array2::zeros((0, 2)),
            Vec::new(),
        )
        .unwrap();
        assert_eq!(
            train_test_split(&empty, 0.2, 500).unwrap_err(),
            SplitError::EmptyDataset
        );
    }
}
