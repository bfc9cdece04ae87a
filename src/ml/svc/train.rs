use std::collections::BTreeSet;

use ndarray::ArrayView2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::{LinearSvcModel, SvcError, separator_count};

/// Training options for the squared-hinge, L2-regularized linear SVM.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    /// Inverse regularization strength.
    pub c: f64,
    /// Stop once the projected-gradient spread falls below this value.
    pub tolerance: f64,
    pub max_iter: usize,
    /// Value of the synthetic constant feature that carries the intercept.
    pub intercept_scaling: f64,
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            c: 1.0,
            tolerance: 1e-4,
            max_iter: 1000,
            intercept_scaling: 1.0,
            seed: 500,
        }
    }
}

impl TrainOptions {
    pub fn validate(&self) -> Result<(), SvcError> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(SvcError::InvalidOption("c must be > 0"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(SvcError::InvalidOption("tolerance must be > 0"));
        }
        if self.max_iter == 0 {
            return Err(SvcError::InvalidOption("max_iter must be > 0"));
        }
        if !(self.intercept_scaling.is_finite() && self.intercept_scaling > 0.0) {
            return Err(SvcError::InvalidOption("intercept_scaling must be > 0"));
        }
        Ok(())
    }
}

struct DualSolution {
    weights: Vec<f64>,
    iterations: usize,
    converged: bool,
}

/// Fit a linear SVM on already scaled features.
///
/// Each separator is solved with dual coordinate descent over the
/// squared-hinge loss. Coordinates are visited in an order drawn from a
/// `StdRng` seeded with `options.seed`, so identical inputs give identical
/// parameters.
pub fn train_linear_svc(
    features: ArrayView2<'_, f64>,
    labels: &[String],
    options: &TrainOptions,
) -> Result<LinearSvcModel, SvcError> {
    options.validate()?;
    if features.nrows() != labels.len() {
        return Err(SvcError::LabelCountMismatch {
            rows: features.nrows(),
            labels: labels.len(),
        });
    }
    if labels.is_empty() {
        return Err(SvcError::EmptyDataset);
    }
    let classes: Vec<String> = labels
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if classes.len() < 2 {
        return Err(SvcError::SingleClass(classes));
    }

    let dim = features.ncols();
    let rows: Vec<Vec<f64>> = features
        .rows()
        .into_iter()
        .map(|row| {
            let mut augmented = row.to_vec();
            augmented.push(options.intercept_scaling);
            augmented
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(options.seed);
    let separators = separator_count(classes.len());
    let mut weights = Vec::with_capacity(separators * dim);
    let mut intercepts = Vec::with_capacity(separators);
    let mut iterations = 0usize;
    let mut converged = true;
    for separator in 0..separators {
        let positive = if separators == 1 { &classes[1] } else { &classes[separator] };
        let targets: Vec<f64> = labels
            .iter()
            .map(|label| if label == positive { 1.0 } else { -1.0 })
            .collect();
        let solution = solve_dual(&rows, &targets, options, &mut rng);
        if !solution.converged {
            tracing::warn!(
                separator,
                max_iter = options.max_iter,
                "Linear SVM did not converge; consider raising max_iter"
            );
        }
        iterations = iterations.max(solution.iterations);
        converged &= solution.converged;
        weights.extend_from_slice(&solution.weights[..dim]);
        intercepts.push(solution.weights[dim] * options.intercept_scaling);
    }

    let model = LinearSvcModel {
        model_version: 1,
        n_features: dim,
        classes,
        weights,
        intercepts,
        iterations,
        converged,
    };
    model.validate()?;
    tracing::debug!(
        classes = model.classes.len(),
        separators,
        iterations,
        converged,
        "Trained linear SVM"
    );
    Ok(model)
}

/// Dual coordinate descent for the L2-loss SVM with shrinking.
fn solve_dual(
    rows: &[Vec<f64>],
    targets: &[f64],
    options: &TrainOptions,
    rng: &mut StdRng,
) -> DualSolution {
    let l = rows.len();
    let dim = rows[0].len();
    let diag = 0.5 / options.c;
    let qd: Vec<f64> = rows.iter().map(|x| diag + dot(x, x)).collect();

    let mut alpha = vec![0.0f64; l];
    let mut w = vec![0.0f64; dim];
    let mut index: Vec<usize> = (0..l).collect();
    let mut active = l;
    let mut pg_max_old = f64::INFINITY;
    let mut iterations = 0usize;
    let mut converged = false;

    while iterations < options.max_iter {
        let mut pg_max_new = f64::NEG_INFINITY;
        let mut pg_min_new = f64::INFINITY;
        index[..active].shuffle(rng);

        let mut s = 0usize;
        while s < active {
            let i = index[s];
            let yi = targets[i];
            let g = yi * dot(&w, &rows[i]) - 1.0 + alpha[i] * diag;

            let mut pg = 0.0;
            if alpha[i] == 0.0 {
                if g > pg_max_old {
                    active -= 1;
                    index.swap(s, active);
                    continue;
                }
                if g < 0.0 {
                    pg = g;
                }
            } else {
                pg = g;
            }
            pg_max_new = pg_max_new.max(pg);
            pg_min_new = pg_min_new.min(pg);

            if pg.abs() > 1e-12 {
                let previous = alpha[i];
                alpha[i] = (previous - g / qd[i]).max(0.0);
                let step = (alpha[i] - previous) * yi;
                for (wj, xj) in w.iter_mut().zip(&rows[i]) {
                    *wj += step * xj;
                }
            }
            s += 1;
        }

        iterations += 1;
        if pg_max_new - pg_min_new <= options.tolerance {
            if active == l {
                converged = true;
                break;
            }
            // Shrunk coordinates may have drifted; re-check all of them.
            active = l;
            pg_max_old = f64::INFINITY;
            continue;
        }
        pg_max_old = if pg_max_new <= 0.0 {
            f64::INFINITY
        } else {
            pg_max_new
        };
    }

    DualSolution {
        weights: w,
        iterations,
        converged,
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
