use ndarray::{Array1, Array2, Axis};
use tracing::warn;

use crate::TARGET_BANDIT;

/// LinUCB contextual bandit over a fixed-dimension article context.
///
/// Holds the design matrix `A` (identity-initialized, accumulating context
/// outer products), the reward accumulator `b`, and the derived parameter
/// vector `theta = A⁻¹ b`. `A` stays symmetric positive-definite by
/// construction, so the solves below are always well-posed.
#[derive(Debug, Clone)]
pub struct LinUcb {
    alpha: f64,
    a: Array2<f64>,
    b: Array1<f64>,
    theta: Array1<f64>,
}

impl LinUcb {
    /// Creates a fresh bandit for `dim`-dimensional contexts with the given
    /// exploration weight.
    pub fn new(dim: usize, alpha: f64) -> Self {
        Self {
            alpha,
            a: Array2::eye(dim),
            b: Array1::zeros(dim),
            theta: Array1::zeros(dim),
        }
    }

    /// Upper-confidence-bound score for a context: the linear reward
    /// estimate plus an exploration bonus proportional to estimation
    /// uncertainty.
    pub fn predict(&self, context: &Array1<f64>) -> f64 {
        let mean = self.theta.dot(context);
        let confidence = match solve_spd(&self.a, context) {
            Some(a_inv_context) => self.alpha * context.dot(&a_inv_context).max(0.0).sqrt(),
            None => {
                warn!(target: TARGET_BANDIT, "Confidence solve failed; scoring without exploration bonus");
                0.0
            }
        };
        mean + confidence
    }

    /// Folds an observed reward for a context into the model. The parameter
    /// vector is recomputed by solving `A theta = b` rather than inverting
    /// `A` explicitly.
    pub fn update(&mut self, context: &Array1<f64>, reward: f64) {
        let column = context.view().insert_axis(Axis(1));
        self.a += &column.dot(&column.t());
        self.b.scaled_add(reward, context);

        match solve_spd(&self.a, &self.b) {
            Some(theta) => self.theta = theta,
            None => {
                warn!(target: TARGET_BANDIT, "Parameter solve failed; keeping previous theta")
            }
        }
    }

    #[cfg(test)]
    pub fn design_matrix(&self) -> &Array2<f64> {
        &self.a
    }
}

/// Solves `A x = b` for symmetric positive-definite `A` via Cholesky
/// factorization. Returns `None` when the factorization breaks down, which
/// only happens on non-finite input.
fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();

    // A = L Lᵀ with L lower triangular.
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // Forward substitution: L y = b.
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }

    // Back substitution: Lᵀ x = y.
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }

    Some(x)
}
