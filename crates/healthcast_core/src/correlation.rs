//! Correlation matrix construction and Cholesky factorization
//!
//! Cross-test co-movement is induced by mixing independent standard normals
//! through the lower-triangular factor `L` of the correlation matrix `C`
//! (`L · Lᵗ = C`). When `C` is not positive definite the diagonal is inflated
//! by increasing epsilons until factorization succeeds. Off-diagonal terms
//! are never touched.

use nalgebra::{Cholesky, DMatrix};

use crate::config::ForecastModel;
use crate::error::ConfigError;

/// Diagonal inflations tried in order; `0.0` is the raw matrix
pub const INFLATION_EPSILONS: [f64; 7] = [0.0, 1e-8, 1e-6, 1e-5, 1e-4, 1e-3, 1e-2];

/// Unit diagonal with each `(i, j, r)` mirrored to `(j, i, r)`.
/// Unspecified off-diagonal entries stay 0.
#[must_use]
pub fn correlation_matrix(n: usize, pairs: &[(usize, usize, f64)]) -> DMatrix<f64> {
    let mut m = DMatrix::identity(n, n);
    for &(i, j, r) in pairs {
        if i == j {
            continue;
        }
        m[(i, j)] = r;
        m[(j, i)] = r;
    }
    m
}

/// `L` for a matrix, or `None` if some pivot is not strictly positive
fn factor(matrix: DMatrix<f64>) -> Option<DMatrix<f64>> {
    let lower = Cholesky::new(matrix)?.unpack();
    lower
        .diagonal()
        .iter()
        .all(|d| d.is_finite() && *d > 0.0)
        .then_some(lower)
}

/// The mixing matrix for correlated shocks
#[derive(Debug, Clone, PartialEq)]
pub struct CholeskyFactor {
    /// Correlated test names in matrix order
    pub tests: Vec<String>,
    /// Diagonal inflation that was needed; `0.0` for the raw matrix
    pub epsilon: f64,
    lower: DMatrix<f64>,
}

impl CholeskyFactor {
    /// Factor the correlation structure of `tests` described by `pairs`
    pub fn build(tests: &[String], pairs: &[(usize, usize, f64)]) -> Result<Self, ConfigError> {
        let n = tests.len();
        let matrix = correlation_matrix(n, pairs);
        for &epsilon in &INFLATION_EPSILONS {
            let candidate = if epsilon > 0.0 {
                &matrix + DMatrix::<f64>::identity(n, n) * epsilon
            } else {
                matrix.clone()
            };
            if let Some(lower) = factor(candidate) {
                if epsilon > 0.0 {
                    tracing::debug!(epsilon, "correlation matrix needed diagonal inflation");
                }
                return Ok(Self {
                    tests: tests.to_vec(),
                    epsilon,
                    lower,
                });
            }
        }
        Err(ConfigError::CholeskyFailed {
            max_epsilon: INFLATION_EPSILONS[INFLATION_EPSILONS.len() - 1],
        })
    }

    /// Factor the correlation section of a resolved model
    pub fn from_model(model: &ForecastModel) -> Result<Self, ConfigError> {
        Self::build(&model.correlation_tests, &model.correlation_pairs)
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.lower.nrows()
    }

    #[must_use]
    pub fn lower(&self) -> &DMatrix<f64> {
        &self.lower
    }

    /// `x = L · z`, exploiting the zero upper triangle
    pub fn mix_into(&self, z: &[f64], out: &mut [f64]) {
        let n = self.size();
        for (i, slot) in out.iter_mut().enumerate().take(n) {
            *slot = (0..=i).map(|k| self.lower[(i, k)] * z[k]).sum();
        }
    }

    /// `L · Lᵗ`
    #[must_use]
    pub fn reconstruct(&self) -> DMatrix<f64> {
        &self.lower * self.lower.transpose()
    }
}
