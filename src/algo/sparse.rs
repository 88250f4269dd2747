//! Sparse linear solver for the symmetric positive definite systems built
//! from the cotangent operator.
//!
//! [`SparseSolver`] factorizes a matrix once and then solves any number of
//! right-hand sides against it. Two strategies are available:
//!
//! - [`SolverStrategy::Cholesky`]: sparse Cholesky factorization. Exact up
//!   to round-off and the default.
//! - [`SolverStrategy::ConjugateGradient`]: Jacobi-preconditioned conjugate
//!   gradient. Nothing is factorized; each solve iterates against the stored
//!   matrix. Useful for very large meshes.
//!
//! Both strategies require the matrix to be symmetric; only its values are
//! read, the symmetry is not checked.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};

use crate::error::{MeshError, Result};

/// How [`SparseSolver`] solves its system.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SolverStrategy {
    /// Direct sparse Cholesky factorization.
    #[default]
    Cholesky,

    /// Jacobi-preconditioned conjugate gradient.
    ConjugateGradient {
        /// Maximum number of iterations per solve.
        max_iterations: usize,
        /// Convergence threshold on the relative residual norm.
        tolerance: f64,
    },
}

impl SolverStrategy {
    /// Conjugate gradient with the usual settings.
    pub fn conjugate_gradient() -> Self {
        SolverStrategy::ConjugateGradient {
            max_iterations: 10_000,
            tolerance: 1e-10,
        }
    }
}

enum Backend {
    Cholesky(CscCholesky<f64>),
    Iterative {
        matrix: CsrMatrix<f64>,
        max_iterations: usize,
        tolerance: f64,
    },
}

/// A factorized symmetric positive definite system.
pub struct SparseSolver {
    dimension: usize,
    strategy: SolverStrategy,
    backend: Backend,
}

impl std::fmt::Debug for SparseSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseSolver")
            .field("dimension", &self.dimension)
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl SparseSolver {
    /// Factorize `matrix` for repeated solves.
    ///
    /// # Errors
    /// - [`MeshError::DimensionMismatch`] if the matrix is not square.
    /// - [`MeshError::FactorizationFailed`] if the matrix is not positive
    ///   definite. With the conjugate gradient strategy only a non-positive
    ///   diagonal is caught here; anything else surfaces at solve time.
    pub fn factorize(matrix: &CsrMatrix<f64>, strategy: SolverStrategy) -> Result<Self> {
        let n = matrix.nrows();
        if matrix.ncols() != n {
            return Err(MeshError::DimensionMismatch {
                expected: n,
                found: matrix.ncols(),
            });
        }

        let backend = match strategy {
            SolverStrategy::Cholesky => {
                let csc = CscMatrix::from(matrix);
                let factor = CscCholesky::factor(&csc)
                    .map_err(|e| MeshError::factorization(format!("{:?}", e)))?;
                Backend::Cholesky(factor)
            }
            SolverStrategy::ConjugateGradient {
                max_iterations,
                tolerance,
            } => {
                let diagonal = diagonal(matrix);
                if let Some(row) = diagonal.iter().position(|&d| d <= 0.0 || d.is_nan()) {
                    return Err(MeshError::factorization(format!(
                        "non-positive diagonal entry {} at row {}",
                        diagonal[row], row
                    )));
                }
                Backend::Iterative {
                    matrix: matrix.clone(),
                    max_iterations,
                    tolerance,
                }
            }
        };

        log::debug!("factorized {}x{} system with {:?}", n, n, strategy);

        Ok(Self {
            dimension: n,
            strategy,
            backend,
        })
    }

    /// Size of the system.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The strategy this solver was built with.
    #[inline]
    pub fn strategy(&self) -> SolverStrategy {
        self.strategy
    }

    /// Solve `A x = b`.
    pub fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>> {
        self.check_rows(b.len())?;

        let x = match &self.backend {
            Backend::Cholesky(factor) => {
                let rhs = DMatrix::from_column_slice(b.len(), 1, b.as_slice());
                factor.solve(&rhs).column(0).into_owned()
            }
            Backend::Iterative {
                matrix,
                max_iterations,
                tolerance,
            } => conjugate_gradient(matrix, b, None, *max_iterations, *tolerance)?,
        };

        check_finite(x.iter())?;
        Ok(x)
    }

    /// Solve `A X = B` for every column of `B` against the same factorization.
    pub fn solve_columns(&self, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.check_rows(b.nrows())?;

        let x = match &self.backend {
            Backend::Cholesky(factor) => factor.solve(b),
            Backend::Iterative { .. } => {
                let mut x = DMatrix::zeros(b.nrows(), b.ncols());
                for j in 0..b.ncols() {
                    let column = self.solve(&b.column(j).into_owned())?;
                    x.set_column(j, &column);
                }
                x
            }
        };

        check_finite(x.iter())?;
        Ok(x)
    }

    fn check_rows(&self, rows: usize) -> Result<()> {
        if rows != self.dimension {
            return Err(MeshError::DimensionMismatch {
                expected: self.dimension,
                found: rows,
            });
        }
        Ok(())
    }
}

fn check_finite<'a>(mut values: impl Iterator<Item = &'a f64>) -> Result<()> {
    if values.any(|v| !v.is_finite()) {
        return Err(MeshError::solve("solution contains non-finite values"));
    }
    Ok(())
}

/// Diagonal entries of a square CSR matrix (zero where not stored).
pub fn diagonal(a: &CsrMatrix<f64>) -> DVector<f64> {
    let offsets = a.row_offsets();
    let cols = a.col_indices();
    let values = a.values();

    let mut d = DVector::zeros(a.nrows());
    for i in 0..a.nrows() {
        for k in offsets[i]..offsets[i + 1] {
            if cols[k] == i {
                d[i] += values[k];
            }
        }
    }
    d
}

/// Multiply matrix by vector: y = A * x.
pub fn mul_vec(a: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    assert_eq!(x.len(), a.ncols(), "Vector dimension mismatch");

    let offsets = a.row_offsets();
    let cols = a.col_indices();
    let values = a.values();

    let mut y = DVector::zeros(a.nrows());
    for i in 0..a.nrows() {
        let mut sum = 0.0;
        for k in offsets[i]..offsets[i + 1] {
            sum += values[k] * x[cols[k]];
        }
        y[i] = sum;
    }
    y
}

/// Multiply matrix by a dense matrix, column by column: Y = A * X.
pub fn mul_mat(a: &CsrMatrix<f64>, x: &DMatrix<f64>) -> DMatrix<f64> {
    assert_eq!(x.nrows(), a.ncols(), "Matrix dimension mismatch");

    let offsets = a.row_offsets();
    let cols = a.col_indices();
    let values = a.values();

    let mut y = DMatrix::zeros(a.nrows(), x.ncols());
    for j in 0..x.ncols() {
        for i in 0..a.nrows() {
            let mut sum = 0.0;
            for k in offsets[i]..offsets[i + 1] {
                sum += values[k] * x[(cols[k], j)];
            }
            y[(i, j)] = sum;
        }
    }
    y
}

/// Solve A*x = b using the Jacobi-preconditioned Conjugate Gradient method.
///
/// Requires A to be symmetric positive definite.
///
/// # Arguments
///
/// * `a` - The system matrix (must be symmetric positive definite)
/// * `b` - The right-hand side vector
/// * `x0` - Optional initial guess (zeros if None)
/// * `max_iter` - Maximum number of iterations
/// * `tolerance` - Convergence tolerance (relative residual norm)
///
/// # Returns
///
/// The solution vector x, or an error if the iteration breaks down or does
/// not converge.
pub fn conjugate_gradient(
    a: &CsrMatrix<f64>,
    b: &DVector<f64>,
    x0: Option<&DVector<f64>>,
    max_iter: usize,
    tolerance: f64,
) -> Result<DVector<f64>> {
    let n = b.len();
    if a.nrows() != n || a.ncols() != n {
        return Err(MeshError::DimensionMismatch {
            expected: a.nrows(),
            found: n,
        });
    }

    let mut x = match x0 {
        Some(x0) => x0.clone(),
        None => DVector::zeros(n),
    };

    let b_norm = b.norm();
    if b_norm < 1e-15 {
        return Ok(x);
    }

    // Jacobi preconditioner; rows without a positive diagonal are left alone
    let inv_diag = diagonal(a).map(|d| if d > 0.0 { 1.0 / d } else { 1.0 });

    let mut r = b - mul_vec(a, &x);
    if r.norm() / b_norm < tolerance {
        return Ok(x);
    }

    let mut z = r.component_mul(&inv_diag);
    let mut p = z.clone();
    let mut rz = r.dot(&z);

    for iter in 0..max_iter {
        let ap = mul_vec(a, &p);

        let p_ap = p.dot(&ap);
        if p_ap <= 1e-300 || p_ap.is_nan() {
            return Err(MeshError::solve(format!(
                "conjugate gradient broke down at iteration {} (matrix not positive definite)",
                iter
            )));
        }
        let alpha = rz / p_ap;

        x += alpha * &p;
        r -= alpha * &ap;

        if r.norm() / b_norm < tolerance {
            log::debug!("conjugate gradient converged in {} iterations", iter + 1);
            return Ok(x);
        }

        z = r.component_mul(&inv_diag);
        let new_rz = r.dot(&z);
        let beta = new_rz / rz;
        p = &z + beta * &p;
        rz = new_rz;
    }

    Err(MeshError::solve(format!(
        "conjugate gradient did not converge in {} iterations",
        max_iter
    )))
}
