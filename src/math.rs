//! Dense matrix helpers shared by the GP and the samplers.
//!
//! All matrices are `faer::Mat<f64>`, stored column-major and indexed as
//! `(row, col)`. Independent samples or chains are always columns.

use std::f64::consts::PI;

use faer::{
    linalg::{solvers::LltError, triangular_solve},
    Mat, MatRef, Par, Side,
};
use itertools::izip;
use log::{debug, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::{check_dim, GpError, Result};

/// Settings for computing matrix square roots
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SqrtSettings {
    /// Eigenvalues below `eigen_tolerance * max(1, largest eigenvalue)`
    /// are treated as zero by [`eigen_sqrt`].
    pub eigen_tolerance: f64,
}

impl Default for SqrtSettings {
    fn default() -> Self {
        Self {
            eigen_tolerance: 1e-10,
        }
    }
}

#[inline]
pub(crate) fn vector_dot(a: &[f64], b: &[f64]) -> f64 {
    assert!(a.len() == b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub(crate) fn axpy(x: &[f64], y: &mut [f64], a: f64) {
    assert!(x.len() == y.len());
    izip!(x, y).for_each(|(x, y)| {
        *y += a * x;
    });
}

#[inline]
pub(crate) fn norm(a: &[f64]) -> f64 {
    vector_dot(a, a).sqrt()
}

/// Copy column `col` of `mat` into a vector.
pub(crate) fn column(mat: MatRef<'_, f64>, col: usize) -> Vec<f64> {
    (0..mat.nrows()).map(|row| mat[(row, col)]).collect()
}

/// `(A + Aᵀ) / 2`, exactly symmetric.
pub fn symmetrise(a: MatRef<'_, f64>) -> Result<Mat<f64>> {
    check_dim("symmetrise (square matrix)", a.nrows(), a.ncols())?;
    let n = a.nrows();
    Ok(Mat::from_fn(n, n, |i, j| 0.5 * (a[(i, j)] + a[(j, i)])))
}

/// Lower triangular `L` with `L Lᵀ = A`.
///
/// Only the lower triangle of `a` is read. Fails on the first pivot
/// that is not strictly positive (this includes NaN pivots).
pub fn cholesky(a: MatRef<'_, f64>) -> Result<Mat<f64>> {
    check_dim("cholesky (square matrix)", a.nrows(), a.ncols())?;
    let llt = a
        .llt(Side::Lower)
        .map_err(|LltError::NonPositivePivot { index }| GpError::NotPositiveDefinite {
            pivot: index,
        })?;
    Ok(llt.L().to_owned())
}

/// Solve `L X = B` for lower triangular `L`.
pub fn solve_lower(l: MatRef<'_, f64>, b: MatRef<'_, f64>) -> Result<Mat<f64>> {
    check_dim("triangular solve (square factor)", l.nrows(), l.ncols())?;
    check_dim("triangular solve", l.nrows(), b.nrows())?;
    let mut x = b.to_owned();
    solve_lower_in_place(l, &mut x);
    Ok(x)
}

/// Solve `Lᵀ X = B` for lower triangular `L`.
pub fn solve_lower_transpose(l: MatRef<'_, f64>, b: MatRef<'_, f64>) -> Result<Mat<f64>> {
    check_dim("triangular solve (square factor)", l.nrows(), l.ncols())?;
    check_dim("triangular solve", l.nrows(), b.nrows())?;
    let mut x = b.to_owned();
    solve_lower_transpose_in_place(l, &mut x);
    Ok(x)
}

/// `x ← L⁻¹ x`. Shapes are checked by the caller.
pub(crate) fn solve_lower_in_place(l: MatRef<'_, f64>, x: &mut Mat<f64>) {
    triangular_solve::solve_lower_triangular_in_place(l, x.as_mut(), Par::Seq);
}

/// `x ← L⁻ᵀ x`. Shapes are checked by the caller.
pub(crate) fn solve_lower_transpose_in_place(l: MatRef<'_, f64>, x: &mut Mat<f64>) {
    triangular_solve::solve_upper_triangular_in_place(l.transpose(), x.as_mut(), Par::Seq);
}

/// Square root `R D^{1/2}` from the eigendecomposition `A = R D Rᵀ`.
///
/// Works for positive semidefinite matrices, where [`cholesky`] fails.
/// Small (and slightly negative) eigenvalues are set to zero.
pub fn eigen_sqrt(a: MatRef<'_, f64>, settings: SqrtSettings) -> Result<Mat<f64>> {
    let sym = symmetrise(a)?;
    let n = sym.nrows();
    let eig = sym
        .self_adjoint_eigen(Side::Lower)
        .map_err(|_| GpError::EigenDecomposition)?;

    let vecs = eig.U().to_owned();
    let vals = eig.S().column_vector().to_owned();

    let largest = vals.iter().fold(0f64, |acc, &val| acc.max(val.abs()));
    let tol = settings.eigen_tolerance * largest.max(1.);

    let mut roots = vec![0f64; n];
    for (root, &val) in roots.iter_mut().zip(vals.iter()) {
        if val < -tol {
            warn!("clipping negative eigenvalue {val} of a covariance matrix");
        }
        *root = if val > tol { val.sqrt() } else { 0. };
    }

    Ok(Mat::from_fn(n, n, |i, j| vecs[(i, j)] * roots[j]))
}

/// Cholesky factor of the symmetrised matrix.
pub fn matrix_sqrt(a: MatRef<'_, f64>) -> Result<Mat<f64>> {
    cholesky(symmetrise(a)?.as_ref())
}

/// [`matrix_sqrt`], falling back to [`eigen_sqrt`] for matrices that are
/// only positive semidefinite.
pub fn matrix_sqrt_or_eigen(a: MatRef<'_, f64>, settings: SqrtSettings) -> Result<Mat<f64>> {
    match matrix_sqrt(a) {
        Ok(l) => Ok(l),
        Err(GpError::NotPositiveDefinite { pivot }) => {
            debug!("cholesky failed at pivot {pivot}, using eigendecomposition");
            eigen_sqrt(a, settings)
        }
        Err(err) => Err(err),
    }
}

/// A `rows x cols` matrix of independent standard normal draws.
///
/// The result only depends on the arguments. Values are drawn column by
/// column from a ChaCha8 stream seeded with `seed`, so `randn(n, 1, s)`
/// is the first column of `randn(n, k, s)`.
pub fn randn(rows: usize, cols: usize, seed: u64) -> Mat<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    randn_from(&mut rng, rows, cols)
}

pub(crate) fn randn_from<R: Rng + ?Sized>(rng: &mut R, rows: usize, cols: usize) -> Mat<f64> {
    let mut out = Mat::<f64>::zeros(rows, cols);
    for j in 0..cols {
        for i in 0..rows {
            out[(i, j)] = rng.sample(StandardNormal);
        }
    }
    out
}

/// `num` evenly spaced values from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (stop - start) / ((num - 1) as f64);
            (0..num).map(|i| start + step * (i as f64)).collect()
        }
    }
}

/// Density of `N(mean, variance)` at `y`.
pub fn gaussian_pdf(mean: f64, variance: f64, y: f64) -> f64 {
    let diff = y - mean;
    (-diff * diff / (2. * variance)).exp() / (2. * PI * variance).sqrt()
}

/// Axes of the one-standard-deviation ellipse of a 2D Gaussian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    /// Half-axis along the eigenvector of the smaller eigenvalue
    pub width: f64,
    /// Half-axis along the eigenvector of the larger eigenvalue
    pub length: f64,
    pub angle_degrees: f64,
}

pub fn cov_ellipse(cov: MatRef<'_, f64>) -> Result<Ellipse> {
    check_dim("covariance ellipse (rows)", 2, cov.nrows())?;
    check_dim("covariance ellipse (cols)", 2, cov.ncols())?;
    let sym = symmetrise(cov)?;
    let eig = sym
        .self_adjoint_eigen(Side::Lower)
        .map_err(|_| GpError::EigenDecomposition)?;

    // Eigenvalues come out in ascending order.
    let vals = eig.S().column_vector().to_owned();
    let vecs = eig.U().to_owned();
    let alpha = vecs[(1, 0)].atan2(-vecs[(0, 0)]);

    Ok(Ellipse {
        width: vals[0].max(0.).sqrt(),
        length: vals[1].max(0.).sqrt(),
        angle_degrees: alpha.to_degrees(),
    })
}
