//! Multivariate normal draws and looping sample animations.
//!
//! A draw from `N(μ, S Sᵀ)` is `μ + S v` for a standard normal `v`, so
//! everything here is expressed through a whitened vector `v` and the
//! square root `S` of the covariance. Missing or mismatched whitened input
//! yields `None` rather than an error: the caller simply has nothing to
//! draw yet.

use std::f64::consts::PI;

use faer::{Mat, MatRef};
use log::debug;

use crate::{
    error::{check_dim, Result},
    gp::Prediction,
    math::{axpy, column, matrix_sqrt_or_eigen, norm, randn, vector_dot, SqrtSettings},
};

/// `mean + cov_sqrt · v`, for every column of `v`.
///
/// Returns `Ok(None)` if `v` is absent or has the wrong number of rows.
pub fn sample_mvn(
    mean: &[f64],
    cov_sqrt: MatRef<'_, f64>,
    v: Option<MatRef<'_, f64>>,
) -> Result<Option<Mat<f64>>> {
    check_dim("mvn mean", cov_sqrt.nrows(), mean.len())?;
    Ok(transform(mean, cov_sqrt, v))
}

fn transform(mean: &[f64], cov_sqrt: MatRef<'_, f64>, v: Option<MatRef<'_, f64>>) -> Option<Mat<f64>> {
    let v = v.filter(|v| v.nrows() == cov_sqrt.ncols())?;
    let mut out = cov_sqrt * v;
    for j in 0..out.ncols() {
        for (i, &mu) in mean.iter().enumerate() {
            out[(i, j)] += mu;
        }
    }
    Some(out)
}

/// Looping animation of one sample, see [`Mvn::trajectory`].
pub fn sample_mvn_trajectory(
    mean: &[f64],
    cov_sqrt: MatRef<'_, f64>,
    v: Option<&[f64]>,
    num_frames: usize,
    seed: u64,
) -> Result<Option<Trajectory>> {
    let mvn = Mvn::new(mean.to_vec(), cov_sqrt.to_owned())?;
    Ok(mvn.trajectory(v, num_frames, seed))
}

/// A multivariate normal given by its mean and a covariance square root.
#[derive(Debug, Clone)]
pub struct Mvn {
    mean: Vec<f64>,
    cov_sqrt: Mat<f64>,
}

impl Mvn {
    pub fn new(mean: Vec<f64>, cov_sqrt: Mat<f64>) -> Result<Self> {
        check_dim("mvn mean", cov_sqrt.nrows(), mean.len())?;
        Ok(Self { mean, cov_sqrt })
    }

    /// Use the Cholesky factor of the predicted covariance, or its
    /// eigendecomposition if the covariance is only semidefinite.
    pub fn from_prediction(prediction: &Prediction, settings: SqrtSettings) -> Result<Self> {
        let cov_sqrt = matrix_sqrt_or_eigen(prediction.cov.as_ref(), settings)?;
        Self::new(prediction.mean.clone(), cov_sqrt)
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Length of the whitened vectors this distribution accepts.
    pub fn whitened_dim(&self) -> usize {
        self.cov_sqrt.ncols()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn cov_sqrt(&self) -> MatRef<'_, f64> {
        self.cov_sqrt.as_ref()
    }

    /// One sample per column of `v`.
    pub fn sample(&self, v: Option<MatRef<'_, f64>>) -> Option<Mat<f64>> {
        transform(&self.mean, self.cov_sqrt.as_ref(), v)
    }

    /// `num_samples` independent samples from a seeded normal source.
    pub fn sample_seeded(&self, num_samples: usize, seed: u64) -> Mat<f64> {
        let v = randn(self.whitened_dim(), num_samples, seed);
        let mut out = &self.cov_sqrt * &v;
        for j in 0..num_samples {
            for (i, &mu) in self.mean.iter().enumerate() {
                out[(i, j)] += mu;
            }
        }
        out
    }

    /// A periodic animation of the sample `mean + S v`.
    ///
    /// The whitened vector is rotated on the great circle through `v` and
    /// a random direction `t̂ ⟂ v` drawn with `seed`, keeping its length:
    /// frame `i` uses `(cos θᵢ v̂ + sin θᵢ t̂)‖v‖` with `θᵢ = 2πi/N`. If `v`
    /// is itself standard normal and independent of `seed`, every frame
    /// is an exact draw from the distribution. Frame `N` would coincide
    /// with frame 0 and is not produced.
    ///
    /// A zero `v` gives `N` copies of the mean. If no orthogonal direction
    /// exists (one-dimensional `v`) the sample oscillates along `v`.
    pub fn trajectory(&self, v: Option<&[f64]>, num_frames: usize, seed: u64) -> Option<Trajectory> {
        let v = v.filter(|v| v.len() == self.whitened_dim())?;
        let dim = v.len();
        let v_norm = norm(v);

        let mut v_scaled = vec![0f64; dim];
        let mut t_scaled = vec![0f64; dim];

        if v_norm > 0. {
            let v_hat: Vec<f64> = v.iter().map(|x| x / v_norm).collect();
            let mut t = column(randn(dim, 1, seed).as_ref(), 0);
            let proj = vector_dot(&t, &v_hat);
            axpy(&v_hat, &mut t, -proj);
            let t_norm = norm(&t);

            v_scaled.copy_from_slice(v);
            if t_norm > 0. && t_norm.is_finite() {
                t_scaled
                    .iter_mut()
                    .zip(t.iter())
                    .for_each(|(out, &t)| *out = t / t_norm * v_norm);
            } else {
                debug!("no direction orthogonal to the sample, animating along it");
            }
        }

        let to_data = |w: &[f64]| -> Vec<f64> {
            let w = Mat::from_fn(dim, 1, |i, _| w[i]);
            column((&self.cov_sqrt * &w).as_ref(), 0)
        };

        Some(Trajectory {
            mean: self.mean.clone(),
            cos_part: to_data(&v_scaled),
            sin_part: to_data(&t_scaled),
            v_scaled,
            t_scaled,
            num_frames,
        })
    }
}

/// Frames of a looping sample animation.
///
/// Frames are computed on demand, so the sequence can be iterated any
/// number of times, and `at_angle` gives positions between frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    mean: Vec<f64>,
    /// `S v`
    cos_part: Vec<f64>,
    /// `S t̂ ‖v‖`
    sin_part: Vec<f64>,
    v_scaled: Vec<f64>,
    t_scaled: Vec<f64>,
    num_frames: usize,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.num_frames
    }

    pub fn is_empty(&self) -> bool {
        self.num_frames == 0
    }

    pub fn angle(&self, idx: usize) -> f64 {
        2. * PI * (idx as f64) / (self.num_frames as f64)
    }

    pub fn at_angle(&self, theta: f64) -> Vec<f64> {
        let (sin, cos) = theta.sin_cos();
        self.mean
            .iter()
            .zip(self.cos_part.iter().zip(self.sin_part.iter()))
            .map(|(mu, (a, b))| mu + cos * a + sin * b)
            .collect()
    }

    /// The whitened vector behind [`Trajectory::at_angle`].
    pub fn whitened_at_angle(&self, theta: f64) -> Vec<f64> {
        let (sin, cos) = theta.sin_cos();
        self.v_scaled
            .iter()
            .zip(self.t_scaled.iter())
            .map(|(v, t)| cos * v + sin * t)
            .collect()
    }

    pub fn frame(&self, idx: usize) -> Option<Vec<f64>> {
        (idx < self.num_frames).then(|| self.at_angle(self.angle(idx)))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Vec<f64>> + '_ {
        (0..self.num_frames).map(move |idx| self.at_angle(self.angle(idx)))
    }

    pub fn to_frames(&self) -> Vec<Vec<f64>> {
        self.iter().collect()
    }
}
