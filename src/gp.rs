//! Gaussian process prior and posterior.
//!
//! The posterior factors the regularised training covariance
//! `Kyy = K(X, X) + σ²I` once, as `Kyy = L Lᵀ`, and answers every query
//! with triangular solves against `L`:
//!
//! - `mean(xs) = K(xs, X) α` with `α = Kyy⁻¹ Y`
//! - `cov(xs) = K(xs, xs) - Vᵀ V` with `V = L⁻¹ K(X, xs)`
//!
//! `Kyy` is never inverted explicitly.

use faer::Mat;
use log::debug;

use crate::{
    covariance::{add_diagonal, cov_matrix, cross_cov},
    error::{check_dim, GpError, Result},
    kernels::{Kernel, SharedKernel},
    math::{
        cholesky, column, solve_lower_in_place, solve_lower_transpose_in_place, vector_dot,
    },
};

/// Mean and covariance of a process at a set of query points.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub mean: Vec<f64>,
    pub cov: Mat<f64>,
}

/// Mean and variance of the process at a single point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marginal {
    pub mean: f64,
    pub variance: f64,
}

impl Prediction {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    pub fn marginal(&self, idx: usize) -> Option<Marginal> {
        let mean = *self.mean.get(idx)?;
        Some(Marginal {
            mean,
            variance: self.cov[(idx, idx)],
        })
    }

    pub fn std_devs(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| self.cov[(i, i)].max(0.).sqrt())
            .collect()
    }

    /// Joint distribution of the process at two of the query points.
    pub fn pair(&self, i: usize, j: usize) -> Option<([f64; 2], Mat<f64>)> {
        let idx = [i, j];
        let mean = [*self.mean.get(i)?, *self.mean.get(j)?];
        let cov = Mat::from_fn(2, 2, |r, c| self.cov[(idx[r], idx[c])]);
        Some((mean, cov))
    }
}

pub trait GaussianProcess {
    fn mean(&self, xs: &[f64]) -> Vec<f64>;
    fn cov(&self, xs: &[f64]) -> Mat<f64>;

    fn predict(&self, xs: &[f64]) -> Prediction {
        Prediction {
            mean: self.mean(xs),
            cov: self.cov(xs),
        }
    }
}

/// Zero-mean process defined by its kernel alone.
#[derive(Debug, Clone)]
pub struct Prior {
    kernel: SharedKernel,
}

impl Prior {
    pub fn new(kernel: SharedKernel) -> Self {
        Self { kernel }
    }

    pub fn kernel(&self) -> &SharedKernel {
        &self.kernel
    }
}

impl GaussianProcess for Prior {
    fn mean(&self, xs: &[f64]) -> Vec<f64> {
        vec![0.; xs.len()]
    }

    fn cov(&self, xs: &[f64]) -> Mat<f64> {
        cov_matrix(&self.kernel, xs)
    }
}

/// Process conditioned on noisy observations `Y` at inputs `X`.
#[derive(Debug, Clone)]
pub struct Posterior {
    kernel: SharedKernel,
    inputs: Vec<f64>,
    noise_variance: f64,
    /// Lower Cholesky factor of `K(X, X) + σ²I`
    chol: Mat<f64>,
    alpha: Vec<f64>,
}

impl Posterior {
    pub fn new(
        kernel: SharedKernel,
        inputs: &[f64],
        targets: &[f64],
        noise_variance: f64,
    ) -> Result<Self> {
        check_dim("posterior targets", inputs.len(), targets.len())?;
        if !(noise_variance.is_finite() && noise_variance >= 0.) {
            return Err(GpError::InvalidHyperparameter {
                name: "noise_variance",
                value: noise_variance,
            });
        }

        let mut kyy = cov_matrix(&kernel, inputs);
        add_diagonal(&mut kyy, noise_variance);
        let chol = cholesky(kyy.as_ref())?;

        let mut alpha = Mat::from_fn(targets.len(), 1, |i, _| targets[i]);
        solve_lower_in_place(chol.as_ref(), &mut alpha);
        solve_lower_transpose_in_place(chol.as_ref(), &mut alpha);
        let alpha = column(alpha.as_ref(), 0);

        debug!(
            "conditioned GP on {} observations with noise variance {}",
            inputs.len(),
            noise_variance
        );

        Ok(Self {
            kernel,
            inputs: inputs.to_vec(),
            noise_variance,
            chol,
            alpha,
        })
    }

    pub fn kernel(&self) -> &SharedKernel {
        &self.kernel
    }

    pub fn inputs(&self) -> &[f64] {
        &self.inputs
    }

    pub fn noise_variance(&self) -> f64 {
        self.noise_variance
    }

    fn mean_from_cross(&self, cross: &Mat<f64>) -> Vec<f64> {
        (0..cross.ncols())
            .map(|j| vector_dot(&column(cross.as_ref(), j), &self.alpha))
            .collect()
    }

    /// Consumes `K(X, xs)` and turns it into `V = L⁻¹ K(X, xs)` in place.
    fn cov_from_cross(&self, xs: &[f64], mut cross: Mat<f64>) -> Mat<f64> {
        solve_lower_in_place(self.chol.as_ref(), &mut cross);
        let v: Vec<Vec<f64>> = (0..xs.len()).map(|j| column(cross.as_ref(), j)).collect();

        let mut cov = cov_matrix(&self.kernel, xs);
        for i in 0..xs.len() {
            for j in i..xs.len() {
                let mut val = cov[(i, j)] - vector_dot(&v[i], &v[j]);
                if i == j {
                    // round-off can push tiny variances below zero
                    val = val.max(0.);
                }
                cov[(i, j)] = val;
                cov[(j, i)] = val;
            }
        }
        cov
    }

    /// Predictive distribution of noisy observations at `xs`.
    pub fn predict_observed(&self, xs: &[f64]) -> Prediction {
        let mut prediction = self.predict(xs);
        add_diagonal(&mut prediction.cov, self.noise_variance);
        prediction
    }
}

impl GaussianProcess for Posterior {
    fn mean(&self, xs: &[f64]) -> Vec<f64> {
        self.mean_from_cross(&cross_cov(&self.kernel, &self.inputs, xs))
    }

    fn cov(&self, xs: &[f64]) -> Mat<f64> {
        self.cov_from_cross(xs, cross_cov(&self.kernel, &self.inputs, xs))
    }

    fn predict(&self, xs: &[f64]) -> Prediction {
        let cross = cross_cov(&self.kernel, &self.inputs, xs);
        let mean = self.mean_from_cross(&cross);
        let cov = self.cov_from_cross(xs, cross);
        Prediction { mean, cov }
    }
}

/// The posterior covariance between two inputs.
impl Kernel for Posterior {
    fn eval(&self, x1: f64, x2: f64) -> f64 {
        let mut cross = cross_cov(&self.kernel, &self.inputs, &[x1, x2]);
        solve_lower_in_place(self.chol.as_ref(), &mut cross);
        let v1 = column(cross.as_ref(), 0);
        let v2 = column(cross.as_ref(), 1);
        self.kernel.eval(x1, x2) - vector_dot(&v1, &v2)
    }
}

/// A prior or a posterior, as selected by the user.
#[derive(Debug, Clone)]
pub enum GpModel {
    Prior(Prior),
    Posterior(Posterior),
}

impl GpModel {
    pub fn kernel(&self) -> &SharedKernel {
        match self {
            GpModel::Prior(prior) => prior.kernel(),
            GpModel::Posterior(posterior) => posterior.kernel(),
        }
    }

    /// Like [`GaussianProcess::predict`], optionally including observation
    /// noise. A prior has no noise, so the flag only affects posteriors.
    pub fn predict_with_noise(&self, xs: &[f64], with_noise: bool) -> Prediction {
        match self {
            GpModel::Posterior(posterior) if with_noise => posterior.predict_observed(xs),
            _ => self.predict(xs),
        }
    }
}

impl GaussianProcess for GpModel {
    fn mean(&self, xs: &[f64]) -> Vec<f64> {
        match self {
            GpModel::Prior(prior) => prior.mean(xs),
            GpModel::Posterior(posterior) => posterior.mean(xs),
        }
    }

    fn cov(&self, xs: &[f64]) -> Mat<f64> {
        match self {
            GpModel::Prior(prior) => prior.cov(xs),
            GpModel::Posterior(posterior) => posterior.cov(xs),
        }
    }

    fn predict(&self, xs: &[f64]) -> Prediction {
        match self {
            GpModel::Prior(prior) => prior.predict(xs),
            GpModel::Posterior(posterior) => posterior.predict(xs),
        }
    }
}

pub fn prior(kernel: SharedKernel) -> GpModel {
    GpModel::Prior(Prior::new(kernel))
}

/// Condition a GP on observations.
///
/// Fails with [`GpError::NotPositiveDefinite`] if `K(X, X) + σ²I` cannot
/// be factored, e.g. for repeated inputs without noise.
pub fn fit_posterior(
    kernel: SharedKernel,
    inputs: &[f64],
    targets: &[f64],
    noise_variance: f64,
) -> Result<GpModel> {
    Ok(GpModel::Posterior(Posterior::new(
        kernel,
        inputs,
        targets,
        noise_variance,
    )?))
}
