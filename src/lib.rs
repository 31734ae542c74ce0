//! Numerical core for interactive Gaussian process visualizations.
//!
//! Build a kernel, condition a GP on observations, and turn its predictive
//! distribution into samples that can be animated: looping trajectories,
//! HMC driven chains, and spline interpolation between keyframes.
//!
//! Matrices are `faer::Mat<f64>` indexed `(row, col)`; independent
//! samples and chains are columns.

pub(crate) mod covariance;
pub(crate) mod error;
pub(crate) mod gp;
pub(crate) mod hmc;
pub(crate) mod kernels;
pub(crate) mod math;
pub(crate) mod mvn;
pub(crate) mod search;
pub(crate) mod spline;

pub use covariance::{add_diagonal, cov_matrix, cross_cov};
pub use error::{GpError, Result};
pub use gp::{
    fit_posterior, prior, GaussianProcess, GpModel, Marginal, Posterior, Prediction, Prior,
};
pub use hmc::{hmc_step, AcceptanceRate, HmcSettings, HmcState, HmcStepStats};
pub use kernels::{
    kernel_choices, make_kernel, product, sum, Kernel, KernelChoices, KernelKind,
    KernelSelection, Linear, Matern12, Matern32, Matern52, ParameterSpec, Periodic, Product,
    SharedKernel, SquaredExponential, Sum, White,
};
pub use math::{
    cholesky, cov_ellipse, eigen_sqrt, gaussian_pdf, linspace, matrix_sqrt, matrix_sqrt_or_eigen,
    randn, solve_lower, solve_lower_transpose, symmetrise, Ellipse, SqrtSettings,
};
pub use mvn::{sample_mvn, sample_mvn_trajectory, Mvn, Trajectory};
pub use search::{bracket, lower_bound, Bracket};
pub use spline::{build_catmull_rom, CatmullRom, CoincidentKnots};
