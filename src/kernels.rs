//! Covariance functions on the real line.
//!
//! Every kernel captures its hyperparameters at construction and is a
//! pure symmetric function of two inputs afterwards. Stationary kernels
//! only ever see `|x1 - x2|`, so they evaluate to exactly their variance
//! on the diagonal.

use std::{f64::consts::PI, fmt::Debug, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::error::{check_dim, GpError, Result};

/// A covariance function `k(x1, x2)`.
///
/// Implementations must be symmetric and deterministic.
pub trait Kernel: Debug + Send + Sync {
    fn eval(&self, x1: f64, x2: f64) -> f64;
}

pub type SharedKernel = Arc<dyn Kernel>;

impl<K: Kernel + ?Sized> Kernel for Arc<K> {
    fn eval(&self, x1: f64, x2: f64) -> f64 {
        (**self).eval(x1, x2)
    }
}

impl<K: Kernel + ?Sized> Kernel for Box<K> {
    fn eval(&self, x1: f64, x2: f64) -> f64 {
        (**self).eval(x1, x2)
    }
}

fn positive(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0. {
        Ok(value)
    } else {
        Err(GpError::InvalidHyperparameter { name, value })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0. {
        Ok(value)
    } else {
        Err(GpError::InvalidHyperparameter { name, value })
    }
}

fn finite(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GpError::InvalidHyperparameter { name, value })
    }
}

/// Exponential kernel, `σ² exp(-|d|/ℓ)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matern12 {
    variance: f64,
    lengthscale: f64,
}

impl Matern12 {
    pub fn new(variance: f64, lengthscale: f64) -> Result<Self> {
        Ok(Self {
            variance: positive("variance", variance)?,
            lengthscale: positive("lengthscale", lengthscale)?,
        })
    }
}

impl Kernel for Matern12 {
    fn eval(&self, x1: f64, x2: f64) -> f64 {
        let dist = (x1 - x2).abs();
        self.variance * (-dist / self.lengthscale).exp()
    }
}

/// `σ² (1 + √3|d|/ℓ) exp(-√3|d|/ℓ)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matern32 {
    variance: f64,
    lengthscale: f64,
}

impl Matern32 {
    pub fn new(variance: f64, lengthscale: f64) -> Result<Self> {
        Ok(Self {
            variance: positive("variance", variance)?,
            lengthscale: positive("lengthscale", lengthscale)?,
        })
    }
}

impl Kernel for Matern32 {
    fn eval(&self, x1: f64, x2: f64) -> f64 {
        let scaled = 3f64.sqrt() * (x1 - x2).abs() / self.lengthscale;
        self.variance * (1. + scaled) * (-scaled).exp()
    }
}

/// `σ² (1 + √5|d|/ℓ + 5d²/3ℓ²) exp(-√5|d|/ℓ)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matern52 {
    variance: f64,
    lengthscale: f64,
}

impl Matern52 {
    pub fn new(variance: f64, lengthscale: f64) -> Result<Self> {
        Ok(Self {
            variance: positive("variance", variance)?,
            lengthscale: positive("lengthscale", lengthscale)?,
        })
    }
}

impl Kernel for Matern52 {
    fn eval(&self, x1: f64, x2: f64) -> f64 {
        let scaled = 5f64.sqrt() * (x1 - x2).abs() / self.lengthscale;
        self.variance * (1. + scaled + scaled * scaled / 3.) * (-scaled).exp()
    }
}

/// `σ² exp(-d²/2ℓ²)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquaredExponential {
    variance: f64,
    two_sq_lengthscale: f64,
}

impl SquaredExponential {
    pub fn new(variance: f64, lengthscale: f64) -> Result<Self> {
        let lengthscale = positive("lengthscale", lengthscale)?;
        Ok(Self {
            variance: positive("variance", variance)?,
            two_sq_lengthscale: 2. * lengthscale * lengthscale,
        })
    }
}

impl Kernel for SquaredExponential {
    fn eval(&self, x1: f64, x2: f64) -> f64 {
        let diff = x1 - x2;
        self.variance * (-diff * diff / self.two_sq_lengthscale).exp()
    }
}

/// `σ² exp(-2 sin²(π|d|/p) / ℓ²)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Periodic {
    variance: f64,
    sq_lengthscale: f64,
    period: f64,
}

impl Periodic {
    pub fn new(variance: f64, lengthscale: f64, period: f64) -> Result<Self> {
        let lengthscale = positive("lengthscale", lengthscale)?;
        Ok(Self {
            variance: positive("variance", variance)?,
            sq_lengthscale: lengthscale * lengthscale,
            period: positive("period", period)?,
        })
    }
}

impl Kernel for Periodic {
    fn eval(&self, x1: f64, x2: f64) -> f64 {
        let sin = (PI * (x1 - x2).abs() / self.period).sin();
        self.variance * (-2. * sin * sin / self.sq_lengthscale).exp()
    }
}

/// `σ² (x - c)(x' - c) + b`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linear {
    variance: f64,
    bias: f64,
    center: f64,
}

impl Linear {
    pub fn new(variance: f64, bias: f64, center: f64) -> Result<Self> {
        Ok(Self {
            variance: positive("variance", variance)?,
            bias: non_negative("bias", bias)?,
            center: finite("center", center)?,
        })
    }
}

impl Kernel for Linear {
    fn eval(&self, x1: f64, x2: f64) -> f64 {
        self.bias + self.variance * ((x1 - self.center) * (x2 - self.center))
    }
}

/// `σ²` where `x == x'`, zero elsewhere.
///
/// Inputs are compared with exact float equality, so only exactly
/// repeated inputs are correlated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct White {
    variance: f64,
}

impl White {
    pub fn new(variance: f64) -> Result<Self> {
        Ok(Self {
            variance: non_negative("variance", variance)?,
        })
    }
}

impl Kernel for White {
    fn eval(&self, x1: f64, x2: f64) -> f64 {
        if x1 == x2 {
            self.variance
        } else {
            0.
        }
    }
}

/// Pointwise product of kernels. The empty product is the constant 1.
#[derive(Debug, Clone, Default)]
pub struct Product {
    kernels: Vec<SharedKernel>,
}

impl Kernel for Product {
    fn eval(&self, x1: f64, x2: f64) -> f64 {
        self.kernels
            .iter()
            .fold(1., |acc, kernel| acc * kernel.eval(x1, x2))
    }
}

/// Pointwise sum of kernels. The empty sum is the constant 0.
#[derive(Debug, Clone, Default)]
pub struct Sum {
    kernels: Vec<SharedKernel>,
}

impl Kernel for Sum {
    fn eval(&self, x1: f64, x2: f64) -> f64 {
        self.kernels
            .iter()
            .fold(0., |acc, kernel| acc + kernel.eval(x1, x2))
    }
}

pub fn product(kernels: impl IntoIterator<Item = SharedKernel>) -> Product {
    Product {
        kernels: kernels.into_iter().collect(),
    }
}

pub fn sum(kernels: impl IntoIterator<Item = SharedKernel>) -> Sum {
    Sum {
        kernels: kernels.into_iter().collect(),
    }
}

/// Description of one hyperparameter for a user interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpec {
    pub name: &'static str,
    /// LaTeX symbol
    pub formula: &'static str,
    pub default: f64,
    /// Suggested slider range and increment
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// Smallest accepted value, if any
    pub lower_bound: Option<f64>,
}

const VARIANCE: ParameterSpec = ParameterSpec {
    name: "variance",
    formula: "\\sigma^2",
    default: 1.0,
    min: 0.0,
    max: 4.0,
    step: 0.01,
    lower_bound: Some(1e-6),
};

const LENGTHSCALE: ParameterSpec = ParameterSpec {
    name: "lengthscale",
    formula: "\\ell",
    default: 1.0,
    min: 0.05,
    max: 10.0,
    step: 0.01,
    lower_bound: Some(1e-3),
};

const PERIOD: ParameterSpec = ParameterSpec {
    name: "period",
    formula: "p",
    default: 2.0,
    min: 0.1,
    max: 10.0,
    step: 0.01,
    lower_bound: Some(1e-3),
};

const BIAS: ParameterSpec = ParameterSpec {
    name: "bias",
    formula: "\\sigma^2_b",
    default: 0.0,
    min: 0.0,
    max: 4.0,
    step: 0.01,
    lower_bound: Some(0.0),
};

const CENTER: ParameterSpec = ParameterSpec {
    name: "center",
    formula: "x_c",
    default: 2.0,
    min: -2.0,
    max: 8.0,
    step: 0.1,
    lower_bound: None,
};

/// The kernels offered for selection, in catalogue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelKind {
    Matern12,
    Matern32,
    Matern52,
    SquaredExponential,
    Periodic,
    Linear,
}

impl KernelKind {
    pub const ALL: [KernelKind; 6] = [
        KernelKind::Matern12,
        KernelKind::Matern32,
        KernelKind::Matern52,
        KernelKind::SquaredExponential,
        KernelKind::Periodic,
        KernelKind::Linear,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            KernelKind::Matern12 => "exponential (Matérn 1/2)",
            KernelKind::Matern32 => "Matérn 3/2",
            KernelKind::Matern52 => "Matérn 5/2",
            KernelKind::SquaredExponential => "squared-exponential",
            KernelKind::Periodic => "periodic",
            KernelKind::Linear => "linear",
        }
    }

    pub fn formula(&self) -> &'static str {
        match self {
            KernelKind::Matern12 => "\\sigma^2 \\exp\\Big(-\\frac{|x-x'|}{\\ell}\\Big)",
            KernelKind::Matern32 => {
                "\\sigma^2 \\big( 1 + \\frac{\\sqrt{3} |x-x'|}{\\ell} \\big) \\exp\\Big(-\\frac{\\sqrt{3} |x-x'|}{\\ell}\\Big)"
            }
            KernelKind::Matern52 => {
                "\\sigma^2 \\big( 1 + \\frac{\\sqrt{5} |x-x'|}{\\ell} + \\frac{5 (x-x')^2}{3 \\ell^2} \\big) \\exp\\Big(-\\frac{\\sqrt{5} |x-x'|}{\\ell}\\Big)"
            }
            KernelKind::SquaredExponential => {
                "\\sigma^2 \\exp\\Big(-\\frac{(x-x')^2}{2\\ell^2}\\Big)"
            }
            KernelKind::Periodic => {
                "\\sigma^2 \\exp\\Big(- 2 \\frac{\\sin^2(\\pi |x-x'|/p)}{\\ell^2}\\Big)"
            }
            KernelKind::Linear => "\\sigma^2 (x - x_c)(x' - x_c) + \\sigma^2_b",
        }
    }

    /// Hyperparameters in the order [`KernelKind::build`] expects them.
    pub fn parameters(&self) -> &'static [ParameterSpec] {
        match self {
            KernelKind::Matern12
            | KernelKind::Matern32
            | KernelKind::Matern52
            | KernelKind::SquaredExponential => &[VARIANCE, LENGTHSCALE],
            KernelKind::Periodic => &[VARIANCE, LENGTHSCALE, PERIOD],
            KernelKind::Linear => &[VARIANCE, BIAS, CENTER],
        }
    }

    pub fn build(&self, params: &[f64]) -> Result<SharedKernel> {
        check_dim(
            "kernel hyperparameters",
            self.parameters().len(),
            params.len(),
        )?;
        let kernel: SharedKernel = match *self {
            KernelKind::Matern12 => Arc::new(Matern12::new(params[0], params[1])?),
            KernelKind::Matern32 => Arc::new(Matern32::new(params[0], params[1])?),
            KernelKind::Matern52 => Arc::new(Matern52::new(params[0], params[1])?),
            KernelKind::SquaredExponential => {
                Arc::new(SquaredExponential::new(params[0], params[1])?)
            }
            KernelKind::Periodic => Arc::new(Periodic::new(params[0], params[1], params[2])?),
            KernelKind::Linear => Arc::new(Linear::new(params[0], params[1], params[2])?),
        };
        Ok(kernel)
    }
}

/// Instantiate a kernel from its hyperparameters in catalogue order.
pub fn make_kernel(kind: KernelKind, params: &[f64]) -> Result<SharedKernel> {
    kind.build(params)
}

/// A kernel kind together with the current hyperparameter values.
///
/// There is always one value per entry of [`KernelKind::parameters`];
/// deserialization rejects anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredSelection")]
pub struct KernelSelection {
    kind: KernelKind,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct StoredSelection {
    kind: KernelKind,
    values: Vec<f64>,
}

impl TryFrom<StoredSelection> for KernelSelection {
    type Error = GpError;

    fn try_from(stored: StoredSelection) -> Result<Self> {
        Self::with_values(stored.kind, stored.values)
    }
}

impl KernelSelection {
    pub fn new(kind: KernelKind) -> Self {
        Self {
            kind,
            values: kind.parameters().iter().map(|p| p.default).collect(),
        }
    }

    /// A selection with explicit hyperparameters in catalogue order.
    ///
    /// The values are only checked for count here; [`Self::instantiate`]
    /// validates their ranges.
    pub fn with_values(kind: KernelKind, values: Vec<f64>) -> Result<Self> {
        check_dim("kernel hyperparameters", kind.parameters().len(), values.len())?;
        Ok(Self { kind, values })
    }

    pub fn kind(&self) -> KernelKind {
        self.kind
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.kind
            .parameters()
            .iter()
            .position(|p| p.name == name)
            .and_then(|idx| self.values.get(idx).copied())
    }

    /// Update a hyperparameter, raising it to the lower bound if needed.
    ///
    /// Returns the stored value, or `None` if the kernel has no
    /// parameter called `name`.
    pub fn set(&mut self, name: &str, value: f64) -> Option<f64> {
        let idx = self.kind.parameters().iter().position(|p| p.name == name)?;
        let spec = &self.kind.parameters()[idx];
        let value = match spec.lower_bound {
            Some(bound) => value.max(bound),
            None => value,
        };
        let slot = self.values.get_mut(idx)?;
        *slot = value;
        Some(value)
    }

    pub fn instantiate(&self) -> Result<SharedKernel> {
        self.kind.build(&self.values)
    }
}

impl Default for KernelSelection {
    fn default() -> Self {
        Self::new(KernelKind::SquaredExponential)
    }
}

/// The selectable kernels with default hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelChoices {
    pub choices: Vec<KernelSelection>,
    /// Index of the initially selected kernel
    pub selected: usize,
}

pub fn kernel_choices() -> KernelChoices {
    let choices: Vec<_> = KernelKind::ALL
        .iter()
        .map(|&kind| KernelSelection::new(kind))
        .collect();
    let selected = KernelKind::ALL
        .iter()
        .position(|&kind| kind == KernelKind::SquaredExponential)
        .unwrap_or(0);
    KernelChoices { choices, selected }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn all_kernels() -> Vec<SharedKernel> {
        let mut kernels: Vec<SharedKernel> = KernelKind::ALL
            .iter()
            .map(|kind| KernelSelection::new(*kind).instantiate().unwrap())
            .collect();
        kernels.push(Arc::new(White::new(0.3).unwrap()));
        kernels.push(Arc::new(product(kernels.clone())));
        kernels.push(Arc::new(sum(kernels.clone())));
        kernels
    }

    #[test]
    fn stationary_diagonal_is_variance() {
        let variance = 1.7;
        let kernels: Vec<SharedKernel> = vec![
            Arc::new(Matern12::new(variance, 0.3).unwrap()),
            Arc::new(Matern32::new(variance, 0.3).unwrap()),
            Arc::new(Matern52::new(variance, 0.3).unwrap()),
            Arc::new(SquaredExponential::new(variance, 0.3).unwrap()),
            Arc::new(Periodic::new(variance, 0.3, 1.1).unwrap()),
            Arc::new(White::new(variance).unwrap()),
        ];
        for kernel in kernels {
            for x in [-3.2, 0., 1e-12, 5.5] {
                assert_eq!(kernel.eval(x, x), variance);
            }
        }
    }

    #[test]
    fn closed_forms() {
        let k = Matern12::new(2., 0.5).unwrap();
        assert_abs_diff_eq!(k.eval(0., 1.), 2. * (-2f64).exp(), epsilon = 1e-15);

        let k = Matern32::new(1., 1.).unwrap();
        let s = 3f64.sqrt();
        assert_abs_diff_eq!(k.eval(1., 2.), (1. + s) * (-s).exp(), epsilon = 1e-15);

        let k = Matern52::new(1., 2.).unwrap();
        let s = 5f64.sqrt() / 2.;
        assert_abs_diff_eq!(
            k.eval(0., 1.),
            (1. + s + 5. / 12.) * (-s).exp(),
            epsilon = 1e-15
        );

        let k = SquaredExponential::new(3., 2.).unwrap();
        assert_abs_diff_eq!(k.eval(1., 3.), 3. * (-0.5f64).exp(), epsilon = 1e-15);

        let k = Periodic::new(1., 1., 2.).unwrap();
        // one full period apart
        assert_abs_diff_eq!(k.eval(0.3, 2.3), 1., epsilon = 1e-12);
        assert_abs_diff_eq!(k.eval(0., 1.), (-2f64).exp(), epsilon = 1e-15);

        let k = Linear::new(2., 0.5, 1.).unwrap();
        assert_eq!(k.eval(3., -1.), 0.5 + 2. * 2. * -2.);

        let k = White::new(0.1).unwrap();
        assert_eq!(k.eval(1., 1. + 1e-9), 0.);
    }

    #[test]
    fn empty_compositions() {
        assert_eq!(product(vec![]).eval(0.3, 1.2), 1.);
        assert_eq!(sum(vec![]).eval(0.3, 1.2), 0.);

        let a: SharedKernel = Arc::new(SquaredExponential::new(2., 1.).unwrap());
        let b: SharedKernel = Arc::new(Linear::new(1., 0.5, 0.).unwrap());
        let (x1, x2) = (0.4, -1.3);
        assert_eq!(
            product(vec![a.clone(), b.clone()]).eval(x1, x2),
            a.eval(x1, x2) * b.eval(x1, x2)
        );
        assert_eq!(sum(vec![a.clone(), b.clone()]).eval(x1, x2), a.eval(x1, x2) + b.eval(x1, x2));
    }

    #[test]
    fn invalid_hyperparameters() {
        assert_eq!(
            Matern12::new(0., 1.),
            Err(GpError::InvalidHyperparameter {
                name: "variance",
                value: 0.
            })
        );
        assert!(SquaredExponential::new(1., -1.).is_err());
        assert!(Periodic::new(1., 1., 0.).is_err());
        assert!(Linear::new(1., -0.1, 0.).is_err());
        assert!(Linear::new(1., 0., f64::NAN).is_err());
        assert!(make_kernel(KernelKind::Periodic, &[1., 1.]).is_err());
        assert!(make_kernel(KernelKind::Periodic, &[1., 1., 3.]).is_ok());
    }

    #[test]
    fn catalogue() {
        let choices = kernel_choices();
        assert_eq!(choices.choices.len(), 6);
        assert_eq!(
            choices.choices[choices.selected].kind(),
            KernelKind::SquaredExponential
        );
        assert_eq!(KernelSelection::default().kind(), KernelKind::SquaredExponential);
        for choice in &choices.choices {
            assert_eq!(choice.values().len(), choice.kind().parameters().len());
            assert!(!choice.kind().description().is_empty());
            assert!(choice.kind().formula().contains("\\sigma^2"));
            assert!(choice.instantiate().is_ok());
        }
    }

    #[test]
    fn selection_clamps_to_lower_bound() {
        let mut selection = KernelSelection::new(KernelKind::Periodic);
        assert_eq!(selection.value("period"), Some(2.));
        assert_eq!(selection.set("lengthscale", 0.), Some(1e-3));
        assert_eq!(selection.set("variance", 2.5), Some(2.5));
        assert_eq!(selection.set("center", 1.), None);
        assert_eq!(selection.values(), &[2.5, 1e-3, 2.]);
        assert!(selection.instantiate().is_ok());

        let mut linear = KernelSelection::new(KernelKind::Linear);
        assert_eq!(linear.set("center", -40.), Some(-40.));
    }

    #[test]
    fn restored_selection_needs_every_value() {
        let stored = StoredSelection {
            kind: KernelKind::Periodic,
            values: vec![],
        };
        assert_eq!(
            KernelSelection::try_from(stored),
            Err(GpError::DimensionMismatch {
                context: "kernel hyperparameters",
                expected: 3,
                found: 0,
            })
        );

        let stored = StoredSelection {
            kind: KernelKind::Periodic,
            values: vec![1.5, 0.5, 3.],
        };
        let selection = KernelSelection::try_from(stored).unwrap();
        assert_eq!(selection.value("period"), Some(3.));
        assert_eq!(
            KernelSelection::with_values(KernelKind::Matern12, vec![1., 2.]).unwrap(),
            KernelSelection {
                kind: KernelKind::Matern12,
                values: vec![1., 2.],
            }
        );
    }

    proptest! {
        #[test]
        fn kernels_are_symmetric(a in -10f64..10f64, b in -10f64..10f64) {
            for kernel in all_kernels() {
                prop_assert_eq!(kernel.eval(a, b).to_bits(), kernel.eval(b, a).to_bits());
            }
        }
    }
}
