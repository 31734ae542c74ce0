use faer::Mat;

use crate::kernels::Kernel;

/// Covariance matrix `K(xs, xs)`.
///
/// The kernel is evaluated on the upper triangle only and each value is
/// copied to its mirror position, so the result is exactly symmetric
/// whatever the kernel's rounding behaviour.
pub fn cov_matrix<K: Kernel + ?Sized>(kernel: &K, xs: &[f64]) -> Mat<f64> {
    let n = xs.len();
    let mut out = Mat::<f64>::zeros(n, n);
    for i in 0..n {
        for j in i..n {
            let val = kernel.eval(xs[i], xs[j]);
            out[(i, j)] = val;
            out[(j, i)] = val;
        }
    }
    out
}

/// Cross covariance `K(xs, zs)` with one row per `xs` entry.
pub fn cross_cov<K: Kernel + ?Sized>(kernel: &K, xs: &[f64], zs: &[f64]) -> Mat<f64> {
    Mat::from_fn(xs.len(), zs.len(), |i, j| kernel.eval(xs[i], zs[j]))
}

/// Add `value` to every diagonal entry.
pub fn add_diagonal(mat: &mut Mat<f64>, value: f64) {
    let n = mat.nrows().min(mat.ncols());
    for i in 0..n {
        mat[(i, i)] += value;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::kernels::{KernelKind, KernelSelection};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[derive(Debug)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl Kernel for Counting {
        fn eval(&self, x1: f64, x2: f64) -> f64 {
            self.calls.fetch_add(1, Ordering::Relaxed);
            // deliberately order dependent
            x1 * 0.1 + x2 * 0.3
        }
    }

    #[test]
    fn evaluates_upper_triangle_only() {
        let kernel = Counting {
            calls: AtomicUsize::new(0),
        };
        let xs = [0.1, 0.7, 1.3, 2.9, 4.];
        let cov = cov_matrix(&kernel, &xs);
        assert_eq!(kernel.calls.load(Ordering::Relaxed), 5 * 6 / 2);
        for i in 0..5 {
            for j in 0..5 {
                assert_eq!(cov[(i, j)].to_bits(), cov[(j, i)].to_bits());
            }
        }
        assert_eq!(cov[(1, 3)], kernel.eval(0.7, 2.9));
    }

    #[test]
    fn cross_cov_shape() {
        let kernel = KernelSelection::default().instantiate().unwrap();
        let cross = cross_cov(&kernel, &[0., 1., 2.], &[0.5, 1.5]);
        assert_eq!((cross.nrows(), cross.ncols()), (3, 2));
        assert_eq!(cross[(2, 1)], kernel.eval(2., 1.5));
    }

    #[test]
    fn diagonal_noise() {
        let kernel = KernelSelection::new(KernelKind::Matern12).instantiate().unwrap();
        let mut cov = cov_matrix(&kernel, &[0., 1.]);
        let off = cov[(0, 1)];
        add_diagonal(&mut cov, 0.25);
        assert_eq!(cov[(0, 0)], 1.25);
        assert_eq!(cov[(1, 1)], 1.25);
        assert_eq!(cov[(0, 1)], off);
    }

    proptest! {
        #[test]
        fn cov_matrix_is_exactly_symmetric(
            mut xs in prop::collection::vec(-5f64..5f64, 0..12),
            kind in 0usize..6,
        ) {
            xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let kernel = KernelSelection::new(KernelKind::ALL[kind]).instantiate().unwrap();
            let cov = cov_matrix(&kernel, &xs);
            for i in 0..xs.len() {
                for j in 0..xs.len() {
                    prop_assert_eq!(cov[(i, j)].to_bits(), cov[(j, i)].to_bits());
                }
            }
        }
    }
}
