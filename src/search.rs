//! Lookup of values on a sorted grid.

use crate::error::{GpError, Result};

/// Two neighbouring grid indices and the linear weights that blend them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub idx1: usize,
    pub idx2: usize,
    pub w1: f64,
    pub w2: f64,
}

impl Bracket {
    /// Blend the values at the bracket indices, `None` if `values` is
    /// shorter than the grid the bracket came from.
    pub fn interpolate(&self, values: &[f64]) -> Option<f64> {
        Some(self.w1 * values.get(self.idx1)? + self.w2 * values.get(self.idx2)?)
    }
}

/// Smallest index `i` with `xs[i] >= target`, or `xs.len()` if there is
/// none. `xs` must be ascending.
pub fn lower_bound(xs: &[f64], target: f64) -> usize {
    let mut low = 0;
    let mut high = xs.len();
    while low < high {
        let mid = low + (high - low) / 2;
        if target > xs[mid] {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    low
}

/// Neighbours of `xnew` in the ascending grid `xs` with interpolation
/// weights.
///
/// The indices are clamped to the grid, so for `xnew` outside
/// `[xs[0], xs[n-1]]` the outermost pair is returned and the weights
/// extrapolate linearly. `w1 + w2 == 1` always holds.
pub fn bracket(xs: &[f64], xnew: f64) -> Result<Bracket> {
    if xs.len() < 2 {
        return Err(GpError::DegenerateInput(
            "bracketing needs at least two grid points",
        ));
    }
    let idx2 = lower_bound(xs, xnew).clamp(1, xs.len() - 1);
    let idx1 = idx2 - 1;
    let (x1, x2) = (xs[idx1], xs[idx2]);
    // also rejects NaN grid values
    if !(x1 < x2) {
        return Err(GpError::DegenerateInput(
            "grid must be strictly ascending",
        ));
    }
    let w2 = (xnew - x1) / (x2 - x1);
    Ok(Bracket {
        idx1,
        idx2,
        w1: 1. - w2,
        w2,
    })
}
