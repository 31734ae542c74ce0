//! Centripetal Catmull-Rom interpolation between animation keyframes.

use faer::{Mat, MatRef};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{check_dim, GpError, Result};

/// Knot spacing exponent: 0.5 is centripetal, 0 uniform, 1 chordal.
const ALPHA: f64 = 0.5;

/// What to do when neighbouring control points coincide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoincidentKnots {
    /// A blend over an empty knot interval returns its first operand,
    /// which is the point both ends share.
    #[default]
    SharedPoint,
    /// Fail construction with [`GpError::DegenerateInput`].
    Reject,
}

/// A Catmull-Rom segment from `P1` to `P2`.
///
/// Control points are matrices of equal shape. Every column is its own
/// curve with its own knot sequence, so several samples can be animated
/// at once.
#[derive(Debug, Clone)]
pub struct CatmullRom {
    points: [Mat<f64>; 4],
    /// `knots[col]` holds `t0..t3` for that column
    knots: Vec<[f64; 4]>,
}

fn knot_step(a: MatRef<'_, f64>, b: MatRef<'_, f64>, col: usize) -> f64 {
    let sq: f64 = (0..a.nrows())
        .map(|row| {
            let diff = b[(row, col)] - a[(row, col)];
            diff * diff
        })
        .sum();
    sq.powf(ALPHA / 2.)
}

/// Weights of `X` and `Y` in `X (tb - t)/(tb - ta) + Y (t - ta)/(tb - ta)`.
#[inline]
fn blend_weights(ta: f64, tb: f64, t: f64) -> (f64, f64) {
    if tb == ta {
        return (1., 0.);
    }
    let span = tb - ta;
    ((tb - t) / span, (t - ta) / span)
}

impl CatmullRom {
    pub fn new(p0: Mat<f64>, p1: Mat<f64>, p2: Mat<f64>, p3: Mat<f64>) -> Result<Self> {
        Self::with_policy([p0, p1, p2, p3], CoincidentKnots::default())
    }

    pub fn with_policy(points: [Mat<f64>; 4], policy: CoincidentKnots) -> Result<Self> {
        let (rows, cols) = (points[0].nrows(), points[0].ncols());
        for p in points.iter().skip(1) {
            check_dim("spline control point rows", rows, p.nrows())?;
            check_dim("spline control point columns", cols, p.ncols())?;
        }

        let mut knots = Vec::with_capacity(cols);
        for col in 0..cols {
            let mut t = [0f64; 4];
            for k in 0..3 {
                t[k + 1] = t[k] + knot_step(points[k].as_ref(), points[k + 1].as_ref(), col);
            }
            if t.windows(2).any(|pair| pair[0] == pair[1]) {
                match policy {
                    CoincidentKnots::Reject => {
                        return Err(GpError::DegenerateInput(
                            "coincident spline control points",
                        ))
                    }
                    CoincidentKnots::SharedPoint => {
                        debug!("coincident control points in spline column {col}");
                    }
                }
            }
            knots.push(t);
        }
        Ok(Self { points, knots })
    }

    pub fn nrows(&self) -> usize {
        self.points[0].nrows()
    }

    pub fn ncols(&self) -> usize {
        self.points[0].ncols()
    }

    /// Point on the curve, `w = 0` at `P1` and `w = 1` at `P2`.
    pub fn evaluate(&self, w: f64) -> Mat<f64> {
        let [p0, p1, p2, p3] = &self.points;
        let mut out = Mat::<f64>::zeros(self.nrows(), self.ncols());

        for (col, &[t0, t1, t2, t3]) in self.knots.iter().enumerate() {
            let t = (1. - w) * t1 + w * t2;
            let a1 = blend_weights(t0, t1, t);
            let a2 = blend_weights(t1, t2, t);
            let a3 = blend_weights(t2, t3, t);
            let b1 = blend_weights(t0, t2, t);
            let b2 = blend_weights(t1, t3, t);
            let c = blend_weights(t1, t2, t);

            for row in 0..self.nrows() {
                let (x0, x1, x2, x3) = (
                    p0[(row, col)],
                    p1[(row, col)],
                    p2[(row, col)],
                    p3[(row, col)],
                );
                let y1 = a1.0 * x0 + a1.1 * x1;
                let y2 = a2.0 * x1 + a2.1 * x2;
                let y3 = a3.0 * x2 + a3.1 * x3;
                let z1 = b1.0 * y1 + b1.1 * y2;
                let z2 = b2.0 * y2 + b2.1 * y3;
                out[(row, col)] = c.0 * z1 + c.1 * z2;
            }
        }
        out
    }
}

/// Interpolating function through `P1` and `P2`, see [`CatmullRom`].
pub fn build_catmull_rom(
    p0: Mat<f64>,
    p1: Mat<f64>,
    p2: Mat<f64>,
    p3: Mat<f64>,
) -> Result<impl Fn(f64) -> Mat<f64>> {
    let spline = CatmullRom::new(p0, p1, p2, p3)?;
    Ok(move |w| spline.evaluate(w))
}
