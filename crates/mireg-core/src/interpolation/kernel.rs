//! Centered B-spline basis functions.
//!
//! `β0` is the box on `[-0.5, 0.5)`, `β1` the hat, `β2` the quadratic and
//! `β3` the cubic spline. Derivatives use the recurrence
//! `β'n(x) = βn-1(x + 1/2) - βn-1(x - 1/2)`.

use crate::error::{CoreError, Result};

/// Highest supported spline order.
pub const MAX_SPLINE_ORDER: usize = 3;

/// Maximum number of taps of any supported kernel.
pub const MAX_SUPPORT: usize = MAX_SPLINE_ORDER + 1;

/// Evaluate the centered B-spline of the given order.
pub fn bspline(order: usize, x: f64) -> f64 {
    let ax = x.abs();
    match order {
        0 => {
            if (-0.5..0.5).contains(&x) {
                1.0
            } else {
                0.0
            }
        }
        1 => (1.0 - ax).max(0.0),
        2 => {
            if ax < 0.5 {
                0.75 - ax * ax
            } else if ax < 1.5 {
                0.5 * (1.5 - ax) * (1.5 - ax)
            } else {
                0.0
            }
        }
        3 => {
            if ax < 1.0 {
                2.0 / 3.0 - ax * ax + 0.5 * ax * ax * ax
            } else if ax < 2.0 {
                let t = 2.0 - ax;
                t * t * t / 6.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Derivative of the centered B-spline of the given order.
pub fn bspline_derivative(order: usize, x: f64) -> f64 {
    if order == 0 {
        return 0.0;
    }
    bspline(order - 1, x + 0.5) - bspline(order - 1, x - 0.5)
}

/// Kernel taps for one axis: `values[k]` weighs grid index `start + k`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelWeights {
    pub start: i64,
    pub values: [f64; MAX_SUPPORT],
    pub len: usize,
}

impl KernelWeights {
    /// Weights actually in use.
    pub fn as_slice(&self) -> &[f64] {
        &self.values[..self.len]
    }
}

/// B-spline kernel of a fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BSplineKernel {
    order: usize,
}

impl BSplineKernel {
    /// Create a kernel, failing for orders above [`MAX_SPLINE_ORDER`].
    pub fn new(order: usize) -> Result<Self> {
        if order > MAX_SPLINE_ORDER {
            return Err(CoreError::UnsupportedOrder(order));
        }
        Ok(Self { order })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of grid points with non-zero weight.
    pub fn support(&self) -> usize {
        self.order + 1
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        bspline(self.order, x)
    }

    pub fn derivative(&self, x: f64) -> f64 {
        bspline_derivative(self.order, x)
    }

    /// First grid index in the support of a kernel centered at `c`.
    pub fn start_index(&self, c: f64) -> i64 {
        (c - (self.order as f64 - 1.0) / 2.0).floor() as i64
    }

    /// Interpolation weights around continuous position `c`.
    pub fn weights(&self, c: f64) -> KernelWeights {
        self.taps(c, bspline)
    }

    /// Derivative weights around continuous position `c`.
    pub fn derivative_weights(&self, c: f64) -> KernelWeights {
        self.taps(c, bspline_derivative)
    }

    fn taps(&self, c: f64, f: fn(usize, f64) -> f64) -> KernelWeights {
        let start = self.start_index(c);
        let mut values = [0.0; MAX_SUPPORT];
        for (k, v) in values.iter_mut().enumerate().take(self.support()) {
            *v = f(self.order, c - (start + k as i64) as f64);
        }
        KernelWeights {
            start,
            values,
            len: self.support(),
        }
    }
}
