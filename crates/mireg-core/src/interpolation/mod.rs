//! Interpolation of image values at continuous coordinates.
//!
//! B-spline kernels of order 0 to 3, the recursive prefilter that turns
//! samples into interpolating spline coefficients, and `ImageAccessor`
//! which evaluates images and their gradients at physical points.

pub mod kernel;
pub mod coefficients;
pub mod accessor;

pub use kernel::{BSplineKernel, KernelWeights, MAX_SPLINE_ORDER, MAX_SUPPORT};
pub use coefficients::{bspline_coefficients, prefilter_line};
pub use accessor::ImageAccessor;
