//! Spatial transforms.
//!
//! Transforms map fixed-image physical points to moving-image physical
//! points and expose their parameter Jacobian for gradient-based
//! optimization.

pub mod trait_;
pub mod jacobian;
pub mod euler;
pub mod bspline;
pub mod combination;
pub mod description;

pub use trait_::Transform;
pub use jacobian::SparseJacobian;
pub use euler::EulerTransform;
pub use bspline::BSplineTransform;
pub use combination::{CombinationMode, CombinationTransform};
pub use description::TransformDescription;
