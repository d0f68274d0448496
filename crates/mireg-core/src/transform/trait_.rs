//! Transform trait for parametric spatial transformations.

use std::fmt::Debug;
use crate::error::Result;
use crate::spatial::Point;
use super::{SparseJacobian, TransformDescription};

/// Parametric mapping from fixed physical space to moving physical space.
///
/// # Type Parameters
/// * `D` - The spatial dimensionality (2 or 3)
pub trait Transform<const D: usize>: Send + Sync + Debug {
    /// Map a physical point.
    fn transform_point(&self, point: &Point<D>) -> Point<D>;

    /// Length of the parameter vector.
    fn number_of_parameters(&self) -> usize;

    /// Current parameters.
    fn parameters(&self) -> &[f64];

    /// Replace all parameters at once.
    ///
    /// Fails without modifying the transform when the length is wrong.
    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()>;

    /// Derivative of the mapped point with respect to the parameters at `point`.
    fn jacobian(&self, point: &Point<D>) -> SparseJacobian<D>;

    /// Transform type name as used in parameter records.
    fn name(&self) -> &'static str;

    /// Full description, sufficient to rebuild the transform.
    fn description(&self) -> TransformDescription<D>;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Transform<D>>;

    /// Get the inverse transform (if available).
    fn inverse(&self) -> Option<Box<dyn Transform<D>>> {
        None
    }
}

impl<const D: usize> Clone for Box<dyn Transform<D>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
