//! Metric trait for image similarity measurement.

use mireg_core::transform::Transform;
use crate::error::Result;
use crate::sampler::ImageSample;

/// Cost value and its derivative with respect to the transform parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricValue {
    pub value: f64,
    pub derivative: Vec<f64>,
    /// Samples that mapped inside the moving image.
    pub valid_samples: usize,
}

/// Similarity metric evaluated over a sample set.
///
/// Values are costs: lower is better aligned. The moving image and any
/// moving mask belong to the metric; the fixed side arrives with the
/// samples.
///
/// # Type Parameters
/// * `D` - The spatial dimensionality (2 or 3)
pub trait Metric<const D: usize>: Send + Sync {
    /// Cost for the given transform and samples.
    fn value(&self, transform: &dyn Transform<D>, samples: &[ImageSample<D>]) -> Result<f64>;

    /// Cost and derivative for the given transform and samples.
    fn value_and_derivative(
        &self,
        transform: &dyn Transform<D>,
        samples: &[ImageSample<D>],
    ) -> Result<MetricValue>;

    fn name(&self) -> &'static str;
}
