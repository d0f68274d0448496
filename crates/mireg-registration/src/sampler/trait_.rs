//! Sampler trait for selecting fixed image positions.

use mireg_core::image::ImageMask;
use mireg_core::interpolation::ImageAccessor;
use mireg_core::spatial::Point;
use crate::error::Result;

/// A fixed image position with its intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSample<const D: usize> {
    pub point: Point<D>,
    pub fixed_value: f64,
}

/// Selects the fixed image positions a metric evaluation uses.
///
/// Every emitted sample lies inside the fixed image's valid domain and,
/// when a mask is given, inside the mask.
pub trait ImageSampler<const D: usize>: Send {
    /// Draw a sample set.
    ///
    /// # Arguments
    /// * `fixed` - Fixed image of the current level
    /// * `mask` - Optional fixed mask
    /// * `count` - Requested number of samples (ignored by exhaustive samplers)
    fn sample(
        &mut self,
        fixed: &ImageAccessor<D>,
        mask: Option<&ImageMask<D>>,
        count: usize,
    ) -> Result<Vec<ImageSample<D>>>;

    fn name(&self) -> &'static str;
}
