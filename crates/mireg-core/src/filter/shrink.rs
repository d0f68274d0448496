use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use crate::error::{CoreError, Result};
use crate::image::Image;
use crate::spatial::Vector;

/// Integer-factor downsampling.
///
/// Output pixel `i` along an axis with factor `f` takes the value at input
/// position `i * f + (f - 1) / 2`, averaging the two neighbours when that
/// position falls between pixels. The origin moves to the same position, so
/// output pixel centres lie at the centres of the blocks they summarize.
/// No smoothing is applied here.
pub struct ShrinkFilter<B: Backend> {
    factors: Vec<usize>,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> ShrinkFilter<B> {
    /// A single factor applies to every axis.
    pub fn new(factors: Vec<usize>) -> Self {
        Self {
            factors,
            _b: std::marker::PhantomData,
        }
    }

    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Result<Image<B, D>> {
        let size = image.size();
        let device = image.data().device();
        let mut data = image.data().clone();
        let mut spacing = *image.spacing();
        let mut shift = Vector::<D>::zeros();

        for axis in 0..D {
            let factor = self.factors.get(axis).or(self.factors.first()).copied().unwrap_or(1);
            if factor == 0 {
                return Err(CoreError::geometry("shrink factor must be at least 1"));
            }
            if factor == 1 {
                continue;
            }

            let n = size[axis];
            let out = (n / factor).max(1);
            let lo: Vec<i32> = (0..out)
                .map(|i| (i * factor + (factor - 1) / 2).min(n - 1) as i32)
                .collect();
            let hi: Vec<i32> = (0..out)
                .map(|i| (i * factor + factor / 2).min(n - 1) as i32)
                .collect();

            let dim = D - 1 - axis;
            let lo = Tensor::<B, 1, Int>::from_ints(lo.as_slice(), &device);
            let hi = Tensor::<B, 1, Int>::from_ints(hi.as_slice(), &device);
            data = (data.clone().select(dim, lo) + data.select(dim, hi)) * 0.5;

            shift[axis] = (factor - 1) as f64 / 2.0;
            spacing[axis] *= factor as f64;
        }

        let origin = *image.origin() + image.geometry().index_offset_to_physical(&shift);
        Image::new(data, origin, spacing, *image.direction())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageGeometry;
    use crate::spatial::{Direction, Point, Spacing};
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn ramp(size: [usize; 2]) -> Image<TestBackend, 2> {
        let geometry = ImageGeometry::new(size, Point::new([1.0, 2.0]), Spacing::new([0.5, 2.0]), Direction::identity()).unwrap();
        let values: Vec<f64> = (0..geometry.number_of_pixels())
            .map(|l| {
                let [x, y] = geometry.index_from_linear(l);
                x as f64 + 100.0 * y as f64
            })
            .collect();
        Image::from_values(geometry, &values, &Default::default()).unwrap()
    }

    #[test]
    fn test_even_factor_averages_and_shifts_origin() {
        let image = ramp([8, 4]);
        let shrunk = ShrinkFilter::new(vec![2, 1]).apply(&image).unwrap();

        assert_eq!(shrunk.size(), [4, 4]);
        assert_eq!(shrunk.spacing()[0], 1.0);
        assert_eq!(shrunk.spacing()[1], 2.0);
        // First block centre lies between input pixels 0 and 1.
        assert!((shrunk.origin()[0] - 1.25).abs() < 1e-12);
        assert_eq!(shrunk.origin()[1], 2.0);

        let values = shrunk.to_values();
        assert!((values[0] - 0.5).abs() < 1e-5);
        assert!((values[1] - 2.5).abs() < 1e-5);
        assert!((values[4] - 100.5).abs() < 1e-5);
    }

    #[test]
    fn test_output_pixels_stay_physically_aligned() {
        let image = ramp([9, 6]);
        let shrunk = ShrinkFilter::new(vec![3]).apply(&image).unwrap();
        assert_eq!(shrunk.size(), [3, 2]);

        // Odd factor picks the block centre exactly.
        let values = shrunk.to_values();
        for (linear, &value) in values.iter().enumerate() {
            let index = shrunk.geometry().index_from_linear(linear);
            let point = shrunk.geometry().index_point(&index);
            let source = image.transform_physical_point_to_continuous_index(&point);
            let expected = source[0] + 100.0 * source[1];
            assert!((value - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_tiny_axis_keeps_one_pixel() {
        let image = ramp([3, 2]);
        let shrunk = ShrinkFilter::new(vec![4]).apply(&image).unwrap();
        assert_eq!(shrunk.size(), [1, 1]);
    }
}
