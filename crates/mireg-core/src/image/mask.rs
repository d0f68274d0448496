//! Binary masks restricting where registration samples may be taken.

use burn::tensor::backend::Backend;
use crate::error::{CoreError, Result};
use crate::image::{Image, ImageGeometry};
use crate::spatial::Point;

/// Binary mask over an image grid.
///
/// A physical point is inside the mask when its nearest pixel is set.
#[derive(Debug, Clone)]
pub struct ImageMask<const D: usize> {
    geometry: ImageGeometry<D>,
    values: Vec<bool>,
}

impl<const D: usize> ImageMask<D> {
    /// Create a mask from values in linear order.
    pub fn new(geometry: ImageGeometry<D>, values: Vec<bool>) -> Result<Self> {
        if values.len() != geometry.number_of_pixels() {
            return Err(CoreError::image(format!(
                "mask has {} values for {} pixels",
                values.len(),
                geometry.number_of_pixels()
            )));
        }
        Ok(Self { geometry, values })
    }

    /// Mask covering the whole grid.
    pub fn full(geometry: ImageGeometry<D>) -> Self {
        let n = geometry.number_of_pixels();
        Self { geometry, values: vec![true; n] }
    }

    /// Pixels with a value above zero are inside.
    pub fn from_image<B: Backend>(image: &Image<B, D>) -> Self {
        let values = image.to_values().into_iter().map(|v| v > 0.0).collect();
        Self {
            geometry: image.geometry().clone(),
            values,
        }
    }

    pub fn geometry(&self) -> &ImageGeometry<D> {
        &self.geometry
    }

    pub fn values(&self) -> &[bool] {
        &self.values
    }

    /// Same mask values on another geometry with the same size.
    pub fn with_geometry(&self, geometry: ImageGeometry<D>) -> Result<Self> {
        Self::new(geometry, self.values.clone())
    }

    /// Number of pixels inside the mask.
    pub fn count(&self) -> usize {
        self.values.iter().filter(|&&v| v).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Whether the pixel at `index` is set.
    pub fn is_inside_index(&self, index: &[usize; D]) -> bool {
        self.values[self.geometry.linear_index(index)]
    }

    /// Whether the physical point falls on a set pixel.
    pub fn is_inside(&self, point: &Point<D>) -> bool {
        let c = self.geometry.physical_to_index(point);
        self.geometry
            .nearest_index(&c)
            .map(|index| self.is_inside_index(&index))
            .unwrap_or(false)
    }

    /// Binary erosion with a box structuring element.
    ///
    /// `radius[k]` is the half-width in pixels along index axis k. Pixels
    /// beyond the grid border count as foreground.
    pub fn erode(&self, radius: [usize; D]) -> Self {
        let size = self.geometry.size();
        let strides = self.geometry.strides();
        let mut current = self.values.clone();

        for axis in 0..D {
            let r = radius[axis];
            if r == 0 {
                continue;
            }
            let n = size[axis];
            let stride = strides[axis];
            let lines = current.len() / n;
            let mut next = current.clone();

            for line in 0..lines {
                let lower = line % stride;
                let upper = line / stride;
                let base = upper * stride * n + lower;
                for i in 0..n {
                    let lo = i.saturating_sub(r);
                    let hi = (i + r).min(n - 1);
                    next[base + i * stride] = (lo..=hi).all(|j| current[base + j * stride]);
                }
            }
            current = next;
        }

        Self {
            geometry: self.geometry.clone(),
            values: current,
        }
    }

    /// Inclusive index bounds of the set pixels, `None` for an empty mask.
    pub fn bounding_box(&self) -> Option<([usize; D], [usize; D])> {
        let mut lower = [usize::MAX; D];
        let mut upper = [0usize; D];
        let mut any = false;
        for (linear, &v) in self.values.iter().enumerate() {
            if !v {
                continue;
            }
            any = true;
            let index = self.geometry.index_from_linear(linear);
            for k in 0..D {
                lower[k] = lower[k].min(index[k]);
                upper[k] = upper[k].max(index[k]);
            }
        }
        any.then_some((lower, upper))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mask() -> ImageMask<2> {
        let geometry = ImageGeometry::<2>::with_size([7, 7]).unwrap();
        let values = (0..49)
            .map(|i| {
                let (x, y) = (i % 7, i / 7);
                (1..=5).contains(&x) && (1..=5).contains(&y)
            })
            .collect();
        ImageMask::new(geometry, values).unwrap()
    }

    #[test]
    fn test_mask_point_lookup() {
        let mask = square_mask();
        assert!(mask.is_inside(&Point::new([3.0, 3.0])));
        assert!(mask.is_inside(&Point::new([0.6, 5.4])));
        assert!(!mask.is_inside(&Point::new([0.4, 3.0])));
        assert!(!mask.is_inside(&Point::new([-3.0, 3.0])));
        assert_eq!(mask.count(), 25);
    }

    #[test]
    fn test_mask_erosion_shrinks_square() {
        let eroded = square_mask().erode([1, 1]);
        assert_eq!(eroded.count(), 9);
        assert_eq!(eroded.bounding_box(), Some(([2, 2], [4, 4])));
    }

    #[test]
    fn test_mask_erosion_keeps_border_foreground() {
        let full = ImageMask::full(ImageGeometry::<2>::with_size([4, 4]).unwrap());
        assert_eq!(full.erode([2, 2]).count(), 16);
    }
}
