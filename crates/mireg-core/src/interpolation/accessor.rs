//! Continuous-coordinate access to image intensities.
//!
//! `ImageAccessor` snapshots an image's pixels on the host once and then
//! answers point queries: value, or value plus physical gradient, with
//! B-spline interpolation of order 0 (nearest) to 3 (cubic).

use burn::tensor::backend::Backend;
use crate::error::{CoreError, Result};
use crate::image::{Image, ImageGeometry};
use crate::interpolation::coefficients::bspline_coefficients;
use crate::interpolation::kernel::{BSplineKernel, KernelWeights};
use crate::spatial::{Point, Vector};

/// Interpolating view of an image.
///
/// Points are valid when their continuous index lies in
/// `[-0.5, size - 0.5]` along every axis; queries outside return `None`.
/// Orders 0 and 1 clamp neighbours to the grid, orders 2 and 3 interpolate
/// prefiltered coefficients with mirror boundaries. Gradients of order-0
/// accessors use the linear kernel.
#[derive(Debug, Clone)]
pub struct ImageAccessor<const D: usize> {
    geometry: ImageGeometry<D>,
    kernel: BSplineKernel,
    values: Vec<f64>,
    coefficients: Option<Vec<f64>>,
    strides: [usize; D],
    range: (f64, f64),
}

impl<const D: usize> ImageAccessor<D> {
    /// Create an accessor for an image.
    ///
    /// # Arguments
    /// * `image` - Source image
    /// * `order` - Interpolation order (0 to 3)
    pub fn new<B: Backend>(image: &Image<B, D>, order: usize) -> Result<Self> {
        Self::from_values(image.geometry().clone(), image.to_values(), order)
    }

    /// Create an accessor from raw values in linear order.
    pub fn from_values(geometry: ImageGeometry<D>, values: Vec<f64>, order: usize) -> Result<Self> {
        let kernel = BSplineKernel::new(order)?;
        if values.len() != geometry.number_of_pixels() {
            return Err(CoreError::image(format!(
                "expected {} pixel values, got {}",
                geometry.number_of_pixels(),
                values.len()
            )));
        }

        let coefficients = if order >= 2 {
            Some(bspline_coefficients(&values, geometry.size(), order)?)
        } else {
            None
        };

        let range = values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

        Ok(Self {
            strides: geometry.strides(),
            geometry,
            kernel,
            values,
            coefficients,
            range,
        })
    }

    pub fn geometry(&self) -> &ImageGeometry<D> {
        &self.geometry
    }

    pub fn order(&self) -> usize {
        self.kernel.order()
    }

    /// Raw pixel values in linear order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Minimum and maximum pixel value.
    pub fn range(&self) -> (f64, f64) {
        self.range
    }

    /// Pixel value at a discrete index.
    pub fn value_at_index(&self, index: &[usize; D]) -> f64 {
        self.values[self.geometry.linear_index(index)]
    }

    /// Whether the physical point is inside the valid interpolation domain.
    pub fn is_inside(&self, point: &Point<D>) -> bool {
        self.geometry.contains(point)
    }

    /// Interpolated value at a physical point.
    pub fn evaluate(&self, point: &Point<D>) -> Option<f64> {
        let c = self.geometry.physical_to_index(point);
        self.evaluate_at_continuous_index(&c)
    }

    /// Interpolated value at a continuous index.
    pub fn evaluate_at_continuous_index(&self, index: &Point<D>) -> Option<f64> {
        if !self.geometry.is_inside_continuous_index(index) {
            return None;
        }
        let weights: [KernelWeights; D] = std::array::from_fn(|k| self.kernel.weights(index[k]));
        Some(self.accumulate(&weights, None).0)
    }

    /// Interpolated value and physical-space gradient at a physical point.
    pub fn evaluate_with_gradient(&self, point: &Point<D>) -> Option<(f64, Vector<D>)> {
        let c = self.geometry.physical_to_index(point);
        if !self.geometry.is_inside_continuous_index(&c) {
            return None;
        }

        let (value, index_gradient) = if self.kernel.order() == 0 {
            let value = self.accumulate(&std::array::from_fn(|k| self.kernel.weights(c[k])), None).0;
            let linear = BSplineKernel::new(1).ok()?;
            let weights = std::array::from_fn(|k| linear.weights(c[k]));
            let derivatives = std::array::from_fn(|k| linear.derivative_weights(c[k]));
            (value, self.accumulate(&weights, Some(&derivatives)).1)
        } else {
            let weights = std::array::from_fn(|k| self.kernel.weights(c[k]));
            let derivatives = std::array::from_fn(|k| self.kernel.derivative_weights(c[k]));
            self.accumulate(&weights, Some(&derivatives))
        };

        let gradient = Vector(self.geometry.physical_to_index_matrix().transpose() * index_gradient.0);
        Some((value, gradient))
    }

    fn accumulate(
        &self,
        weights: &[KernelWeights; D],
        derivatives: Option<&[KernelWeights; D]>,
    ) -> (f64, Vector<D>) {
        let support = weights[0].len;
        let mirror = self.coefficients.is_some();
        let data = self.coefficients.as_deref().unwrap_or(&self.values);
        let size = self.geometry.size();

        let mut offsets = [0usize; D];
        let mut value = 0.0;
        let mut gradient = Vector::<D>::zeros();
        let total = support.pow(D as u32);

        for _ in 0..total {
            let mut linear = 0;
            let mut weight = 1.0;
            for k in 0..D {
                let i = weights[k].start + offsets[k] as i64;
                let i = if mirror { mirror_index(i, size[k]) } else { clamp_index(i, size[k]) };
                linear += i * self.strides[k];
                weight *= weights[k].values[offsets[k]];
            }
            let c = data[linear];
            value += c * weight;

            if let Some(dw) = derivatives {
                for d in 0..D {
                    let mut g = dw[d].values[offsets[d]];
                    for k in 0..D {
                        if k != d {
                            g *= weights[k].values[offsets[k]];
                        }
                    }
                    gradient[d] += c * g;
                }
            }

            for k in 0..D {
                offsets[k] += 1;
                if offsets[k] < support {
                    break;
                }
                offsets[k] = 0;
            }
        }

        (value, gradient)
    }
}

fn clamp_index(i: i64, n: usize) -> usize {
    i.clamp(0, n as i64 - 1) as usize
}

fn mirror_index(i: i64, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * n as i64 - 2;
    let mut j = i.rem_euclid(period);
    if j >= n as i64 {
        j = period - j;
    }
    j as usize
}
