//! B-spline free-form deformation.
//!
//! A regular grid of control points, each carrying one displacement
//! coefficient per physical axis. The displacement at a point is the
//! tensor-product B-spline sum over the `(order + 1)^D` control points whose
//! support contains it.
//!
//! Parameters are laid out dimension-major: all x coefficients in grid
//! linear order, then all y coefficients, then z.

use crate::error::{CoreError, Result};
use crate::image::{index_grid, ImageGeometry};
use crate::interpolation::coefficients::bspline_coefficients;
use crate::interpolation::kernel::{BSplineKernel, KernelWeights};
use crate::spatial::{Point, Spacing, Vector};
use super::{SparseJacobian, Transform, TransformDescription};

/// Free-form deformation on a control-point grid.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineTransform<const D: usize> {
    grid: ImageGeometry<D>,
    kernel: BSplineKernel,
    parameters: Vec<f64>,
}

impl<const D: usize> BSplineTransform<D> {
    /// Identity deformation on the given control-point grid.
    ///
    /// # Arguments
    /// * `grid` - Control point geometry
    /// * `order` - Spline order, 1 to 3
    pub fn new(grid: ImageGeometry<D>, order: usize) -> Result<Self> {
        if order == 0 {
            return Err(CoreError::UnsupportedOrder(order));
        }
        let kernel = BSplineKernel::new(order)?;
        if grid.size().iter().any(|&n| n < order + 1) {
            return Err(CoreError::geometry(format!(
                "control grid {:?} is smaller than the spline support {}",
                grid.size(),
                order + 1
            )));
        }
        let parameters = vec![0.0; D * grid.number_of_pixels()];
        Ok(Self { grid, kernel, parameters })
    }

    /// Deformation with explicit coefficients.
    pub fn with_parameters(grid: ImageGeometry<D>, order: usize, parameters: &[f64]) -> Result<Self> {
        let mut t = Self::new(grid, order)?;
        t.set_parameters(parameters)?;
        Ok(t)
    }

    /// Control grid covering an image domain with the given spacing.
    ///
    /// Each axis gets `ceil(extent / spacing) + order` control points, the
    /// grid is centered on the domain and shares its direction, so every
    /// point of the domain has full spline support.
    pub fn grid_for_domain(
        domain: &ImageGeometry<D>,
        grid_spacing: &Spacing<D>,
        order: usize,
    ) -> Result<ImageGeometry<D>> {
        if !grid_spacing.is_valid() {
            return Err(CoreError::geometry(format!(
                "grid spacing must be positive, got {:?}",
                grid_spacing.to_vec()
            )));
        }
        let extent = domain.extent();
        let mut size = [0usize; D];
        let mut half_span = Vector::<D>::zeros();
        for k in 0..D {
            let cells = (extent[k] / grid_spacing[k] - 1e-9).ceil().max(1.0) as usize;
            size[k] = cells + order;
            half_span[k] = grid_spacing[k] * (size[k] as f64 - 1.0) / 2.0;
        }
        let origin = domain.center() - *domain.direction() * half_span;
        ImageGeometry::new(size, origin, *grid_spacing, *domain.direction())
    }

    /// Identity deformation on a grid built by [`Self::grid_for_domain`].
    pub fn from_domain(domain: &ImageGeometry<D>, grid_spacing: &Spacing<D>, order: usize) -> Result<Self> {
        Self::new(Self::grid_for_domain(domain, grid_spacing, order)?, order)
    }

    pub fn grid(&self) -> &ImageGeometry<D> {
        &self.grid
    }

    pub fn order(&self) -> usize {
        self.kernel.order()
    }

    pub fn number_of_control_points(&self) -> usize {
        self.grid.number_of_pixels()
    }

    /// Coefficients of one displacement component, in grid linear order.
    pub fn coefficients(&self, dimension: usize) -> &[f64] {
        let n = self.number_of_control_points();
        &self.parameters[dimension * n..(dimension + 1) * n]
    }

    /// Kernel weights at `point`, or `None` when the support leaves the grid.
    fn support(&self, point: &Point<D>) -> Option<[KernelWeights; D]> {
        let c = self.grid.physical_to_index(point);
        let size = self.grid.size();
        let mut weights = [self.kernel.weights(0.0); D];
        for k in 0..D {
            let w = self.kernel.weights(c[k]);
            if w.start < 0 || w.start + self.order() as i64 > size[k] as i64 - 1 {
                return None;
            }
            weights[k] = w;
        }
        Some(weights)
    }

    /// Visit every control point in the support with its linear index and weight.
    fn for_each_support_point(&self, weights: &[KernelWeights; D], mut f: impl FnMut(usize, f64)) {
        let support = self.order() + 1;
        let strides = self.grid.strides();
        for offsets in index_grid([support; D]) {
            let mut linear = 0;
            let mut w = 1.0;
            for k in 0..D {
                linear += (weights[k].start as usize + offsets[k]) * strides[k];
                w *= weights[k].values[offsets[k]];
            }
            f(linear, w);
        }
    }

    /// Displacement at a physical point; zero outside the grid support.
    pub fn displacement(&self, point: &Point<D>) -> Vector<D> {
        let mut out = Vector::zeros();
        if let Some(weights) = self.support(point) {
            let n = self.number_of_control_points();
            self.for_each_support_point(&weights, |linear, w| {
                for d in 0..D {
                    out[d] += w * self.parameters[d * n + linear];
                }
            });
        }
        out
    }

    /// Displacement summed over the control points that exist.
    ///
    /// Equals [`Self::displacement`] inside the support region and tapers
    /// off smoothly beyond it instead of dropping to zero.
    fn extended_displacement(&self, point: &Point<D>) -> Vector<D> {
        let c = self.grid.physical_to_index(point);
        let size = self.grid.size();
        let strides = self.grid.strides();
        let n = self.number_of_control_points();
        let weights: [KernelWeights; D] = std::array::from_fn(|k| self.kernel.weights(c[k]));

        let mut out = Vector::zeros();
        'points: for offsets in index_grid([self.order() + 1; D]) {
            let mut linear = 0;
            let mut w = 1.0;
            for k in 0..D {
                let i = weights[k].start + offsets[k] as i64;
                if i < 0 || i >= size[k] as i64 {
                    continue 'points;
                }
                linear += i as usize * strides[k];
                w *= weights[k].values[offsets[k]];
            }
            for d in 0..D {
                out[d] += w * self.parameters[d * n + linear];
            }
        }
        out
    }

    /// Re-express the deformation on another control grid.
    ///
    /// The current displacement is sampled at the new control points and
    /// prefiltered into interpolating coefficients. An identical grid keeps
    /// the coefficients unchanged.
    pub fn refine(&self, grid: ImageGeometry<D>) -> Result<Self> {
        if grid.approx_eq(&self.grid, 1e-9) {
            return Ok(self.clone());
        }
        let mut refined = Self::new(grid, self.order())?;
        let n = refined.number_of_control_points();
        let mut samples = vec![vec![0.0; n]; D];
        for (linear, index) in index_grid(refined.grid.size()).enumerate() {
            let displacement = self.extended_displacement(&refined.grid.index_point(&index));
            for d in 0..D {
                samples[d][linear] = displacement[d];
            }
        }
        for (d, component) in samples.iter().enumerate() {
            let coefficients = bspline_coefficients(component, refined.grid.size(), self.order())?;
            refined.parameters[d * n..(d + 1) * n].copy_from_slice(&coefficients);
        }
        Ok(refined)
    }
}

impl<const D: usize> Transform<D> for BSplineTransform<D> {
    fn transform_point(&self, point: &Point<D>) -> Point<D> {
        *point + self.displacement(point)
    }

    fn number_of_parameters(&self) -> usize {
        self.parameters.len()
    }

    fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        if parameters.len() != self.parameters.len() {
            return Err(CoreError::ParameterCount {
                expected: self.parameters.len(),
                actual: parameters.len(),
            });
        }
        self.parameters.copy_from_slice(parameters);
        Ok(())
    }

    fn jacobian(&self, point: &Point<D>) -> SparseJacobian<D> {
        let Some(weights) = self.support(point) else {
            return SparseJacobian::empty();
        };
        let n = self.number_of_control_points();
        let mut jacobian = SparseJacobian::with_capacity(D * (self.order() + 1).pow(D as u32));
        self.for_each_support_point(&weights, |linear, w| {
            for d in 0..D {
                jacobian.push(d * n + linear, Vector::unit(d) * w);
            }
        });
        jacobian
    }

    fn name(&self) -> &'static str {
        "BSplineTransform"
    }

    fn description(&self) -> TransformDescription<D> {
        TransformDescription::BSpline {
            grid: self.grid.clone(),
            order: self.order(),
            parameters: self.parameters.clone(),
        }
    }

    fn clone_box(&self) -> Box<dyn Transform<D>> {
        Box::new(self.clone())
    }
}
