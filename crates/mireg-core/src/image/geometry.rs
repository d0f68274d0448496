//! Physical geometry of a regular image grid.
//!
//! Index axis 0 is the fastest-varying axis in linear storage order.
//! The mapping between continuous indices and physical points is
//! `point = origin + Direction * diag(spacing) * index`.

use nalgebra::SMatrix;
use crate::error::{CoreError, Result};
use crate::spatial::{Direction, Point, Spacing, Vector};

/// Size, origin, spacing and direction of an image grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGeometry<const D: usize> {
    size: [usize; D],
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
    index_to_physical: SMatrix<f64, D, D>,
    physical_to_index: SMatrix<f64, D, D>,
}

impl<const D: usize> ImageGeometry<D> {
    /// Create a geometry, validating size, spacing and direction.
    pub fn new(
        size: [usize; D],
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Result<Self> {
        if size.iter().any(|&s| s == 0) {
            return Err(CoreError::geometry(format!("image size must be non-zero, got {:?}", size)));
        }
        if !spacing.is_valid() {
            return Err(CoreError::geometry(format!("spacing must be positive, got {:?}", spacing.to_vec())));
        }

        let mut index_to_physical = direction.0;
        for c in 0..D {
            for r in 0..D {
                index_to_physical[(r, c)] *= spacing[c];
            }
        }
        let physical_to_index = index_to_physical
            .try_inverse()
            .ok_or_else(|| CoreError::geometry("direction matrix is singular"))?;

        Ok(Self {
            size,
            origin,
            spacing,
            direction,
            index_to_physical,
            physical_to_index,
        })
    }

    /// Unit spacing, zero origin and identity direction.
    pub fn with_size(size: [usize; D]) -> Result<Self> {
        Self::new(size, Point::origin(), Spacing::uniform(1.0), Direction::identity())
    }

    pub fn size(&self) -> [usize; D] {
        self.size
    }

    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    /// Total number of pixels.
    pub fn number_of_pixels(&self) -> usize {
        self.size.iter().product()
    }

    /// Same grid with another direction matrix.
    pub fn with_direction(&self, direction: Direction<D>) -> Result<Self> {
        Self::new(self.size, self.origin, self.spacing, direction)
    }

    /// Matrix mapping physical offsets to continuous index offsets.
    ///
    /// Its transpose maps index-space gradients to physical gradients.
    pub fn physical_to_index_matrix(&self) -> &SMatrix<f64, D, D> {
        &self.physical_to_index
    }

    /// Convert a continuous index to a physical point.
    pub fn index_to_physical(&self, index: &Point<D>) -> Point<D> {
        Point(self.origin.0 + self.index_to_physical * index.0.coords)
    }

    /// Convert a physical point to a continuous index.
    pub fn physical_to_index(&self, point: &Point<D>) -> Point<D> {
        Point::from_vector(self.physical_to_index * (point.0 - self.origin.0))
    }

    /// Physical position of a discrete index.
    pub fn index_point(&self, index: &[usize; D]) -> Point<D> {
        let mut c = Point::origin();
        for k in 0..D {
            c[k] = index[k] as f64;
        }
        self.index_to_physical(&c)
    }

    /// Map an index-space offset to a physical vector.
    pub fn index_offset_to_physical(&self, offset: &Vector<D>) -> Vector<D> {
        Vector(self.index_to_physical * offset.0)
    }

    /// True if the continuous index lies within `[-0.5, size - 0.5]` on every axis.
    pub fn is_inside_continuous_index(&self, index: &Point<D>) -> bool {
        (0..D).all(|k| {
            let c = index[k];
            c >= -0.5 && c <= self.size[k] as f64 - 0.5
        })
    }

    /// True if the physical point maps into the valid continuous index domain.
    pub fn contains(&self, point: &Point<D>) -> bool {
        self.is_inside_continuous_index(&self.physical_to_index(point))
    }

    /// Nearest discrete index of a continuous index, `None` outside the grid.
    pub fn nearest_index(&self, index: &Point<D>) -> Option<[usize; D]> {
        let mut out = [0usize; D];
        for k in 0..D {
            let r = (index[k] + 0.5).floor();
            if r < 0.0 || r >= self.size[k] as f64 {
                return None;
            }
            out[k] = r as usize;
        }
        Some(out)
    }

    /// Physical center of the pixel grid.
    pub fn center(&self) -> Point<D> {
        let mut c = Point::origin();
        for k in 0..D {
            c[k] = (self.size[k] as f64 - 1.0) / 2.0;
        }
        self.index_to_physical(&c)
    }

    /// Edge-to-edge physical length along each index axis.
    pub fn extent(&self) -> Vector<D> {
        let mut e = Vector::zeros();
        for k in 0..D {
            e[k] = self.size[k] as f64 * self.spacing[k];
        }
        e
    }

    /// Linear storage strides, axis 0 fastest.
    pub fn strides(&self) -> [usize; D] {
        let mut strides = [1usize; D];
        for k in 1..D {
            strides[k] = strides[k - 1] * self.size[k - 1];
        }
        strides
    }

    /// Linear storage offset of a discrete index.
    pub fn linear_index(&self, index: &[usize; D]) -> usize {
        let strides = self.strides();
        (0..D).map(|k| index[k] * strides[k]).sum()
    }

    /// Discrete index of a linear storage offset.
    pub fn index_from_linear(&self, mut linear: usize) -> [usize; D] {
        let mut index = [0usize; D];
        for k in 0..D {
            index[k] = linear % self.size[k];
            linear /= self.size[k];
        }
        index
    }

    /// Compare two geometries up to a tolerance on the floating point fields.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.size == other.size
            && (0..D).all(|k| {
                (self.origin[k] - other.origin[k]).abs() <= tolerance
                    && (self.spacing[k] - other.spacing[k]).abs() <= tolerance
            })
            && (0..D).all(|r| {
                (0..D).all(|c| (self.direction[(r, c)] - other.direction[(r, c)]).abs() <= tolerance)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_rejects_invalid_input() {
        assert!(ImageGeometry::<2>::with_size([0, 4]).is_err());
        let bad_spacing = ImageGeometry::<2>::new(
            [4, 4],
            Point::origin(),
            Spacing::new([1.0, 0.0]),
            Direction::identity(),
        );
        assert!(bad_spacing.is_err());
        let singular = Direction::<2>::from_row_slice(&[1.0, 1.0, 1.0, 1.0]).unwrap();
        assert!(ImageGeometry::new([4, 4], Point::origin(), Spacing::uniform(1.0), singular).is_err());
    }

    #[test]
    fn test_geometry_mapping_with_direction() {
        let direction = Direction::<2>::from_row_slice(&[0.0, -1.0, 1.0, 0.0]).unwrap();
        let geometry = ImageGeometry::new(
            [10, 20],
            Point::new([5.0, -3.0]),
            Spacing::new([2.0, 0.5]),
            direction,
        )
        .unwrap();

        // Index axis 0 points along physical +y, axis 1 along physical -x.
        let p = geometry.index_point(&[1, 2]);
        assert!((p[0] - (5.0 - 1.0)).abs() < 1e-12);
        assert!((p[1] - (-3.0 + 2.0)).abs() < 1e-12);

        let c = geometry.physical_to_index(&p);
        assert!((c[0] - 1.0).abs() < 1e-12);
        assert!((c[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_geometry_linear_index_roundtrip() {
        let geometry = ImageGeometry::<3>::with_size([4, 3, 2]).unwrap();
        assert_eq!(geometry.strides(), [1, 4, 12]);
        for linear in 0..geometry.number_of_pixels() {
            let index = geometry.index_from_linear(linear);
            assert_eq!(geometry.linear_index(&index), linear);
        }
        assert_eq!(geometry.index_from_linear(5), [1, 1, 0]);
    }

    #[test]
    fn test_geometry_domain_bounds() {
        let geometry = ImageGeometry::<2>::with_size([4, 4]).unwrap();
        assert!(geometry.contains(&Point::new([-0.5, 3.5])));
        assert!(!geometry.contains(&Point::new([-0.51, 0.0])));
        assert_eq!(geometry.nearest_index(&Point::new([2.4, 2.6])), Some([2, 3]));
        assert_eq!(geometry.nearest_index(&Point::new([3.6, 0.0])), None);

        let center = geometry.center();
        assert_eq!(center, Point::new([1.5, 1.5]));
    }
}
