//! Direction cosines of an image grid.

use nalgebra::SMatrix;
use serde::{Deserialize, Serialize};
use super::Vector;

/// Orientation of the index axes in physical space.
///
/// Column `k` is the unit physical direction of index axis `k`. Records
/// store the matrix row-major.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Direction<const D: usize>(pub SMatrix<f64, D, D>);

impl<const D: usize> Direction<D> {
    pub fn identity() -> Self {
        Self(SMatrix::identity())
    }

    /// `None` unless exactly `D * D` values are given.
    pub fn from_row_slice(values: &[f64]) -> Option<Self> {
        (values.len() == D * D).then(|| Self(SMatrix::from_row_slice(values)))
    }

    pub fn to_row_vec(&self) -> Vec<f64> {
        self.0.transpose().iter().copied().collect()
    }

    /// Physical direction of index axis `k`.
    pub fn axis(&self, k: usize) -> Vector<D> {
        Vector(self.0.column(k).into_owned())
    }
}

impl<const D: usize> std::ops::Index<(usize, usize)> for Direction<D> {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        &self.0[(row, col)]
    }
}

impl<const D: usize> std::ops::Mul<Vector<D>> for Direction<D> {
    type Output = Vector<D>;

    fn mul(self, v: Vector<D>) -> Vector<D> {
        Vector(self.0 * v.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_layout() {
        let d = Direction::<2>::from_row_slice(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(d[(0, 1)], 2.0);
        assert_eq!(d[(1, 0)], 3.0);
        assert_eq!(d.to_row_vec(), vec![1.0, 2.0, 3.0, 4.0]);
        assert!(Direction::<2>::from_row_slice(&[1.0; 3]).is_none());
    }

    #[test]
    fn test_axes_are_columns() {
        // Quarter turn: index x points along physical y.
        let d = Direction::<2>::from_row_slice(&[0.0, -1.0, 1.0, 0.0]).unwrap();
        assert_eq!(d.axis(0).0.as_slice(), &[0.0, 1.0]);
        assert_eq!(d.axis(1).0.as_slice(), &[-1.0, 0.0]);

        let v = d * Vector::new([2.0, 0.0]);
        assert!((v[1] - 2.0).abs() < 1e-12);
    }
}
