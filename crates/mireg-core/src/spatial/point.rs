//! Physical points.

use nalgebra::{Point as NaPoint, SVector};
use serde::{Deserialize, Serialize};
use super::Vector;

/// Position in physical space; also used for continuous indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point<const D: usize>(pub NaPoint<f64, D>);

impl<const D: usize> Point<D> {
    pub fn new(coords: [f64; D]) -> Self {
        Self(NaPoint::from(coords))
    }

    pub fn origin() -> Self {
        Self(NaPoint::origin())
    }

    pub fn from_vector(coords: SVector<f64, D>) -> Self {
        Self(NaPoint::from(coords))
    }

    /// `None` unless exactly `D` coordinates are given.
    pub fn from_slice(coords: &[f64]) -> Option<Self> {
        (coords.len() == D).then(|| Self::from_vector(SVector::from_column_slice(coords)))
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.coords.as_slice().to_vec()
    }

    /// Offset from the origin.
    pub fn coords(&self) -> Vector<D> {
        Vector(self.0.coords)
    }

    pub fn distance(&self, other: &Self) -> f64 {
        (*self - *other).norm()
    }
}

impl<const D: usize> std::ops::Index<usize> for Point<D> {
    type Output = f64;

    fn index(&self, k: usize) -> &f64 {
        &self.0.coords[k]
    }
}

impl<const D: usize> std::ops::IndexMut<usize> for Point<D> {
    fn index_mut(&mut self, k: usize) -> &mut f64 {
        &mut self.0.coords[k]
    }
}

impl<const D: usize> std::ops::Sub for Point<D> {
    type Output = Vector<D>;

    fn sub(self, rhs: Self) -> Vector<D> {
        Vector(self.0 - rhs.0)
    }
}

impl<const D: usize> std::ops::Add<Vector<D>> for Point<D> {
    type Output = Self;

    fn add(self, rhs: Vector<D>) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl<const D: usize> std::ops::Sub<Vector<D>> for Point<D> {
    type Output = Self;

    fn sub(self, rhs: Vector<D>) -> Self {
        Self(self.0 - rhs.0)
    }
}
