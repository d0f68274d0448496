//! Physical displacements, image gradients and Jacobian columns.

use nalgebra::SVector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector<const D: usize>(pub SVector<f64, D>);

impl<const D: usize> Vector<D> {
    pub fn new(components: [f64; D]) -> Self {
        Self(SVector::from(components))
    }

    pub fn zeros() -> Self {
        Self(SVector::zeros())
    }

    /// Unit vector along axis `k`.
    pub fn unit(k: usize) -> Self {
        let mut v = Self::zeros();
        v.0[k] = 1.0;
        v
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.as_slice().to_vec()
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.0.dot(&other.0)
    }

    pub fn norm(&self) -> f64 {
        self.0.norm()
    }

    pub fn norm_squared(&self) -> f64 {
        self.0.norm_squared()
    }
}

impl<const D: usize> std::ops::Index<usize> for Vector<D> {
    type Output = f64;

    fn index(&self, k: usize) -> &f64 {
        &self.0[k]
    }
}

impl<const D: usize> std::ops::IndexMut<usize> for Vector<D> {
    fn index_mut(&mut self, k: usize) -> &mut f64 {
        &mut self.0[k]
    }
}

macro_rules! vector_binop {
    ($trait:ident, $method:ident, $rhs:ty, |$a:ident, $b:ident| $body:expr) => {
        impl<const D: usize> std::ops::$trait<$rhs> for Vector<D> {
            type Output = Vector<D>;

            fn $method(self, rhs: $rhs) -> Vector<D> {
                let ($a, $b) = (self, rhs);
                Vector($body)
            }
        }
    };
}

vector_binop!(Add, add, Vector<D>, |a, b| a.0 + b.0);
vector_binop!(Sub, sub, Vector<D>, |a, b| a.0 - b.0);
vector_binop!(Mul, mul, f64, |a, s| a.0 * s);
vector_binop!(Div, div, f64, |a, s| a.0 / s);

impl<const D: usize> std::ops::AddAssign for Vector<D> {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl<const D: usize> std::ops::Neg for Vector<D> {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}
