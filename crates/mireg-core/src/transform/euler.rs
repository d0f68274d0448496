//! Euler (rigid) transform.
//!
//! `T(x) = R (x - c) + c + t` with rotation `R` about a fixed center `c`.
//! In 2D the parameters are `(θ, tx, ty)`. In 3D they are
//! `(θx, θy, θz, tx, ty, tz)` with `R = Rz(θz) · Ry(θy) · Rx(θx)`.

use nalgebra::{Matrix2, Matrix3, SMatrix};
use crate::error::{CoreError, Result};
use crate::spatial::{Point, Vector};
use super::{SparseJacobian, Transform, TransformDescription};

/// Number of rotation angles for a dimensionality.
pub const fn angle_count(dimension: usize) -> usize {
    match dimension {
        2 => 1,
        3 => 3,
        _ => 0,
    }
}

/// Rigid rotation plus translation about a center of rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct EulerTransform<const D: usize> {
    center: Point<D>,
    parameters: Vec<f64>,
}

impl<const D: usize> EulerTransform<D> {
    /// Identity transform rotating about `center`.
    pub fn new(center: Point<D>) -> Self {
        Self {
            center,
            parameters: vec![0.0; angle_count(D) + D],
        }
    }

    /// Transform with explicit parameters.
    pub fn with_parameters(center: Point<D>, parameters: &[f64]) -> Result<Self> {
        let mut t = Self::new(center);
        t.set_parameters(parameters)?;
        Ok(t)
    }

    pub fn center(&self) -> &Point<D> {
        &self.center
    }

    pub fn set_center(&mut self, center: Point<D>) {
        self.center = center;
    }

    /// Rotation angles in radians.
    pub fn angles(&self) -> &[f64] {
        &self.parameters[..angle_count(D)]
    }

    pub fn translation(&self) -> Vector<D> {
        let mut t = Vector::zeros();
        for k in 0..D {
            t[k] = self.parameters[angle_count(D) + k];
        }
        t
    }

    pub fn set_translation(&mut self, translation: Vector<D>) {
        for k in 0..D {
            self.parameters[angle_count(D) + k] = translation[k];
        }
    }

    /// Rotation matrix built from the current angles.
    pub fn rotation_matrix(&self) -> SMatrix<f64, D, D> {
        match D {
            2 => embed2(&rotation_2d(self.parameters[0]).0),
            3 => {
                let [rx, ry, rz] = axis_rotations(self.angles());
                embed3(&(rz.0 * ry.0 * rx.0))
            }
            _ => SMatrix::identity(),
        }
    }

    /// Derivatives of the rotation matrix with respect to each angle.
    fn rotation_derivatives(&self) -> Vec<SMatrix<f64, D, D>> {
        match D {
            2 => vec![embed2(&rotation_2d(self.parameters[0]).1)],
            3 => {
                let [rx, ry, rz] = axis_rotations(self.angles());
                vec![
                    embed3(&(rz.0 * ry.0 * rx.1)),
                    embed3(&(rz.0 * ry.1 * rx.0)),
                    embed3(&(rz.1 * ry.0 * rx.0)),
                ]
            }
            _ => Vec::new(),
        }
    }

    /// Map a moving-space point back to fixed space.
    pub fn inverse_transform_point(&self, point: &Point<D>) -> Point<D> {
        let r = self.rotation_matrix();
        let offset = point.0 - self.center.0 - self.translation().0;
        Point(self.center.0 + r.transpose() * offset)
    }

    /// Closed-form inverse about the same center.
    pub fn inverse_transform(&self) -> Self {
        let rt = self.rotation_matrix().transpose();
        let angles: Vec<f64> = match D {
            2 => vec![-self.parameters[0]],
            3 => {
                let beta = (-rt[(2, 0)]).clamp(-1.0, 1.0).asin();
                let alpha = rt[(2, 1)].atan2(rt[(2, 2)]);
                let gamma = rt[(1, 0)].atan2(rt[(0, 0)]);
                vec![alpha, beta, gamma]
            }
            _ => Vec::new(),
        };
        let translation = -(rt * self.translation().0);

        let mut parameters = angles;
        parameters.extend(translation.iter().copied());
        Self {
            center: self.center,
            parameters,
        }
    }
}

fn rotation_2d(theta: f64) -> (Matrix2<f64>, Matrix2<f64>) {
    let (s, c) = theta.sin_cos();
    (Matrix2::new(c, -s, s, c), Matrix2::new(-s, -c, c, -s))
}

/// Rotations about x, y and z with their angle derivatives.
fn axis_rotations(angles: &[f64]) -> [(Matrix3<f64>, Matrix3<f64>); 3] {
    let (sa, ca) = angles[0].sin_cos();
    let (sb, cb) = angles[1].sin_cos();
    let (sg, cg) = angles[2].sin_cos();
    [
        (
            Matrix3::new(1.0, 0.0, 0.0, 0.0, ca, -sa, 0.0, sa, ca),
            Matrix3::new(0.0, 0.0, 0.0, 0.0, -sa, -ca, 0.0, ca, -sa),
        ),
        (
            Matrix3::new(cb, 0.0, sb, 0.0, 1.0, 0.0, -sb, 0.0, cb),
            Matrix3::new(-sb, 0.0, cb, 0.0, 0.0, 0.0, -cb, 0.0, -sb),
        ),
        (
            Matrix3::new(cg, -sg, 0.0, sg, cg, 0.0, 0.0, 0.0, 1.0),
            Matrix3::new(-sg, -cg, 0.0, cg, -sg, 0.0, 0.0, 0.0, 0.0),
        ),
    ]
}

fn embed2<const D: usize>(m: &Matrix2<f64>) -> SMatrix<f64, D, D> {
    let mut out = SMatrix::<f64, D, D>::identity();
    for r in 0..D.min(2) {
        for c in 0..D.min(2) {
            out[(r, c)] = m[(r, c)];
        }
    }
    out
}

fn embed3<const D: usize>(m: &Matrix3<f64>) -> SMatrix<f64, D, D> {
    let mut out = SMatrix::<f64, D, D>::identity();
    for r in 0..D.min(3) {
        for c in 0..D.min(3) {
            out[(r, c)] = m[(r, c)];
        }
    }
    out
}

impl<const D: usize> Transform<D> for EulerTransform<D> {
    fn transform_point(&self, point: &Point<D>) -> Point<D> {
        let r = self.rotation_matrix();
        Point(self.center.0 + r * (point.0 - self.center.0) + self.translation().0)
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
        let offset = point.0 - self.center.0;
        let mut columns: Vec<Vector<D>> = self
            .rotation_derivatives()
            .into_iter()
            .map(|dr| Vector(dr * offset))
            .collect();
        columns.extend((0..D).map(Vector::unit));
        SparseJacobian::dense(columns)
    }

    fn name(&self) -> &'static str {
        "EulerTransform"
    }

    fn description(&self) -> TransformDescription<D> {
        TransformDescription::Euler {
            center: self.center,
            parameters: self.parameters.clone(),
        }
    }

    fn clone_box(&self) -> Box<dyn Transform<D>> {
        Box::new(self.clone())
    }

    fn inverse(&self) -> Option<Box<dyn Transform<D>>> {
        Some(Box::new(self.inverse_transform()))
    }
}
