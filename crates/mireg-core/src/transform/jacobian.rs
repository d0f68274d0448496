//! Sparse transform Jacobians.

use crate::spatial::Vector;

/// Non-zero columns of a transform Jacobian at one point.
///
/// Column `columns[i]` is the derivative of the mapped point with respect
/// to parameter `indices[i]`. B-spline transforms only touch the control
/// points whose support contains the point, so most columns are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseJacobian<const D: usize> {
    pub indices: Vec<usize>,
    pub columns: Vec<Vector<D>>,
}

impl<const D: usize> SparseJacobian<D> {
    /// Jacobian with no non-zero columns.
    pub fn empty() -> Self {
        Self { indices: Vec::new(), columns: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            indices: Vec::with_capacity(capacity),
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Jacobian whose columns cover parameters `0..columns.len()`.
    pub fn dense(columns: Vec<Vector<D>>) -> Self {
        Self {
            indices: (0..columns.len()).collect(),
            columns,
        }
    }

    pub fn push(&mut self, index: usize, column: Vector<D>) {
        self.indices.push(index);
        self.columns.push(column);
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Pairs `(parameter index, gradient · column)`.
    pub fn project(&self, gradient: &Vector<D>) -> Vec<(usize, f64)> {
        self.indices
            .iter()
            .zip(self.columns.iter())
            .map(|(&i, c)| (i, c.dot(gradient)))
            .collect()
    }

    /// Displacement `J · step` caused by a parameter step.
    pub fn apply(&self, step: &[f64]) -> Vector<D> {
        let mut out = Vector::zeros();
        for (&i, c) in self.indices.iter().zip(self.columns.iter()) {
            out += *c * step[i];
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_jacobian_project_and_apply() {
        let mut j = SparseJacobian::<2>::empty();
        j.push(3, Vector::new([1.0, 0.0]));
        j.push(7, Vector::new([0.5, 2.0]));

        let projected = j.project(&Vector::new([2.0, 1.0]));
        assert_eq!(projected, vec![(3, 2.0), (7, 3.0)]);

        let mut step = vec![0.0; 8];
        step[3] = 1.0;
        step[7] = 2.0;
        assert_eq!(j.apply(&step), Vector::new([2.0, 4.0]));
    }
}
