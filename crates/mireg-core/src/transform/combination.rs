//! Combination of a fixed initial transform with an optimizable one.
//!
//! `Compose`: `T(x) = T_current(T_initial(x))`.
//! `Add`: `T(x) = T_current(x) + T_initial(x) - x`.
//! Only the current transform's parameters are exposed.

use crate::error::Result;
use crate::spatial::Point;
use super::{SparseJacobian, Transform, TransformDescription};

/// How the initial and current transforms are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombinationMode {
    #[default]
    Compose,
    Add,
}

impl CombinationMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Compose => "Compose",
            Self::Add => "Add",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Compose" => Some(Self::Compose),
            "Add" => Some(Self::Add),
            _ => None,
        }
    }
}

/// Initial transform combined with the transform being optimized.
#[derive(Debug, Clone)]
pub struct CombinationTransform<const D: usize> {
    initial: Option<Box<dyn Transform<D>>>,
    current: Box<dyn Transform<D>>,
    mode: CombinationMode,
}

impl<const D: usize> CombinationTransform<D> {
    /// Wrap a transform without an initial transform.
    pub fn new(current: Box<dyn Transform<D>>) -> Self {
        Self {
            initial: None,
            current,
            mode: CombinationMode::Compose,
        }
    }

    /// Combine `current` with a fixed `initial` transform.
    pub fn with_initial(
        initial: Box<dyn Transform<D>>,
        current: Box<dyn Transform<D>>,
        mode: CombinationMode,
    ) -> Self {
        Self {
            initial: Some(initial),
            current,
            mode,
        }
    }

    pub fn initial(&self) -> Option<&dyn Transform<D>> {
        self.initial.as_deref()
    }

    pub fn current(&self) -> &dyn Transform<D> {
        self.current.as_ref()
    }

    /// Swap in a new current transform, returning the old one.
    pub fn replace_current(&mut self, current: Box<dyn Transform<D>>) -> Box<dyn Transform<D>> {
        std::mem::replace(&mut self.current, current)
    }

    pub fn mode(&self) -> CombinationMode {
        self.mode
    }
}

impl<const D: usize> Transform<D> for CombinationTransform<D> {
    fn transform_point(&self, point: &Point<D>) -> Point<D> {
        match (&self.initial, self.mode) {
            (None, _) => self.current.transform_point(point),
            (Some(initial), CombinationMode::Compose) => {
                self.current.transform_point(&initial.transform_point(point))
            }
            (Some(initial), CombinationMode::Add) => {
                let a = self.current.transform_point(point) - *point;
                initial.transform_point(point) + a
            }
        }
    }

    fn number_of_parameters(&self) -> usize {
        self.current.number_of_parameters()
    }

    fn parameters(&self) -> &[f64] {
        self.current.parameters()
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        self.current.set_parameters(parameters)
    }

    fn jacobian(&self, point: &Point<D>) -> SparseJacobian<D> {
        match (&self.initial, self.mode) {
            (Some(initial), CombinationMode::Compose) => {
                self.current.jacobian(&initial.transform_point(point))
            }
            _ => self.current.jacobian(point),
        }
    }

    fn name(&self) -> &'static str {
        self.current.name()
    }

    fn description(&self) -> TransformDescription<D> {
        TransformDescription::Combination {
            initial: self.initial.as_ref().map(|t| Box::new(t.description())),
            current: Box::new(self.current.description()),
            mode: self.mode,
        }
    }

    fn clone_box(&self) -> Box<dyn Transform<D>> {
        Box::new(self.clone())
    }

    fn inverse(&self) -> Option<Box<dyn Transform<D>>> {
        let current_inverse = self.current.inverse()?;
        match (&self.initial, self.mode) {
            (None, _) => Some(current_inverse),
            (Some(initial), CombinationMode::Compose) => Some(Box::new(Self::with_initial(
                current_inverse,
                initial.inverse()?,
                CombinationMode::Compose,
            ))),
            (Some(_), CombinationMode::Add) => None,
        }
    }
}
