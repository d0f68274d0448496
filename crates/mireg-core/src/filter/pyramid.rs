//! Multi-resolution image pyramids.
//!
//! A pyramid holds one image per resolution level, coarsest first. Each
//! level is derived from the full-resolution input with its own per-axis
//! shrink factor, so levels never accumulate smoothing from one another.

use burn::tensor::backend::Backend;
use crate::error::{CoreError, Result};
use crate::image::Image;
use crate::spatial::Spacing;
use super::{GaussianFilter, ShrinkFilter};

/// How a pyramid level is derived from the input image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PyramidKind {
    /// Smooth, then shrink.
    #[default]
    Recursive,
    /// Smooth only; every level keeps the input grid.
    Smoothing,
    /// Shrink only.
    Shrinking,
}

impl PyramidKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Recursive => "RecursiveImagePyramid",
            Self::Smoothing => "SmoothingImagePyramid",
            Self::Shrinking => "ShrinkingImagePyramid",
        }
    }

    /// Parse a component name such as `FixedRecursiveImagePyramid`.
    pub fn from_component_name(name: &str) -> Option<Self> {
        [Self::Recursive, Self::Smoothing, Self::Shrinking]
            .into_iter()
            .find(|kind| name.ends_with(kind.name()))
    }

    fn smooths(&self) -> bool {
        !matches!(self, Self::Shrinking)
    }

    fn shrinks(&self) -> bool {
        !matches!(self, Self::Smoothing)
    }
}

/// Per-level, per-axis shrink factors, coarsest level first.
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidSchedule<const D: usize> {
    factors: Vec<[usize; D]>,
}

impl<const D: usize> PyramidSchedule<D> {
    /// Factor `2^(levels - 1 - level)` on every axis, saturating at `usize::MAX`.
    pub fn default_schedule(levels: usize) -> Self {
        let factors = (0..levels)
            .map(|level| {
                let exponent = u32::try_from(levels - 1 - level).unwrap_or(u32::MAX);
                [1usize.checked_shl(exponent).unwrap_or(usize::MAX); D]
            })
            .collect();
        Self { factors }
    }

    /// Build from explicit per-level factors.
    pub fn from_levels(factors: Vec<[usize; D]>) -> Result<Self> {
        if factors.is_empty() {
            return Err(CoreError::InvalidSchedule { expected: D, actual: 0 });
        }
        if factors.iter().flatten().any(|&f| f == 0) {
            return Err(CoreError::geometry("pyramid factors must be at least 1"));
        }
        Ok(Self { factors })
    }

    /// Build from a flat list of `levels * D` factors, level-major.
    pub fn from_flat(values: &[usize], levels: usize) -> Result<Self> {
        if values.len() != levels * D || levels == 0 {
            return Err(CoreError::InvalidSchedule {
                expected: levels * D,
                actual: values.len(),
            });
        }
        let factors = values
            .chunks_exact(D)
            .map(|chunk| {
                let mut level = [1usize; D];
                level.copy_from_slice(chunk);
                level
            })
            .collect();
        Self::from_levels(factors)
    }

    pub fn levels(&self) -> usize {
        self.factors.len()
    }

    /// Shrink factors of a level.
    pub fn factors(&self, level: usize) -> Option<&[usize; D]> {
        self.factors.get(level)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize; D]> {
        self.factors.iter()
    }

    /// Smoothing sigma in physical units: half the factor times the spacing,
    /// zero on axes that are not shrunk.
    pub fn sigmas(factors: &[usize; D], spacing: &Spacing<D>) -> Vec<f64> {
        (0..D)
            .map(|k| if factors[k] > 1 { 0.5 * factors[k] as f64 * spacing[k] } else { 0.0 })
            .collect()
    }
}

/// Derive one pyramid level from the full-resolution image.
pub fn build_level<B: Backend, const D: usize>(
    image: &Image<B, D>,
    factors: &[usize; D],
    kind: PyramidKind,
) -> Result<Image<B, D>> {
    if factors.iter().all(|&f| f == 1) {
        return Ok(image.clone());
    }

    let smoothed = if kind.smooths() {
        let sigmas = PyramidSchedule::<D>::sigmas(factors, image.spacing());
        GaussianFilter::<B>::new(sigmas).apply(image)?
    } else {
        image.clone()
    };

    if kind.shrinks() {
        ShrinkFilter::<B>::new(factors.to_vec()).apply(&smoothed)
    } else {
        Ok(smoothed)
    }
}

/// Images of every resolution level, coarsest first.
#[derive(Debug, Clone)]
pub struct MultiResolutionPyramid<B: Backend, const D: usize> {
    levels: Vec<Image<B, D>>,
}

impl<B: Backend, const D: usize> MultiResolutionPyramid<B, D> {
    pub fn new(input: &Image<B, D>, schedule: &PyramidSchedule<D>, kind: PyramidKind) -> Result<Self> {
        let levels = schedule
            .iter()
            .map(|factors| build_level(input, factors, kind))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(levels = levels.len(), kind = kind.name(), "built image pyramid");
        Ok(Self { levels })
    }

    pub fn get_level(&self, level: usize) -> Option<&Image<B, D>> {
        self.levels.get(level)
    }

    pub fn levels(&self) -> usize {
        self.levels.len()
    }

    pub fn into_levels(self) -> Vec<Image<B, D>> {
        self.levels
    }
}
