//! Automatic estimation of the ASGD gain and of parameter scales.
//!
//! The gain numerator `a` is chosen so that the first step moves no point
//! of the fixed domain further than the maximum step length. Gradient
//! noise, measured as the spread of sampled gradients around an exact
//! gradient, sets the sigmoid scale `ω`.

use rayon::prelude::*;
use mireg_core::spatial::{Point, Spacing};
use mireg_core::transform::euler::angle_count;
use mireg_core::transform::Transform;
use crate::config::TransformKind;
use crate::error::{RegistrationError, Result};

const MIN_JACOBIAN_MEASUREMENTS: usize = 1000;
const DEGENERATE_DISPLACEMENT: f64 = 1e-12;

/// Scale of Euler rotation parameters when scales are neither given nor estimated.
pub const DEFAULT_ROTATION_SCALE: f64 = 100_000.0;

/// Fraction of the mean fixed spacing used as the default maximum step length.
pub const DEFAULT_STEP_LENGTH_FRACTION: f64 = 0.3;

/// Maximum step length when `MaximumStepLength` is not configured.
///
/// Steps of a full voxel do not decay while gradients stay consistent and
/// overshoot small structures, so the default stays well below one voxel.
pub fn default_maximum_step_length<const D: usize>(fixed_spacing: &Spacing<D>) -> f64 {
    DEFAULT_STEP_LENGTH_FRACTION * fixed_spacing.mean_spacing()
}

/// Estimated optimizer settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatedParameters {
    pub a: f64,
    /// `None` when the measured gradients showed no noise.
    pub sigmoid_scale: Option<f64>,
}

/// Number of sampled gradients when the configured count is zero.
pub fn automatic_gradient_measurements(number_of_parameters: usize) -> usize {
    (1000 / number_of_parameters.max(1)).clamp(2, 5)
}

/// Number of Jacobian sample points when the configured count is zero.
pub fn automatic_jacobian_measurements(number_of_parameters: usize, number_of_voxels: usize) -> usize {
    MIN_JACOBIAN_MEASUREMENTS.max(number_of_parameters).min(number_of_voxels.max(1))
}

/// Largest `‖J(x) · step‖` over the sample points.
pub fn maximum_displacement<const D: usize>(
    transform: &dyn Transform<D>,
    points: &[Point<D>],
    step: &[f64],
) -> f64 {
    points
        .par_iter()
        .map(|p| transform.jacobian(p).apply(step).norm())
        .reduce(|| 0.0, f64::max)
}

/// Estimate the gain numerator and the sigmoid scale.
///
/// # Arguments
/// * `transform` - Transform at the start of the level
/// * `points` - Jacobian sample points in the fixed domain
/// * `scales` - Parameter scales
/// * `gradients` - Metric derivatives over independent sample sets
/// * `exact_gradient` - Derivative over a large sample set, if measured
/// * `big_a` - Stability constant `A`
/// * `alpha` - Gain decay exponent
/// * `maximum_step_length` - Largest allowed displacement of the first step
#[allow(clippy::too_many_arguments)]
pub fn estimate_parameters<const D: usize>(
    transform: &dyn Transform<D>,
    points: &[Point<D>],
    scales: &[f64],
    gradients: &[Vec<f64>],
    exact_gradient: Option<&[f64]>,
    big_a: f64,
    alpha: f64,
    maximum_step_length: f64,
) -> Result<EstimatedParameters> {
    if gradients.is_empty() || points.is_empty() {
        return Err(RegistrationError::numerical_degeneracy(
            "no gradients or sample points to estimate the step size from",
        ));
    }

    let max_displacement = gradients
        .iter()
        .map(|g| {
            let step: Vec<f64> = g.iter().zip(scales).map(|(g, s)| g / s).collect();
            maximum_displacement(transform, points, &step)
        })
        .fold(0.0, f64::max);

    if !max_displacement.is_finite() || max_displacement < DEGENERATE_DISPLACEMENT {
        return Err(RegistrationError::numerical_degeneracy(format!(
            "maximum displacement {} is too small to estimate the step size",
            max_displacement
        )));
    }

    let a = maximum_step_length * (big_a + 1.0).powf(alpha) / max_displacement;

    let sigmoid_scale = exact_gradient.and_then(|exact| {
        let variance = gradients
            .iter()
            .map(|g| {
                g.iter()
                    .zip(exact)
                    .zip(scales)
                    .map(|((g, e), s)| (g - e) * (g - e) / s)
                    .sum::<f64>()
            })
            .sum::<f64>()
            / gradients.len() as f64;
        (variance.is_finite() && variance > 0.0).then_some(variance)
    });

    tracing::debug!(a, max_displacement, ?sigmoid_scale, "estimated optimizer parameters");
    Ok(EstimatedParameters { a, sigmoid_scale })
}

/// Scale per parameter: mean squared norm of its Jacobian column.
///
/// Parameters no sample point moves get scale 1.
pub fn estimate_scales<const D: usize>(transform: &dyn Transform<D>, points: &[Point<D>]) -> Vec<f64> {
    let n = transform.number_of_parameters();
    let sums = points
        .par_iter()
        .fold(
            || vec![0.0; n],
            |mut acc, p| {
                let jacobian = transform.jacobian(p);
                for (&i, column) in jacobian.indices.iter().zip(&jacobian.columns) {
                    acc[i] += column.norm_squared();
                }
                acc
            },
        )
        .reduce(
            || vec![0.0; n],
            |mut a, b| {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                a
            },
        );
    let count = points.len().max(1) as f64;
    sums.into_iter()
        .map(|s| {
            let mean = s / count;
            if mean > DEGENERATE_DISPLACEMENT { mean } else { 1.0 }
        })
        .collect()
}

/// Scales used when none are configured or estimated.
pub fn default_scales<const D: usize>(kind: TransformKind, number_of_parameters: usize) -> Vec<f64> {
    match kind {
        TransformKind::Euler => (0..number_of_parameters)
            .map(|i| if i < angle_count(D) { DEFAULT_ROTATION_SCALE } else { 1.0 })
            .collect(),
        TransformKind::BSpline => vec![1.0; number_of_parameters],
    }
}
