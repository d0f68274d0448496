//! Validation helpers for registration settings.

use crate::error::{RegistrationError, Result};

/// Two padding bins per side plus at least one interior bin.
pub const MIN_HISTOGRAM_BINS: usize = 6;

/// Validate a histogram bin count.
pub fn validate_histogram_bins(bins: usize) -> Result<()> {
    if bins < MIN_HISTOGRAM_BINS {
        return Err(RegistrationError::configuration(format!(
            "NumberOfHistogramBins must be at least {}, got {}",
            MIN_HISTOGRAM_BINS, bins
        )));
    }
    Ok(())
}

/// Largest accepted `NumberOfResolutions`; the coarsest factor is `2^(levels - 1)`.
pub const MAX_RESOLUTIONS: usize = 32;

/// Validate a resolution level count.
pub fn validate_resolutions(levels: usize) -> Result<()> {
    if !(1..=MAX_RESOLUTIONS).contains(&levels) {
        return Err(RegistrationError::configuration(format!(
            "NumberOfResolutions must be between 1 and {}, got {}",
            MAX_RESOLUTIONS, levels
        )));
    }
    Ok(())
}

/// Validate an interpolation or Parzen kernel order (0 to 3).
pub fn validate_interpolation_order(option: &str, order: usize) -> Result<()> {
    if order > mireg_core::interpolation::MAX_SPLINE_ORDER {
        return Err(RegistrationError::configuration(format!(
            "{} must be between 0 and 3, got {}",
            option, order
        )));
    }
    Ok(())
}

/// Validate a B-spline transform order (1 to 3).
pub fn validate_spline_order(order: usize) -> Result<()> {
    if !(1..=3).contains(&order) {
        return Err(RegistrationError::configuration(format!(
            "BSplineTransformSplineOrder must be between 1 and 3, got {}",
            order
        )));
    }
    Ok(())
}

/// Validate a value in `(0, 1]`.
pub fn validate_ratio(option: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(RegistrationError::configuration(format!(
            "{} must be in (0, 1], got {}",
            option, value
        )));
    }
    Ok(())
}

/// Validate a finite, strictly positive value.
pub fn validate_positive(option: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(RegistrationError::configuration(format!(
            "{} must be positive, got {}",
            option, value
        )));
    }
    Ok(())
}

/// Validate a finite, non-negative value.
pub fn validate_non_negative(option: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(RegistrationError::configuration(format!(
            "{} must be non-negative, got {}",
            option, value
        )));
    }
    Ok(())
}

/// Validate the length of a flattened schedule.
pub fn validate_schedule_length(option: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(RegistrationError::InvalidSchedule {
            option: option.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Validate a per-level sample count.
pub fn validate_sample_count(samples: usize) -> Result<()> {
    if samples == 0 {
        return Err(RegistrationError::configuration(
            "NumberOfSpatialSamples must be at least 1",
        ));
    }
    Ok(())
}
