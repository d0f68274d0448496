//! Recursive B-spline prefilter.
//!
//! Converts samples into coefficients of an interpolating spline, so that
//! evaluating the spline at integer positions reproduces the samples.
//! Boundaries are handled by mirror symmetric extension.

use crate::error::{CoreError, Result};

const TOLERANCE: f64 = 1e-10;

/// Poles of the prefilter for a spline order. Orders 0 and 1 need none.
fn poles(order: usize) -> Result<&'static [f64]> {
    const QUADRATIC: [f64; 1] = [-0.171_572_875_253_809_9]; // sqrt(8) - 3
    const CUBIC: [f64; 1] = [-0.267_949_192_431_122_7]; // sqrt(3) - 2
    match order {
        0 | 1 => Ok(&[]),
        2 => Ok(&QUADRATIC),
        3 => Ok(&CUBIC),
        other => Err(CoreError::UnsupportedOrder(other)),
    }
}

/// Prefilter one line of samples in place.
pub fn prefilter_line(line: &mut [f64], order: usize) -> Result<()> {
    let poles = poles(order)?;
    let n = line.len();
    if n < 2 || poles.is_empty() {
        return Ok(());
    }

    let gain: f64 = poles.iter().map(|&z| (1.0 - z) * (1.0 - 1.0 / z)).product();
    for v in line.iter_mut() {
        *v *= gain;
    }

    for &z in poles {
        line[0] = initial_causal(line, z);
        for k in 1..n {
            line[k] += z * line[k - 1];
        }
        line[n - 1] = initial_anticausal(line, z);
        for k in (0..n - 1).rev() {
            line[k] = z * (line[k + 1] - line[k]);
        }
    }
    Ok(())
}

fn initial_causal(c: &[f64], z: f64) -> f64 {
    let n = c.len();
    let horizon = (TOLERANCE.ln() / z.abs().ln()).ceil() as usize;

    if horizon < n {
        let mut zn = z;
        let mut sum = c[0];
        for &v in c.iter().take(horizon).skip(1) {
            sum += zn * v;
            zn *= z;
        }
        sum
    } else {
        let iz = 1.0 / z;
        let mut zn = z;
        let mut z2n = z.powi(n as i32 - 1);
        let mut sum = c[0] + z2n * c[n - 1];
        z2n *= z2n * iz;
        for &v in c.iter().take(n - 1).skip(1) {
            sum += (zn + z2n) * v;
            zn *= z;
            z2n *= iz;
        }
        sum / (1.0 - zn * zn)
    }
}

fn initial_anticausal(c: &[f64], z: f64) -> f64 {
    let n = c.len();
    (z / (z * z - 1.0)) * (z * c[n - 2] + c[n - 1])
}

/// Compute interpolating coefficients of an image stored in linear order.
///
/// # Arguments
/// * `values` - Samples, index axis 0 fastest
/// * `size` - Grid size in index order
/// * `order` - Spline order (0 to 3)
pub fn bspline_coefficients<const D: usize>(
    values: &[f64],
    size: [usize; D],
    order: usize,
) -> Result<Vec<f64>> {
    let total: usize = size.iter().product();
    if values.len() != total {
        return Err(CoreError::image(format!(
            "expected {} samples, got {}",
            total,
            values.len()
        )));
    }

    let mut coefficients = values.to_vec();
    if order < 2 {
        poles(order)?;
        return Ok(coefficients);
    }

    let mut stride = 1;
    let mut line = Vec::new();
    for &n in size.iter() {
        let lines = total / n;
        line.resize(n, 0.0);
        for l in 0..lines {
            let lower = l % stride;
            let upper = l / stride;
            let base = upper * stride * n + lower;
            for (i, v) in line.iter_mut().enumerate() {
                *v = coefficients[base + i * stride];
            }
            prefilter_line(&mut line, order)?;
            for (i, v) in line.iter().enumerate() {
                coefficients[base + i * stride] = *v;
            }
        }
        stride *= n;
    }
    Ok(coefficients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::kernel::bspline;

    fn reconstruct(coefficients: &[f64], order: usize, i: usize) -> f64 {
        // Mirror boundary, as assumed by the prefilter.
        let n = coefficients.len() as i64;
        let mirror = |mut j: i64| -> usize {
            let period = 2 * n - 2;
            j = j.rem_euclid(period);
            if j >= n {
                j = period - j;
            }
            j as usize
        };
        (-3i64..=3)
            .map(|k| {
                let j = i as i64 + k;
                coefficients[mirror(j)] * bspline(order, -(k as f64))
            })
            .sum()
    }

    #[test]
    fn test_prefilter_interpolates_samples() {
        let samples = [1.0, 4.0, 2.0, 8.0, 5.0, 7.0, 3.0, 0.5];
        for order in 2..=3 {
            let mut c = samples.to_vec();
            prefilter_line(&mut c, order).unwrap();
            for i in 0..samples.len() {
                let r = reconstruct(&c, order, i);
                assert!((r - samples[i]).abs() < 1e-8, "order {} at {}: {} vs {}", order, i, r, samples[i]);
            }
        }
    }

    #[test]
    fn test_constant_signal_is_unchanged() {
        let values = vec![3.0; 12];
        let c = bspline_coefficients(&values, [4, 3], 3).unwrap();
        for v in c {
            assert!((v - 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_low_orders_copy_values() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(bspline_coefficients(&values, [2, 2], 1).unwrap(), values);
        assert!(bspline_coefficients(&values, [2, 2], 5).is_err());
        assert!(bspline_coefficients(&values, [3, 2], 3).is_err());
    }
}
