use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use mireg_core::image::ImageMask;
use mireg_core::interpolation::ImageAccessor;
use mireg_core::spatial::Point;
use crate::error::{RegistrationError, Result};
use super::{ImageSample, ImageSampler};

/// Uniformly distributed continuous positions over the fixed image.
///
/// Continuous indices are drawn in `[0, size - 1]` on every axis, so samples
/// fall between pixel centres and the fixed image is interpolated there.
/// Masked draws are retried up to `max_attempts` times per requested sample.
#[derive(Debug, Clone)]
pub struct RandomCoordinateSampler {
    rng: StdRng,
    max_attempts: usize,
}

impl RandomCoordinateSampler {
    pub fn new(seed: u64, max_attempts: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_attempts: max_attempts.max(1),
        }
    }
}

impl<const D: usize> ImageSampler<D> for RandomCoordinateSampler {
    fn sample(
        &mut self,
        fixed: &ImageAccessor<D>,
        mask: Option<&ImageMask<D>>,
        count: usize,
    ) -> Result<Vec<ImageSample<D>>> {
        let geometry = fixed.geometry();
        let size = geometry.size();
        let mut samples = Vec::with_capacity(count);
        let mut attempts = 0;
        let max_draws = count.saturating_mul(self.max_attempts);

        while samples.len() < count && attempts < max_draws {
            attempts += 1;
            let mut c = Point::<D>::origin();
            for k in 0..D {
                c[k] = self.rng.gen_range(0.0..=(size[k] - 1) as f64);
            }
            let point = geometry.index_to_physical(&c);
            if mask.map_or(true, |m| m.is_inside(&point)) {
                if let Some(fixed_value) = fixed.evaluate(&point) {
                    samples.push(ImageSample { point, fixed_value });
                }
            }
        }

        finish(samples, count, attempts)
    }

    fn name(&self) -> &'static str {
        "RandomCoordinate"
    }
}

/// Shared outcome policy of the rejection samplers.
pub(crate) fn finish<const D: usize>(
    samples: Vec<ImageSample<D>>,
    count: usize,
    attempts: usize,
) -> Result<Vec<ImageSample<D>>> {
    if samples.is_empty() && count > 0 {
        return Err(RegistrationError::domain(format!(
            "no sample inside the mask after {} attempts",
            attempts
        )));
    }
    if samples.len() < count {
        tracing::warn!(
            requested = count,
            drawn = samples.len(),
            attempts,
            "sampling attempts exhausted, continuing with fewer samples"
        );
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mireg_core::image::ImageGeometry;

    fn accessor() -> ImageAccessor<2> {
        let geometry = ImageGeometry::<2>::with_size([8, 6]).unwrap();
        let values = (0..48).map(|v| v as f64).collect();
        ImageAccessor::from_values(geometry, values, 1).unwrap()
    }

    #[test]
    fn test_same_seed_same_samples() {
        let fixed = accessor();
        let a = RandomCoordinateSampler::new(7, 10).sample(&fixed, None, 50).unwrap();
        let b = RandomCoordinateSampler::new(7, 10).sample(&fixed, None, 50).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);

        let mut sampler = RandomCoordinateSampler::new(7, 10);
        let first = ImageSampler::<2>::sample(&mut sampler, &fixed, None, 50).unwrap();
        let second = ImageSampler::<2>::sample(&mut sampler, &fixed, None, 50).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_samples_stay_in_domain_and_mask() {
        let fixed = accessor();
        let geometry = fixed.geometry().clone();
        let values = (0..48).map(|l| geometry.index_from_linear(l)[0] < 3).collect();
        let mask = ImageMask::new(geometry.clone(), values).unwrap();

        let samples = RandomCoordinateSampler::new(1, 20).sample(&fixed, Some(&mask), 200).unwrap();
        for s in &samples {
            assert!(geometry.contains(&s.point));
            assert!(mask.is_inside(&s.point));
            assert_eq!(fixed.evaluate(&s.point), Some(s.fixed_value));
        }
    }

    #[test]
    fn test_empty_mask_is_a_domain_error() {
        let fixed = accessor();
        let mask = ImageMask::new(fixed.geometry().clone(), vec![false; 48]).unwrap();
        let err = RandomCoordinateSampler::new(1, 3).sample(&fixed, Some(&mask), 10).unwrap_err();
        assert!(err.is_recoverable());
    }
}
