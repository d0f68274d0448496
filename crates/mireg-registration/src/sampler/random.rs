use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use mireg_core::image::ImageMask;
use mireg_core::interpolation::ImageAccessor;
use crate::error::Result;
use super::random_coordinate::finish;
use super::{ImageSample, ImageSampler};

/// Random pixel centres, drawn with replacement.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: StdRng,
    max_attempts: usize,
}

impl RandomSampler {
    pub fn new(seed: u64, max_attempts: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_attempts: max_attempts.max(1),
        }
    }
}

impl<const D: usize> ImageSampler<D> for RandomSampler {
    fn sample(
        &mut self,
        fixed: &ImageAccessor<D>,
        mask: Option<&ImageMask<D>>,
        count: usize,
    ) -> Result<Vec<ImageSample<D>>> {
        let geometry = fixed.geometry();
        let n = geometry.number_of_pixels();
        let mut samples = Vec::with_capacity(count);
        let mut attempts = 0;
        let max_draws = count.saturating_mul(self.max_attempts);

        while samples.len() < count && attempts < max_draws {
            attempts += 1;
            let linear = self.rng.gen_range(0..n);
            let point = geometry.index_point(&geometry.index_from_linear(linear));
            if mask.map_or(true, |m| m.is_inside(&point)) {
                samples.push(ImageSample {
                    point,
                    fixed_value: fixed.values()[linear],
                });
            }
        }

        finish(samples, count, attempts)
    }

    fn name(&self) -> &'static str {
        "Random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mireg_core::image::ImageGeometry;

    #[test]
    fn test_samples_are_pixel_centres() {
        let geometry = ImageGeometry::<2>::with_size([5, 4]).unwrap();
        let values: Vec<f64> = (0..20).map(|v| v as f64 * 2.0).collect();
        let fixed = ImageAccessor::from_values(geometry.clone(), values, 0).unwrap();

        let samples = RandomSampler::new(3, 1).sample(&fixed, None, 30).unwrap();
        assert_eq!(samples.len(), 30);
        for s in samples {
            let c = geometry.physical_to_index(&s.point);
            assert_eq!(c[0].fract(), 0.0);
            assert_eq!(c[1].fract(), 0.0);
            let index = geometry.nearest_index(&c).unwrap();
            assert_eq!(s.fixed_value, fixed.value_at_index(&index));
        }
    }
}
