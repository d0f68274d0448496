use rayon::prelude::*;
use mireg_core::image::ImageMask;
use mireg_core::interpolation::ImageAccessor;
use crate::error::{RegistrationError, Result};
use super::{ImageSample, ImageSampler};

/// Every pixel centre inside the mask, in linear order.
#[derive(Debug, Clone, Default)]
pub struct FullSampler;

impl FullSampler {
    pub fn new() -> Self {
        Self
    }
}

impl<const D: usize> ImageSampler<D> for FullSampler {
    fn sample(
        &mut self,
        fixed: &ImageAccessor<D>,
        mask: Option<&ImageMask<D>>,
        _count: usize,
    ) -> Result<Vec<ImageSample<D>>> {
        let geometry = fixed.geometry();
        let samples: Vec<ImageSample<D>> = (0..geometry.number_of_pixels())
            .into_par_iter()
            .filter_map(|linear| {
                let point = geometry.index_point(&geometry.index_from_linear(linear));
                mask.map_or(true, |m| m.is_inside(&point)).then(|| ImageSample {
                    point,
                    fixed_value: fixed.values()[linear],
                })
            })
            .collect();

        if samples.is_empty() {
            return Err(RegistrationError::domain("mask contains no fixed image pixel"));
        }
        Ok(samples)
    }

    fn name(&self) -> &'static str {
        "Full"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mireg_core::image::ImageGeometry;

    #[test]
    fn test_full_sampler_visits_masked_pixels_in_order() {
        let geometry = ImageGeometry::<2>::with_size([4, 3]).unwrap();
        let fixed = ImageAccessor::from_values(geometry.clone(), (0..12).map(|v| v as f64).collect(), 1).unwrap();
        let mask = ImageMask::new(geometry, (0..12).map(|l| l % 2 == 0).collect()).unwrap();

        let samples = FullSampler::new().sample(&fixed, Some(&mask), 0).unwrap();
        let values: Vec<f64> = samples.iter().map(|s| s.fixed_value).collect();
        assert_eq!(values, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);

        let all = FullSampler::new().sample(&fixed, None, 3).unwrap();
        assert_eq!(all.len(), 12);
    }
}
