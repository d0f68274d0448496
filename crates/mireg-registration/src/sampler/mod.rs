//! Fixed image samplers.

pub mod trait_;
pub mod random_coordinate;
pub mod random;
pub mod full;

pub use trait_::{ImageSample, ImageSampler};
pub use random_coordinate::RandomCoordinateSampler;
pub use random::RandomSampler;
pub use full::FullSampler;

use crate::config::SamplerKind;

/// Build the sampler selected by the configuration.
pub fn create_sampler<const D: usize>(kind: SamplerKind, seed: u64, max_attempts: usize) -> Box<dyn ImageSampler<D>> {
    match kind {
        SamplerKind::RandomCoordinate => Box::new(RandomCoordinateSampler::new(seed, max_attempts)),
        SamplerKind::Random => Box::new(RandomSampler::new(seed, max_attempts)),
        SamplerKind::Full => Box::new(FullSampler::new()),
    }
}
