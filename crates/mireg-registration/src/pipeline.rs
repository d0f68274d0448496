//! Chains of registrations sharing one fixed and one moving image.
//!
//! Each stage runs its own configuration and starts from the previous
//! stage's final transform, which it keeps fixed as its initial transform.

use std::sync::Arc;
use burn::tensor::backend::Backend;
use thiserror::Error;
use mireg_core::image::{Image, ImageMask};
use mireg_core::transform::Transform;
use crate::config::{ParameterMap, RegistrationConfig};
use crate::error::{RegistrationError, RunFailure};
use crate::multires::{MultiResolutionRegistration, RegistrationResult};
use crate::progress::{CancellationToken, ProgressCallback};

/// A pipeline stage failed.
#[derive(Error, Debug, Clone)]
pub enum PipelineFailure {
    /// A parameter map did not produce a valid configuration.
    #[error("invalid configuration for stage {stage}: {cause}")]
    Configuration { stage: usize, cause: RegistrationError },

    #[error("stage {stage} failed after {completed_stages} completed stages: {failure}")]
    Run {
        stage: usize,
        completed_stages: usize,
        failure: RunFailure,
    },
}

/// Sequence of registrations, initial transform first.
pub struct RegistrationPipeline<B: Backend, const D: usize> {
    stages: Vec<RegistrationConfig<D>>,
    fixed_mask: Option<ImageMask<D>>,
    moving_mask: Option<ImageMask<D>>,
    initial_transform: Option<Box<dyn Transform<D>>>,
    callbacks: Vec<Arc<dyn ProgressCallback>>,
    cancellation: CancellationToken,
    _backend: std::marker::PhantomData<B>,
}

impl<B: Backend, const D: usize> RegistrationPipeline<B, D> {
    pub fn new(stages: Vec<RegistrationConfig<D>>) -> Self {
        Self {
            stages,
            fixed_mask: None,
            moving_mask: None,
            initial_transform: None,
            callbacks: Vec::new(),
            cancellation: CancellationToken::new(),
            _backend: std::marker::PhantomData,
        }
    }

    /// Validate one configuration per parameter map.
    pub fn from_parameter_maps(maps: &[ParameterMap]) -> Result<Self, PipelineFailure> {
        let stages = maps
            .iter()
            .enumerate()
            .map(|(stage, map)| {
                RegistrationConfig::from_parameter_map(map).map_err(|cause| PipelineFailure::Configuration { stage, cause })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(stages))
    }

    pub fn with_fixed_mask(mut self, mask: ImageMask<D>) -> Self {
        self.fixed_mask = Some(mask);
        self
    }

    pub fn with_moving_mask(mut self, mask: ImageMask<D>) -> Self {
        self.moving_mask = Some(mask);
        self
    }

    /// Initial transform of the first stage.
    pub fn with_initial_transform(mut self, transform: Box<dyn Transform<D>>) -> Self {
        self.initial_transform = Some(transform);
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn stages(&self) -> &[RegistrationConfig<D>] {
        &self.stages
    }

    /// Run every stage in order.
    ///
    /// Returns the result of each stage; the last one holds the final
    /// transform and result image.
    pub fn execute(
        &self,
        fixed: &Image<B, D>,
        moving: &Image<B, D>,
    ) -> Result<Vec<RegistrationResult<B, D>>, PipelineFailure>
    where
        Image<B, D>: Send + Sync,
    {
        let mut results: Vec<RegistrationResult<B, D>> = Vec::with_capacity(self.stages.len());
        for (stage, config) in self.stages.iter().enumerate() {
            tracing::info!("Starting stage {}/{}", stage + 1, self.stages.len());

            let mut registration =
                MultiResolutionRegistration::<B, D>::new(config.clone()).with_cancellation(self.cancellation.clone());
            if let Some(mask) = &self.fixed_mask {
                registration = registration.with_fixed_mask(mask.clone());
            }
            if let Some(mask) = &self.moving_mask {
                registration = registration.with_moving_mask(mask.clone());
            }
            for callback in &self.callbacks {
                registration = registration.with_callback(callback.clone());
            }
            let initial = match results.last() {
                Some(previous) => Some(previous.transform.clone_box()),
                None => self.initial_transform.clone(),
            };
            if let Some(initial) = initial {
                registration = registration.with_initial_transform(initial);
            }

            let result = registration.execute(fixed, moving).map_err(|failure| PipelineFailure::Run {
                stage,
                completed_stages: results.len(),
                failure,
            })?;
            results.push(result);
        }
        Ok(results)
    }
}
