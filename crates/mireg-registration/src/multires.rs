//! Multi-resolution registration driver.
//!
//! Levels run coarse to fine through an explicit state sequence:
//! `LevelSetup → Optimizing → LevelAdvance → … → Done`. Each level works on
//! an immutable [`LevelSettings`] snapshot; the transform, the optimizer
//! time and the list of finished levels are the only state carried from one
//! level to the next.

use std::marker::PhantomData;
use std::sync::Arc;
use burn::tensor::backend::Backend;
use mireg_core::filter::{MultiResolutionPyramid, ResampleImageFilter};
use mireg_core::image::{Image, ImageMask};
use mireg_core::interpolation::ImageAccessor;
use mireg_core::spatial::{Direction, Point};
use mireg_core::transform::{
    BSplineTransform, CombinationTransform, EulerTransform, Transform, TransformDescription,
};
use crate::config::{LevelSettings, ParameterMap, RegistrationConfig, TransformKind};
use crate::error::{RegistrationError, Result, RunFailure};
use crate::initialization::initialize_euler;
use crate::metric::{AdvancedMattesMutualInformation, Metric};
use crate::optimizer::parameter_estimation::{
    automatic_gradient_measurements, automatic_jacobian_measurements, default_maximum_step_length,
};
use crate::optimizer::{
    default_scales, estimate_parameters, estimate_scales, AdaptiveStochasticGradientDescent, AsgdParameters,
};
use crate::output::{transform_to_parameter_maps, ResultImage};
use crate::progress::{CancellationToken, LevelInfo, ProgressCallback, ProgressTracker};
use crate::registration::{Registration, SampleSource};
use crate::sampler::{create_sampler, FullSampler, ImageSample, ImageSampler, RandomSampler};

/// Seed offset of the samplers used for automatic estimation.
const ESTIMATION_SEED_OFFSET: u64 = 0x9E37_79B9_7F4A_7C15;

/// Outcome of one resolution level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelResult {
    pub level: usize,
    pub iterations_run: usize,
    pub skipped_iterations: usize,
    /// NaN when every iteration of the level was skipped.
    pub final_metric_value: f64,
    /// Parameters of the optimized transform after the level.
    pub parameters: Vec<f64>,
    /// Transform records after the level.
    pub transform_parameters: Vec<ParameterMap>,
}

/// Outcome of a full registration run.
#[derive(Debug, Clone)]
pub struct RegistrationResult<B: Backend, const D: usize> {
    pub transform: CombinationTransform<D>,
    pub levels: Vec<LevelResult>,
    /// Records of the final transform, initial transforms first.
    pub transform_parameters: Vec<ParameterMap>,
    /// Moving image resampled onto the fixed grid, when requested.
    pub result_image: Option<ResultImage<B, D>>,
}

/// Everything a level needs to start optimizing.
struct PreparedLevel<const D: usize> {
    settings: LevelSettings<D>,
    fixed: ImageAccessor<D>,
    fixed_mask: Option<ImageMask<D>>,
    metric: AdvancedMattesMutualInformation<D>,
    optimizer: AdaptiveStochasticGradientDescent,
    sampler: Box<dyn ImageSampler<D>>,
    exact_samples: Option<Vec<ImageSample<D>>>,
}

enum Stage<const D: usize> {
    LevelSetup(usize),
    Optimizing(Box<PreparedLevel<D>>),
    LevelAdvance(LevelResult),
    Done,
}

/// State carried across levels of one run.
struct RunState<B: Backend, const D: usize> {
    fixed: Image<B, D>,
    moving: Image<B, D>,
    fixed_levels: MultiResolutionPyramid<B, D>,
    moving_levels: MultiResolutionPyramid<B, D>,
    fixed_mask: Option<ImageMask<D>>,
    moving_mask: Option<ImageMask<D>>,
    transform: CombinationTransform<D>,
    optimizer: Option<AdaptiveStochasticGradientDescent>,
    seed: u64,
    completed: Vec<LevelResult>,
}

/// Multi-resolution registration of a moving image onto a fixed image.
///
/// # Type Parameters
/// * `B` - The backend of the input images
/// * `D` - The spatial dimensionality (2 or 3)
pub struct MultiResolutionRegistration<B: Backend, const D: usize> {
    config: RegistrationConfig<D>,
    fixed_mask: Option<ImageMask<D>>,
    moving_mask: Option<ImageMask<D>>,
    initial_transform: Option<Box<dyn Transform<D>>>,
    tracker: ProgressTracker,
    cancellation: CancellationToken,
    _backend: PhantomData<B>,
}

impl<B: Backend, const D: usize> MultiResolutionRegistration<B, D> {
    pub fn new(config: RegistrationConfig<D>) -> Self {
        Self {
            config,
            fixed_mask: None,
            moving_mask: None,
            initial_transform: None,
            tracker: ProgressTracker::new(),
            cancellation: CancellationToken::new(),
            _backend: PhantomData,
        }
    }

    /// Only draw samples inside this mask; defined on the full-resolution fixed grid.
    pub fn with_fixed_mask(mut self, mask: ImageMask<D>) -> Self {
        self.fixed_mask = Some(mask);
        self
    }

    /// Reject samples mapping outside this mask; defined on the full-resolution moving grid.
    pub fn with_moving_mask(mut self, mask: ImageMask<D>) -> Self {
        self.moving_mask = Some(mask);
        self
    }

    /// Fixed transform combined with the optimized one.
    pub fn with_initial_transform(mut self, transform: Box<dyn Transform<D>>) -> Self {
        self.initial_transform = Some(transform);
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.tracker.add_callback(callback);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn config(&self) -> &RegistrationConfig<D> {
        &self.config
    }

    /// Token that stops this registration between iterations.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Execute the multi-resolution registration.
    ///
    /// # Arguments
    /// * `fixed` - The fixed image
    /// * `moving` - The moving image
    pub fn execute(
        &self,
        fixed: &Image<B, D>,
        moving: &Image<B, D>,
    ) -> std::result::Result<RegistrationResult<B, D>, RunFailure>
    where
        Image<B, D>: Send + Sync,
    {
        let mut tracker = self.tracker.clone();
        tracker.start(self.config.levels);

        let fail = |tracker: &ProgressTracker, level, iteration, cause, completed: &[LevelResult]| {
            let failure = RunFailure {
                level,
                iteration,
                cause,
                completed: completed.to_vec(),
            };
            tracker.error(&failure.to_string());
            failure
        };

        let mut state = self
            .start(fixed, moving)
            .map_err(|cause| fail(&tracker, 0, 0, cause, &[]))?;

        let mut stage = Stage::LevelSetup(0);
        loop {
            stage = match stage {
                Stage::LevelSetup(level) => {
                    if self.cancellation.is_cancelled() {
                        return Err(fail(&tracker, level, 0, RegistrationError::Cancelled, &state.completed));
                    }
                    match self.prepare_level(level, &mut state) {
                        Ok(prepared) => Stage::Optimizing(Box::new(prepared)),
                        Err(cause) => return Err(fail(&tracker, level, 0, cause, &state.completed)),
                    }
                }
                Stage::Optimizing(prepared) => {
                    let level = prepared.settings.level;
                    match self.optimize_level(*prepared, &mut state, &mut tracker) {
                        Ok(result) => Stage::LevelAdvance(result),
                        Err((iteration, cause)) => {
                            return Err(fail(&tracker, level, iteration, cause, &state.completed));
                        }
                    }
                }
                Stage::LevelAdvance(result) => {
                    let next = result.level + 1;
                    tracker.complete_level(&LevelInfo {
                        level: result.level,
                        iterations_run: result.iterations_run,
                        skipped_iterations: result.skipped_iterations,
                        final_metric_value: result.final_metric_value,
                    });
                    state.completed.push(result);
                    if next < self.config.levels {
                        Stage::LevelSetup(next)
                    } else {
                        Stage::Done
                    }
                }
                Stage::Done => break,
            };
        }

        let last_level = self.config.levels.saturating_sub(1);
        let result = self
            .finish(fixed, state)
            .map_err(|(cause, completed)| fail(&tracker, last_level, 0, cause, &completed))?;
        tracker.complete();
        Ok(result)
    }

    /// Direction handling, pyramids, seed and the level-0 transform.
    fn start(&self, fixed: &Image<B, D>, moving: &Image<B, D>) -> Result<RunState<B, D>>
    where
        Image<B, D>: Send + Sync,
    {
        let config = &self.config;
        let (fixed, moving, fixed_mask, moving_mask) = if config.use_direction_cosines {
            (fixed.clone(), moving.clone(), self.fixed_mask.clone(), self.moving_mask.clone())
        } else {
            (
                fixed.with_direction(Direction::identity())?,
                moving.with_direction(Direction::identity())?,
                self.fixed_mask.as_ref().map(identity_direction).transpose()?,
                self.moving_mask.as_ref().map(identity_direction).transpose()?,
            )
        };

        let (fixed_levels, moving_levels) = rayon::join(
            || MultiResolutionPyramid::new(&fixed, &config.fixed_schedule, config.fixed_pyramid),
            || MultiResolutionPyramid::new(&moving, &config.moving_schedule, config.moving_pyramid),
        );
        let fixed_levels =
            fixed_levels.map_err(|e| RegistrationError::resource(format!("cannot build fixed pyramid: {}", e)))?;
        let moving_levels =
            moving_levels.map_err(|e| RegistrationError::resource(format!("cannot build moving pyramid: {}", e)))?;

        let seed = config.random_seed.unwrap_or_else(|| {
            let seed = rand::random::<u64>();
            tracing::info!(seed, "no RandomSeed configured, drawing one from entropy");
            seed
        });

        let transform = self.initial_level_transform(&fixed, &moving, fixed_mask.as_ref(), moving_mask.as_ref())?;
        tracing::info!(
            "Registering with {} levels, transform {}, {} parameters",
            config.levels,
            transform.name(),
            transform.number_of_parameters()
        );

        Ok(RunState {
            fixed,
            moving,
            fixed_levels,
            moving_levels,
            fixed_mask,
            moving_mask,
            transform,
            optimizer: None,
            seed,
            completed: Vec::new(),
        })
    }

    fn initial_level_transform(
        &self,
        fixed: &Image<B, D>,
        moving: &Image<B, D>,
        fixed_mask: Option<&ImageMask<D>>,
        moving_mask: Option<&ImageMask<D>>,
    ) -> Result<CombinationTransform<D>> {
        let config = &self.config;
        let current: Box<dyn Transform<D>> = match config.transform {
            TransformKind::Euler => {
                let euler = if config.automatic_transform_initialization {
                    initialize_euler(
                        &ImageAccessor::new(fixed, 0)?,
                        &ImageAccessor::new(moving, 0)?,
                        (fixed_mask, moving_mask),
                        config.initialization_method,
                        config.center_of_rotation,
                    )?
                } else {
                    EulerTransform::new(config.center_of_rotation.unwrap_or_else(|| fixed.geometry().center()))
                };
                Box::new(euler)
            }
            TransformKind::BSpline => {
                let spacing = config
                    .grid_spacing(0, fixed.spacing())
                    .ok_or_else(|| RegistrationError::configuration("no grid spacing for level 0"))?;
                Box::new(BSplineTransform::from_domain(fixed.geometry(), &spacing, config.spline_order)?)
            }
        };

        Ok(match &self.initial_transform {
            Some(initial) => CombinationTransform::with_initial(initial.clone(), current, config.combination),
            None => CombinationTransform::new(current),
        })
    }

    fn prepare_level(&self, level: usize, state: &mut RunState<B, D>) -> Result<PreparedLevel<D>> {
        let config = &self.config;
        let settings = config
            .level(level)
            .cloned()
            .ok_or_else(|| RegistrationError::configuration(format!("no settings for level {}", level)))?;
        if level > 0 {
            self.refine_grid(level, state)?;
        }

        let (fixed_image, moving_image) = match (state.fixed_levels.get_level(level), state.moving_levels.get_level(level)) {
            (Some(f), Some(m)) => (f, m),
            _ => return Err(RegistrationError::resource(format!("pyramid has no level {}", level))),
        };

        tracing::info!(
            "Starting level {}/{} with {} iterations, {} samples",
            level + 1,
            config.levels,
            settings.iterations,
            settings.samples
        );
        tracing::info!("  Fixed size: {:?}", fixed_image.size());
        tracing::info!("  Moving size: {:?}", moving_image.size());

        let fixed = ImageAccessor::new(fixed_image, config.fixed_interpolation_order)?;
        let moving = ImageAccessor::new(moving_image, config.moving_interpolation_order)?;
        let fixed_mask = level_mask(
            state.fixed_mask.as_ref(),
            config.erode_fixed_mask,
            config.fixed_interpolation_order,
            &settings.fixed_factors,
        );
        let moving_mask = level_mask(
            state.moving_mask.as_ref(),
            config.erode_moving_mask,
            config.moving_interpolation_order,
            &settings.moving_factors,
        );

        let mut metric = AdvancedMattesMutualInformation::new(moving, fixed.range(), settings.histogram_bins, &config.metric)?;
        if let Some(mask) = moving_mask {
            metric = metric.with_moving_mask(mask);
        }

        let level_seed = state.seed.wrapping_add(level as u64);
        let attempts = config.maximum_number_of_sampling_attempts;
        let sampler = create_sampler::<D>(config.sampler, level_seed, attempts);

        let optimizer = self.level_optimizer(&settings, &fixed, fixed_mask.as_ref(), &metric, level_seed, state)?;

        let exact_samples = if config.show_exact_metric_value {
            FullSampler::new().sample(&fixed, fixed_mask.as_ref(), 0).ok()
        } else {
            None
        };

        Ok(PreparedLevel {
            settings,
            fixed,
            fixed_mask,
            metric,
            optimizer,
            sampler,
            exact_samples,
        })
    }

    /// Move a B-spline transform onto the grid of `level`.
    fn refine_grid(&self, level: usize, state: &mut RunState<B, D>) -> Result<()> {
        if let TransformDescription::BSpline { grid, order, parameters } = state.transform.current().description() {
            let spacing = self
                .config
                .grid_spacing(level, state.fixed.spacing())
                .ok_or_else(|| RegistrationError::configuration(format!("no grid spacing for level {}", level)))?;
            let refined_grid = BSplineTransform::<D>::grid_for_domain(state.fixed.geometry(), &spacing, order)?;
            if !refined_grid.approx_eq(&grid, 1e-9) {
                tracing::debug!(level, size = ?refined_grid.size(), "refining B-spline grid");
                let refined = BSplineTransform::with_parameters(grid, order, &parameters)?.refine(refined_grid)?;
                state.transform.replace_current(Box::new(refined));
            }
        }
        Ok(())
    }

    /// Scales, gain and sigmoid scale of a level's optimizer.
    fn level_optimizer(
        &self,
        settings: &LevelSettings<D>,
        fixed: &ImageAccessor<D>,
        fixed_mask: Option<&ImageMask<D>>,
        metric: &AdvancedMattesMutualInformation<D>,
        level_seed: u64,
        state: &mut RunState<B, D>,
    ) -> Result<AdaptiveStochasticGradientDescent> {
        let config = &self.config;
        let options = &config.optimizer;
        let transform = &state.transform;
        let n = transform.number_of_parameters();
        let estimate_scales_here = config.automatic_scales_estimation && config.transform == TransformKind::Euler;

        let jacobian_points: Vec<Point<D>> = if estimate_scales_here || options.automatic_parameter_estimation {
            let count = match options.number_of_jacobian_measurements {
                0 => automatic_jacobian_measurements(n, fixed.geometry().number_of_pixels()),
                count => count,
            };
            let mut sampler = RandomSampler::new(estimation_seed(level_seed, 1), config.maximum_number_of_sampling_attempts);
            match ImageSampler::<D>::sample(&mut sampler, fixed, fixed_mask, count) {
                Ok(samples) => samples.into_iter().map(|s| s.point).collect(),
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("no Jacobian sample points: {}", e);
                    Vec::new()
                }
                Err(e) => return Err(e),
            }
        } else {
            Vec::new()
        };

        let scales = if estimate_scales_here {
            estimate_scales(transform, &jacobian_points)
        } else {
            match &config.scales {
                Some(scales) if scales.len() == n => scales.clone(),
                Some(scales) => {
                    return Err(RegistrationError::configuration(format!(
                        "Scales has {} values for {} transform parameters",
                        scales.len(),
                        n
                    )))
                }
                None => default_scales::<D>(config.transform, n),
            }
        };

        let mut parameters = AsgdParameters::from_options(options, settings.sp_a);
        let mut estimated = false;
        if options.automatic_parameter_estimation {
            let max_step = settings
                .maximum_step_length
                .unwrap_or_else(|| default_maximum_step_length(state.fixed.spacing()));
            let gradients = self.measure_gradients(settings, fixed, fixed_mask, metric, transform, level_seed, n);
            let exact = if gradients.is_empty() {
                None
            } else {
                self.exact_gradient(fixed, fixed_mask, metric, transform, level_seed)
            };
            match estimate_parameters(
                transform,
                &jacobian_points,
                &scales,
                &gradients,
                exact.as_deref(),
                options.big_a,
                options.alpha,
                max_step,
            ) {
                Ok(estimate) => {
                    parameters.a = estimate.a;
                    if let Some(sigmoid_scale) = estimate.sigmoid_scale {
                        parameters.sigmoid_scale = sigmoid_scale;
                    }
                    estimated = true;
                    tracing::info!(a = estimate.a, sigmoid_scale = parameters.sigmoid_scale, "estimated step size");
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("automatic parameter estimation failed, using SP_a {}: {}", settings.sp_a, e);
                }
                Err(e) => return Err(e),
            }
        }

        match state.optimizer.take() {
            Some(mut previous) if !estimated => {
                previous.continue_with(parameters, scales)?;
                Ok(previous)
            }
            _ => AdaptiveStochasticGradientDescent::new(parameters, scales),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn measure_gradients(
        &self,
        settings: &LevelSettings<D>,
        fixed: &ImageAccessor<D>,
        fixed_mask: Option<&ImageMask<D>>,
        metric: &AdvancedMattesMutualInformation<D>,
        transform: &dyn Transform<D>,
        level_seed: u64,
        number_of_parameters: usize,
    ) -> Vec<Vec<f64>> {
        let count = match self.config.optimizer.number_of_gradient_measurements {
            0 => automatic_gradient_measurements(number_of_parameters),
            count => count,
        };
        let mut sampler = create_sampler::<D>(
            self.config.sampler,
            estimation_seed(level_seed, 2),
            self.config.maximum_number_of_sampling_attempts,
        );
        (0..count)
            .filter_map(|_| {
                let samples = sampler.sample(fixed, fixed_mask, settings.samples).ok()?;
                match metric.value_and_derivative(transform, &samples) {
                    Ok(value) => Some(value.derivative),
                    Err(e) => {
                        tracing::debug!("gradient measurement dropped: {}", e);
                        None
                    }
                }
            })
            .collect()
    }

    fn exact_gradient(
        &self,
        fixed: &ImageAccessor<D>,
        fixed_mask: Option<&ImageMask<D>>,
        metric: &AdvancedMattesMutualInformation<D>,
        transform: &dyn Transform<D>,
        level_seed: u64,
    ) -> Option<Vec<f64>> {
        let count = self.config.optimizer.number_of_samples_for_exact_gradient;
        let samples = if fixed.geometry().number_of_pixels() <= count {
            FullSampler::new().sample(fixed, fixed_mask, count)
        } else {
            let mut sampler = RandomSampler::new(
                estimation_seed(level_seed, 3),
                self.config.maximum_number_of_sampling_attempts,
            );
            ImageSampler::<D>::sample(&mut sampler, fixed, fixed_mask, count)
        };
        samples
            .and_then(|samples| metric.value_and_derivative(transform, &samples))
            .map(|value| value.derivative)
            .ok()
    }

    /// Run the optimizer loop of a prepared level.
    fn optimize_level(
        &self,
        prepared: PreparedLevel<D>,
        state: &mut RunState<B, D>,
        tracker: &mut ProgressTracker,
    ) -> std::result::Result<LevelResult, (usize, RegistrationError)> {
        let PreparedLevel {
            settings,
            fixed,
            fixed_mask,
            metric,
            optimizer,
            mut sampler,
            exact_samples,
        } = prepared;

        tracker.start_level(settings.level, state.transform.number_of_parameters());

        let mut registration = Registration::new(optimizer, metric, settings.level);
        if let Some(samples) = exact_samples {
            registration = registration.with_exact_samples(samples);
        }
        let mut source = SampleSource::new(
            sampler.as_mut(),
            &fixed,
            fixed_mask.as_ref(),
            settings.samples,
            settings.new_samples_every_iteration,
        );

        let outcome = registration
            .execute(&mut state.transform, &mut source, settings.iterations, tracker, &self.cancellation)
            .map_err(|failure| (failure.iteration, failure.cause))?;
        state.optimizer = Some(registration.into_optimizer());

        tracing::info!(
            "Level {} finished: metric {:.6}, {} of {} iterations skipped",
            settings.level,
            outcome.final_metric_value,
            outcome.skipped_iterations,
            outcome.iterations_run
        );

        Ok(LevelResult {
            level: settings.level,
            iterations_run: outcome.iterations_run,
            skipped_iterations: outcome.skipped_iterations,
            final_metric_value: outcome.final_metric_value,
            parameters: state.transform.parameters().to_vec(),
            transform_parameters: transform_to_parameter_maps(&state.transform.description()),
        })
    }

    /// Transform records and the optional result image.
    fn finish(
        &self,
        original_fixed: &Image<B, D>,
        state: RunState<B, D>,
    ) -> std::result::Result<RegistrationResult<B, D>, (RegistrationError, Vec<LevelResult>)> {
        let config = &self.config;
        let transform_parameters = transform_to_parameter_maps(&state.transform.description());

        let result_image = if config.write_result_image {
            let resampled = ResampleImageFilter::new(
                state.fixed.geometry().clone(),
                config.final_interpolation_order,
                config.default_pixel_value,
            )
            .apply(&state.moving, &state.transform)
            .and_then(|image| image.with_direction(*original_fixed.direction()))
            .map_err(|e| RegistrationError::resource(format!("cannot resample result image: {}", e)));
            match resampled.and_then(|image| ResultImage::new(&image, config.result_pixel_type, &config.result_image_format)) {
                Ok(image) => Some(image),
                Err(cause) => return Err((cause, state.completed)),
            }
        } else {
            None
        };

        Ok(RegistrationResult {
            transform: state.transform,
            levels: state.completed,
            transform_parameters,
            result_image,
        })
    }
}

/// Seed of the `stream`-th estimation sampler of a level.
fn estimation_seed(level_seed: u64, stream: u64) -> u64 {
    level_seed.wrapping_add(ESTIMATION_SEED_OFFSET.wrapping_mul(stream))
}

fn identity_direction<const D: usize>(mask: &ImageMask<D>) -> Result<ImageMask<D>> {
    Ok(mask.with_geometry(mask.geometry().with_direction(Direction::identity())?)?)
}

/// Mask of a level, eroded by the interpolation support times the shrink factor.
fn level_mask<const D: usize>(
    mask: Option<&ImageMask<D>>,
    erode: bool,
    order: usize,
    factors: &[usize; D],
) -> Option<ImageMask<D>> {
    mask.map(|m| {
        if erode {
            let radius = std::array::from_fn(|k| ((order + 1) as f64 / 2.0 * factors[k] as f64).ceil() as usize);
            m.erode(radius)
        } else {
            m.clone()
        }
    })
}
