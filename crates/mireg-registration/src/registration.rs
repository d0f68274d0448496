//! Optimization loop of a single resolution level.

use mireg_core::image::ImageMask;
use mireg_core::interpolation::ImageAccessor;
use mireg_core::transform::Transform;
use crate::error::{RegistrationError, Result};
use crate::metric::Metric;
use crate::optimizer::Optimizer;
use crate::progress::{CancellationToken, ProgressInfo, ProgressTracker};
use crate::sampler::{ImageSample, ImageSampler};

const LOG_INTERVAL: usize = 50;

/// Where a level draws its sample sets from.
pub struct SampleSource<'a, const D: usize> {
    sampler: &'a mut dyn ImageSampler<D>,
    fixed: &'a ImageAccessor<D>,
    mask: Option<&'a ImageMask<D>>,
    count: usize,
    refresh: bool,
    cached: Option<Vec<ImageSample<D>>>,
}

impl<'a, const D: usize> SampleSource<'a, D> {
    /// # Arguments
    /// * `sampler` - Sampler of the level
    /// * `fixed` - Fixed image of the level
    /// * `mask` - Optional fixed mask
    /// * `count` - Samples per draw
    /// * `refresh` - Draw a new set every iteration instead of reusing the first
    pub fn new(
        sampler: &'a mut dyn ImageSampler<D>,
        fixed: &'a ImageAccessor<D>,
        mask: Option<&'a ImageMask<D>>,
        count: usize,
        refresh: bool,
    ) -> Self {
        Self { sampler, fixed, mask, count, refresh, cached: None }
    }

    /// Samples for the next iteration.
    pub fn samples(&mut self) -> Result<&[ImageSample<D>]> {
        if self.refresh || self.cached.is_none() {
            self.cached = Some(self.sampler.sample(self.fixed, self.mask, self.count)?);
        }
        Ok(self.cached.as_deref().unwrap_or_default())
    }
}

/// Summary of a level's optimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelOutcome {
    pub iterations_run: usize,
    pub skipped_iterations: usize,
    /// Metric value of the last successful iteration, NaN when every iteration was skipped.
    pub final_metric_value: f64,
}

/// A level stopped by a non-recoverable error or by cancellation.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationFailure {
    pub iteration: usize,
    pub cause: RegistrationError,
}

/// Single-level registration: metric, optimizer and the loop driving them.
pub struct Registration<O, M, const D: usize>
where
    O: Optimizer,
    M: Metric<D>,
{
    optimizer: O,
    metric: M,
    level: usize,
    exact_samples: Option<Vec<ImageSample<D>>>,
}

impl<O, M, const D: usize> Registration<O, M, D>
where
    O: Optimizer,
    M: Metric<D>,
{
    pub fn new(optimizer: O, metric: M, level: usize) -> Self {
        Self {
            optimizer,
            metric,
            level,
            exact_samples: None,
        }
    }

    /// Report the metric over these samples after every iteration.
    ///
    /// The value goes to progress callbacks only and never affects the optimization.
    pub fn with_exact_samples(mut self, samples: Vec<ImageSample<D>>) -> Self {
        self.exact_samples = Some(samples);
        self
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Give back the optimizer so its state can carry over to the next level.
    pub fn into_optimizer(self) -> O {
        self.optimizer
    }

    /// Run `iterations` optimizer steps on `transform`.
    ///
    /// Recoverable errors skip the update of that iteration. Parameters are
    /// replaced in one piece after each successful step.
    pub fn execute(
        &mut self,
        transform: &mut dyn Transform<D>,
        source: &mut SampleSource<'_, D>,
        iterations: usize,
        tracker: &ProgressTracker,
        cancellation: &CancellationToken,
    ) -> std::result::Result<LevelOutcome, IterationFailure> {
        let mut skipped = 0;
        let mut last_value = f64::NAN;

        for iteration in 0..iterations {
            if cancellation.is_cancelled() {
                return Err(IterationFailure { iteration, cause: RegistrationError::Cancelled });
            }

            let learning_rate = self.optimizer.learning_rate();
            let mut info = match self.iterate(transform, source) {
                Ok(value) => {
                    last_value = value;
                    ProgressInfo::new(self.level, iteration, iterations, value, learning_rate)
                }
                Err(cause) if cause.is_recoverable() => {
                    skipped += 1;
                    tracing::warn!(level = self.level, iteration, "skipping update: {}", cause);
                    let mut info = ProgressInfo::new(self.level, iteration, iterations, f64::NAN, learning_rate);
                    info.skipped = true;
                    info
                }
                Err(cause) => return Err(IterationFailure { iteration, cause }),
            };

            if let Some(samples) = &self.exact_samples {
                info.exact_metric_value = self.metric.value(transform, samples).ok();
            }

            if iteration % LOG_INTERVAL == 0 {
                tracing::info!("Level {} iteration {}: metric {:.6}", self.level, iteration, info.metric_value);
            }
            tracing::debug!(
                level = self.level,
                iteration,
                metric = info.metric_value,
                gain = learning_rate,
                "iteration finished"
            );
            tracker.update(info);
        }

        Ok(LevelOutcome {
            iterations_run: iterations,
            skipped_iterations: skipped,
            final_metric_value: last_value,
        })
    }

    fn iterate(&mut self, transform: &mut dyn Transform<D>, source: &mut SampleSource<'_, D>) -> Result<f64> {
        let samples = source.samples()?;
        let evaluation = self.metric.value_and_derivative(transform, samples)?;
        let updated = self.optimizer.step(transform.parameters(), &evaluation.derivative)?;
        transform.set_parameters(&updated)?;
        Ok(evaluation.value)
    }
}
