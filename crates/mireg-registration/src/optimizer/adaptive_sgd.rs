//! Adaptive stochastic gradient descent.
//!
//! The gain follows `γ(t) = a / (t + A)^α` where the time `t` is not the
//! iteration count: it advances by a sigmoid of the negated inner product
//! of consecutive scaled gradients. Consistent gradients (positive inner
//! product) push time back and keep steps large; oscillating gradients
//! advance it and shrink steps.

use crate::config::OptimizerOptions;
use crate::error::{RegistrationError, Result};
use super::Optimizer;

/// Gain and sigmoid settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AsgdParameters {
    pub a: f64,
    pub big_a: f64,
    pub alpha: f64,
    pub sigmoid_max: f64,
    pub sigmoid_min: f64,
    pub sigmoid_scale: f64,
    pub initial_time: f64,
    pub use_adaptive_step_sizes: bool,
}

impl AsgdParameters {
    pub fn from_options(options: &OptimizerOptions, a: f64) -> Self {
        Self {
            a,
            big_a: options.big_a,
            alpha: options.alpha,
            sigmoid_max: options.sigmoid_max,
            sigmoid_min: options.sigmoid_min,
            sigmoid_scale: options.sigmoid_scale,
            initial_time: options.sigmoid_initial_time,
            use_adaptive_step_sizes: options.use_adaptive_step_sizes,
        }
    }
}

impl Default for AsgdParameters {
    fn default() -> Self {
        Self::from_options(&OptimizerOptions::default(), 400.0)
    }
}

/// Adaptive stochastic gradient descent with per-parameter scales.
///
/// `θ ← θ - γ(t) · g ⊘ s`
#[derive(Debug, Clone)]
pub struct AdaptiveStochasticGradientDescent {
    parameters: AsgdParameters,
    scales: Vec<f64>,
    time: f64,
    previous_gradient: Option<Vec<f64>>,
    iteration: usize,
}

impl AdaptiveStochasticGradientDescent {
    /// # Arguments
    /// * `parameters` - Gain and sigmoid settings
    /// * `scales` - Positive scale per transform parameter
    pub fn new(parameters: AsgdParameters, scales: Vec<f64>) -> Result<Self> {
        if scales.iter().any(|&s| !(s.is_finite() && s > 0.0)) {
            return Err(RegistrationError::configuration("parameter scales must be positive"));
        }
        Ok(Self {
            time: parameters.initial_time,
            parameters,
            scales,
            previous_gradient: None,
            iteration: 0,
        })
    }

    pub fn parameters(&self) -> &AsgdParameters {
        &self.parameters
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Gain at a given time.
    pub fn gain(&self, time: f64) -> f64 {
        self.parameters.a / (time + self.parameters.big_a).powf(self.parameters.alpha)
    }

    /// `f(x) = f_min + (f_max - f_min) / (1 - (f_max / f_min) · e^(-x/ω))`
    pub fn sigmoid(&self, x: f64) -> f64 {
        let p = &self.parameters;
        let e = (-x / p.sigmoid_scale).exp();
        p.sigmoid_min + (p.sigmoid_max - p.sigmoid_min) / (1.0 - (p.sigmoid_max / p.sigmoid_min) * e)
    }

    /// Start a new level: new scales, time back to the initial time.
    pub fn restart(&mut self, parameters: AsgdParameters, scales: Vec<f64>) -> Result<()> {
        *self = Self::new(parameters, scales)?;
        Ok(())
    }

    /// Start a new level with new settings and scales, keeping the time.
    pub fn continue_with(&mut self, parameters: AsgdParameters, scales: Vec<f64>) -> Result<()> {
        let time = self.time;
        *self = Self::new(parameters, scales)?;
        self.time = time;
        Ok(())
    }
}

impl Optimizer for AdaptiveStochasticGradientDescent {
    fn step(&mut self, parameters: &[f64], derivative: &[f64]) -> Result<Vec<f64>> {
        if parameters.len() != derivative.len() || parameters.len() != self.scales.len() {
            return Err(RegistrationError::configuration(format!(
                "optimizer expects {} parameters, got {} parameters and {} derivatives",
                self.scales.len(),
                parameters.len(),
                derivative.len()
            )));
        }
        if derivative.iter().any(|d| !d.is_finite()) {
            return Err(RegistrationError::numerical_degeneracy("non-finite metric derivative"));
        }

        let scaled: Vec<f64> = derivative.iter().zip(&self.scales).map(|(g, s)| g / s).collect();
        let gain = self.gain(self.time);
        let updated = parameters
            .iter()
            .zip(&scaled)
            .map(|(theta, g)| theta - gain * g)
            .collect();

        if self.parameters.use_adaptive_step_sizes {
            // Inner product in the metric induced by the scales.
            let inner = self
                .previous_gradient
                .as_ref()
                .map_or(0.0, |previous| derivative.iter().zip(previous).map(|(g, p)| g * p).sum());
            self.time = (self.time + self.sigmoid(-inner)).max(0.0);
        } else {
            self.time += 1.0;
        }
        self.previous_gradient = Some(scaled);
        self.iteration += 1;

        Ok(updated)
    }

    fn learning_rate(&self) -> f64 {
        self.gain(self.time)
    }

    fn iteration(&self) -> usize {
        self.iteration
    }

    fn name(&self) -> &'static str {
        "AdaptiveStochasticGradientDescent"
    }
}
