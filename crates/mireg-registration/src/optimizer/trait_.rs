//! Optimizer trait for parameter updates.

use crate::error::Result;

/// Gradient-based parameter optimizer.
///
/// Optimizers never touch a transform directly: `step` returns the updated
/// parameter vector and the caller installs it in one piece.
pub trait Optimizer: Send {
    /// Compute the parameters after one step along `-derivative`.
    ///
    /// A recoverable error leaves the optimizer state unchanged.
    fn step(&mut self, parameters: &[f64], derivative: &[f64]) -> Result<Vec<f64>>;

    /// Gain applied by the next step.
    fn learning_rate(&self) -> f64;

    /// Number of steps taken.
    fn iteration(&self) -> usize;

    fn name(&self) -> &'static str;
}
