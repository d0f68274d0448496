//! Error types for registration operations.
//!
//! Per-sample and per-iteration conditions (`Domain`, `NumericalDegeneracy`)
//! are recoverable: the driver skips the affected update and continues.
//! Everything else ends the run with a [`RunFailure`].

use thiserror::Error;
use mireg_core::CoreError;
use crate::multires::LevelResult;

/// Main error type for registration operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    /// Missing or incompatible option combination.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A per-level schedule has the wrong number of entries.
    #[error("Invalid schedule for {option}: expected {expected} values, got {actual}")]
    InvalidSchedule {
        option: String,
        expected: usize,
        actual: usize,
    },

    /// A sample or mapped point fell outside the valid image domain.
    #[error("Domain error: {0}")]
    Domain(String),

    /// Zero gradients, singular estimates and similar.
    #[error("Numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    /// An image or buffer could not be produced.
    #[error("Resource error: {0}")]
    Resource(String),

    /// The run was stopped through its cancellation token.
    #[error("Registration cancelled")]
    Cancelled,

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a domain error.
    pub fn domain(msg: impl Into<String>) -> Self {
        Self::Domain(msg.into())
    }

    /// Create a numerical degeneracy error.
    pub fn numerical_degeneracy(msg: impl Into<String>) -> Self {
        Self::NumericalDegeneracy(msg.into())
    }

    /// Create a resource error.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Whether the driver may skip the failed update and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Domain(_) | Self::NumericalDegeneracy(_))
    }
}

/// Report of a failed registration run.
///
/// Carries the level and iteration where the run stopped and the results of
/// every level that completed before it.
#[derive(Error, Debug, Clone)]
#[error("registration failed at level {level}, iteration {iteration}: {cause}")]
pub struct RunFailure {
    pub level: usize,
    /// Zero when the failure happened while setting the level up.
    pub iteration: usize,
    pub cause: RegistrationError,
    pub completed: Vec<LevelResult>,
}
