//! Error types for core image and transform operations.

use thiserror::Error;

/// Main error type for core operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A schedule does not hold one entry per level and dimension.
    #[error("Invalid schedule: expected {expected} values, got {actual}")]
    InvalidSchedule { expected: usize, actual: usize },

    /// A parameter vector has the wrong length for its transform.
    #[error("Parameter count mismatch: expected {expected}, got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    /// Spacing, direction or size cannot describe a valid image grid.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Pixel data is inconsistent with its geometry.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// B-spline order outside the supported range.
    #[error("Unsupported B-spline order {0}, expected 0..=3")]
    UnsupportedOrder(usize),

    /// Image or buffer could not be produced.
    #[error("Allocation failure: {0}")]
    Allocation(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create an invalid geometry error.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Create an invalid image error.
    pub fn image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    /// Create an allocation error.
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidSchedule { expected: 6, actual: 4 };
        assert_eq!(err.to_string(), "Invalid schedule: expected 6 values, got 4");

        let err = CoreError::geometry("zero spacing");
        assert_eq!(err.to_string(), "Invalid geometry: zero spacing");
    }
}
