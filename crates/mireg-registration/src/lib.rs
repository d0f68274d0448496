//! Intensity-based image registration for mireg.
//!
//! Multi-resolution registration with Mattes mutual information, adaptive
//! stochastic gradient descent and rigid or B-spline transforms, configured
//! through string-keyed parameter maps.

pub mod config;
pub mod error;
pub mod sampler;
pub mod metric;
pub mod optimizer;
pub mod initialization;
pub mod registration;
pub mod multires;
pub mod pipeline;
pub mod progress;
pub mod output;

pub use config::{ParameterMap, ParameterValue, RegistrationConfig};
pub use error::{RegistrationError, Result, RunFailure};
pub use multires::{LevelResult, MultiResolutionRegistration, RegistrationResult};
pub use pipeline::{PipelineFailure, RegistrationPipeline};
pub use progress::{CancellationToken, ConsoleProgressCallback, HistoryCallback, ProgressCallback, ProgressInfo, ProgressTracker};
pub use output::{PixelType, ResultImage};
