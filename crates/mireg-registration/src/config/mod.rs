//! Registration configuration.
//!
//! A [`ParameterMap`] holds raw options as read by an external parser;
//! [`RegistrationConfig`] validates them once, before optimization starts.

pub mod parameter_map;
pub mod settings;
pub mod validation;

pub use parameter_map::{ParameterMap, ParameterValue};
pub use settings::{
    GridSpacing, InitializationMethod, LevelSettings, MetricOptions, OptimizerOptions, RegistrationConfig,
    SamplerKind, TransformKind,
};
