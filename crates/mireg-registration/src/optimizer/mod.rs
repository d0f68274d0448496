//! Parameter optimizers.

pub mod trait_;
pub mod adaptive_sgd;
pub mod parameter_estimation;

pub use trait_::Optimizer;
pub use adaptive_sgd::{AdaptiveStochasticGradientDescent, AsgdParameters};
pub use parameter_estimation::{
    default_scales, estimate_parameters, estimate_scales, EstimatedParameters,
};
