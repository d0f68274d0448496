//! Similarity metrics.

pub mod trait_;
pub mod histogram;
pub mod advanced_mattes_mutual_information;

pub use trait_::{Metric, MetricValue};
pub use histogram::{JointHistogram, ParzenWindow};
pub use advanced_mattes_mutual_information::AdvancedMattesMutualInformation;
