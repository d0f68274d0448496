pub mod gaussian;
pub mod shrink;
pub mod pyramid;
pub mod resample;

pub use gaussian::GaussianFilter;
pub use shrink::ShrinkFilter;
pub use pyramid::{build_level, MultiResolutionPyramid, PyramidKind, PyramidSchedule};
pub use resample::ResampleImageFilter;
