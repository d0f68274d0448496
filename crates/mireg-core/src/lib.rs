//! Core building blocks for mireg.
//!
//! Images with physical metadata, spatial primitives, B-spline interpolation,
//! parametric transforms and the filters used to build resolution pyramids
//! and resample registered images.

pub mod error;
pub mod spatial;
pub mod image;
pub mod interpolation;
pub mod transform;
pub mod filter;

pub use error::{CoreError, Result};
pub use image::{Image, ImageGeometry, ImageMask};
pub use spatial::{Point, Vector, Spacing, Direction};
