//! Image types and operations.
//!
//! `Image` pairs a burn tensor with physical metadata, `ImageGeometry` holds
//! the index/physical mapping on its own and `ImageMask` restricts where
//! samples may be drawn.

pub mod image;
pub mod geometry;
pub mod grid;
pub mod mask;

pub use image::Image;
pub use geometry::ImageGeometry;
pub use grid::{index_grid, IndexIterator};
pub use mask::ImageMask;
