//! Image type with physical metadata and coordinate transformations.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};
use crate::error::{CoreError, Result};
use crate::image::ImageGeometry;
use crate::spatial::{Direction, Point, Spacing};

/// Image with physical metadata.
///
/// Pixel data lives in a burn tensor whose dimensions are stored in reverse
/// index order: for a 3D image the tensor shape is `[nz, ny, nx]`, so index
/// axis 0 (x) is the fastest-varying one in memory.
///
/// # Type Parameters
/// * `B` - The backend for tensor operations
/// * `D` - The dimensionality of the image (2 or 3)
///
/// # Examples
/// ```rust
/// use mireg_core::Image;
/// use mireg_core::spatial::{Direction, Point, Spacing};
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 2>::zeros([8, 16], &device);
/// let image = Image::new(
///     data,
///     Point::new([0.0, 0.0]),
///     Spacing::new([1.0, 1.0]),
///     Direction::identity(),
/// ).unwrap();
/// assert_eq!(image.size(), [16, 8]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    data: Tensor<B, D>,
    geometry: ImageGeometry<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Create a new image with the given data and metadata.
    ///
    /// # Arguments
    /// * `data` - Pixel tensor in reverse index order
    /// * `origin` - Physical coordinate of the first pixel
    /// * `spacing` - Physical distance between pixels along each index axis
    /// * `direction` - Orientation matrix of the image axes
    pub fn new(
        data: Tensor<B, D>,
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Result<Self> {
        let mut size = data.dims();
        size.reverse();
        let geometry = ImageGeometry::new(size, origin, spacing, direction)?;
        Ok(Self { data, geometry })
    }

    /// Build an image from values in linear order (index axis 0 fastest).
    pub fn from_values(geometry: ImageGeometry<D>, values: &[f64], device: &B::Device) -> Result<Self> {
        if values.len() != geometry.number_of_pixels() {
            return Err(CoreError::image(format!(
                "expected {} pixel values, got {}",
                geometry.number_of_pixels(),
                values.len()
            )));
        }
        let mut shape = geometry.size();
        shape.reverse();
        let floats: Vec<f32> = values.iter().map(|&v| v as f32).collect();
        let data = TensorData::new(floats, Shape::new(shape)).convert::<B::FloatElem>();
        Ok(Self {
            data: Tensor::from_data(data, device),
            geometry,
        })
    }

    /// Same geometry, new pixel values.
    pub fn with_values(&self, values: &[f64]) -> Result<Self> {
        Self::from_values(self.geometry.clone(), values, &self.data.device())
    }

    /// Same pixels and spacing with another direction matrix.
    pub fn with_direction(&self, direction: Direction<D>) -> Result<Self> {
        Ok(Self {
            data: self.data.clone(),
            geometry: self.geometry.with_direction(direction)?,
        })
    }

    /// Get the image data tensor.
    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    /// Geometry of the pixel grid.
    pub fn geometry(&self) -> &ImageGeometry<D> {
        &self.geometry
    }

    /// Get the origin (physical coordinate of first pixel).
    pub fn origin(&self) -> &Point<D> {
        self.geometry.origin()
    }

    /// Get the spacing (physical distance between pixels).
    pub fn spacing(&self) -> &Spacing<D> {
        self.geometry.spacing()
    }

    /// Get the direction (orientation matrix).
    pub fn direction(&self) -> &Direction<D> {
        self.geometry.direction()
    }

    /// Image size in index order.
    pub fn size(&self) -> [usize; D] {
        self.geometry.size()
    }

    /// Tensor shape (reverse index order).
    pub fn shape(&self) -> [usize; D] {
        self.data.dims()
    }

    /// Pixel values in linear order (index axis 0 fastest).
    pub fn to_values(&self) -> Vec<f64> {
        let data = self.data.clone().into_data();
        data.iter::<f64>().collect()
    }

    /// Convert a physical point to a continuous index.
    ///
    /// `index = diag(spacing)^-1 * Direction^-1 * (point - origin)`
    pub fn transform_physical_point_to_continuous_index(&self, point: &Point<D>) -> Point<D> {
        self.geometry.physical_to_index(point)
    }

    /// Convert a continuous index to a physical point.
    ///
    /// `point = origin + Direction * diag(spacing) * index`
    pub fn transform_continuous_index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        self.geometry.index_to_physical(index)
    }
}
