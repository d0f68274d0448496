use burn::tensor::backend::Backend;
use burn::tensor::ops::ConvOptions;
use burn::tensor::{Shape, Tensor};
use crate::error::Result;
use crate::image::Image;
use crate::spatial::Spacing;

/// Gaussian smoothing filter.
///
/// Separable 1D convolutions along each index axis, with standard deviations
/// given in physical units. Borders are handled by normalized convolution:
/// the smoothed data is divided by the smoothed indicator of the image
/// support, so intensities near the edge are not pulled towards zero.
pub struct GaussianFilter<B: Backend> {
    sigmas: Vec<f64>,
    max_kernel_width: usize,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> GaussianFilter<B> {
    /// Create a new Gaussian filter.
    ///
    /// # Arguments
    /// * `sigmas` - Standard deviation per index axis in physical units.
    ///   A single value applies to every axis.
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self {
            sigmas,
            max_kernel_width: 65,
            _b: std::marker::PhantomData,
        }
    }

    /// Set the maximum kernel width (radius * 2 + 1).
    pub fn with_max_kernel_width(mut self, width: usize) -> Self {
        self.max_kernel_width = width.max(1);
        self
    }

    /// Apply the filter to an image.
    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Result<Image<B, D>> {
        let data = self.apply_tensor(image.data().clone(), image.spacing());
        Image::new(data, *image.origin(), *image.spacing(), *image.direction())
    }

    /// Apply the filter to a tensor stored in reverse index order.
    pub fn apply_tensor<const D: usize>(&self, input: Tensor<B, D>, spacing: &Spacing<D>) -> Tensor<B, D> {
        let mut data = input;
        let device = data.device();

        for axis in 0..D {
            let sigma = self.sigmas.get(axis).or(self.sigmas.first()).copied().unwrap_or(0.0);
            if sigma <= 1e-6 {
                continue;
            }

            let pixel_sigma = sigma / spacing[axis];
            let radius = (3.0 * pixel_sigma).ceil() as usize;
            let width = (2 * radius + 1).min(self.max_kernel_width);
            let radius = (width - 1) / 2;
            if radius == 0 {
                continue;
            }

            let kernel = generate_kernel(pixel_sigma, radius);
            let kernel = Tensor::<B, 1>::from_floats(kernel.as_slice(), &device);

            let tensor_dim = D - 1 - axis;
            let support = self.convolve_1d(data.ones_like(), kernel.clone(), tensor_dim);
            let smoothed = self.convolve_1d(data, kernel, tensor_dim);
            data = smoothed / support;
        }
        data
    }

    fn convolve_1d<const D: usize>(&self, input: Tensor<B, D>, kernel: Tensor<B, 1>, dim: usize) -> Tensor<B, D> {
        let dims: [usize; D] = input.dims();

        // Move the filtered dimension last and fold the rest into the batch.
        let mut permutation = [0isize; D];
        let mut idx = 0;
        for i in 0..D {
            if i != dim {
                permutation[idx] = i as isize;
                idx += 1;
            }
        }
        permutation[D - 1] = dim as isize;

        let length = dims[dim];
        let batch: usize = (0..D).filter(|&i| i != dim).map(|i| dims[i]).product();
        let lines = input.permute(permutation).reshape([batch, 1, length]);

        let kernel_size = kernel.dims()[0];
        let weight = kernel.reshape([1, 1, kernel_size]);
        let options = ConvOptions::new([1], [kernel_size / 2], [1], 1);
        let filtered = burn::tensor::module::conv1d(lines, weight, None, options);

        let mut permuted_shape = [0usize; D];
        for (p, &source) in permuted_shape.iter_mut().zip(permutation.iter()) {
            *p = dims[source as usize];
        }
        let restored = filtered.reshape(Shape::new(permuted_shape));

        let mut inverse = [0isize; D];
        for (new_pos, &old_pos) in permutation.iter().enumerate() {
            inverse[old_pos as usize] = new_pos as isize;
        }
        restored.permute(inverse)
    }
}

fn generate_kernel(sigma: f64, radius: usize) -> Vec<f32> {
    let two_sigma2 = 2.0 * sigma * sigma;
    let values: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma2).exp()
        })
        .collect();
    let sum: f64 = values.iter().sum();
    values.into_iter().map(|v| (v / sum) as f32).collect()
}
