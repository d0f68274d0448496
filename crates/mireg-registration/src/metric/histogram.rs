//! Parzen-window joint histograms.
//!
//! Intensities map to continuous bin positions and are spread over
//! neighbouring bins by a B-spline kernel, which keeps the histogram
//! differentiable in the moving intensity.

use mireg_core::interpolation::{BSplineKernel, KernelWeights, MAX_SUPPORT};
use crate::error::Result;

/// Padding bins on each side of the intensity range.
pub const HISTOGRAM_PADDING: usize = 2;

/// Intensity to bin mapping of one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParzenWindow {
    bins: usize,
    min: f64,
    bin_size: f64,
    kernel: BSplineKernel,
}

impl ParzenWindow {
    /// # Arguments
    /// * `bins` - Number of histogram bins, padding included
    /// * `range` - Intensity range `(min, max)` of the image
    /// * `limit_range_ratio` - Fraction of the range added on both sides
    /// * `order` - Parzen kernel order
    pub fn new(bins: usize, range: (f64, f64), limit_range_ratio: f64, order: usize) -> Result<Self> {
        let kernel = BSplineKernel::new(order)?;
        let (lo, hi) = range;
        let margin = limit_range_ratio * (hi - lo);
        let (min, max) = (lo - margin, hi + margin);
        let interior = (bins - 2 * HISTOGRAM_PADDING - 1) as f64;
        let bin_size = if max > min { (max - min) / interior } else { 1.0 };
        Ok(Self {
            bins,
            min,
            bin_size,
            kernel,
        })
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn bin_size(&self) -> f64 {
        self.bin_size
    }

    /// Continuous bin position, clamped to the unpadded bins.
    pub fn position(&self, value: f64) -> f64 {
        let (lo, hi) = self.position_bounds();
        self.unclamped_position(value).clamp(lo, hi)
    }

    fn unclamped_position(&self, value: f64) -> f64 {
        (value - self.min) / self.bin_size + HISTOGRAM_PADDING as f64
    }

    fn position_bounds(&self) -> (f64, f64) {
        (HISTOGRAM_PADDING as f64, (self.bins - HISTOGRAM_PADDING - 1) as f64)
    }

    /// Kernel weights of an intensity; the support always lies inside the bins.
    pub fn weights(&self, value: f64) -> KernelWeights {
        self.kernel.weights(self.position(value))
    }

    /// Derivative of the kernel weights with respect to the bin position.
    ///
    /// Zero outside the intensity range, where the position is clamped.
    pub fn derivative_weights(&self, value: f64) -> KernelWeights {
        let mut weights = self.kernel.derivative_weights(self.position(value));
        let (lo, hi) = self.position_bounds();
        let p = self.unclamped_position(value);
        if !(lo..=hi).contains(&p) {
            weights.values = [0.0; MAX_SUPPORT];
        }
        weights
    }
}

/// Row-major joint histogram, fixed bins along rows.
#[derive(Debug, Clone, PartialEq)]
pub struct JointHistogram {
    fixed_bins: usize,
    moving_bins: usize,
    data: Vec<f64>,
}

impl JointHistogram {
    pub fn new(fixed_bins: usize, moving_bins: usize) -> Self {
        Self {
            fixed_bins,
            moving_bins,
            data: vec![0.0; fixed_bins * moving_bins],
        }
    }

    pub fn fixed_bins(&self) -> usize {
        self.fixed_bins
    }

    pub fn moving_bins(&self) -> usize {
        self.moving_bins
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.moving_bins + j]
    }

    /// Add the outer product of two weight sets.
    pub fn add(&mut self, fixed: &KernelWeights, moving: &KernelWeights) {
        for (a, &wf) in fixed.as_slice().iter().enumerate() {
            if wf == 0.0 {
                continue;
            }
            let row = (fixed.start as usize + a) * self.moving_bins;
            for (b, &wm) in moving.as_slice().iter().enumerate() {
                self.data[row + moving.start as usize + b] += wf * wm;
            }
        }
    }

    /// Element-wise accumulate another histogram of the same shape.
    pub fn accumulate(&mut self, other: &JointHistogram) {
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
    }

    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Divide every entry by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.data {
            *v /= factor;
        }
    }

    pub fn fixed_marginal(&self) -> Vec<f64> {
        self.data.chunks_exact(self.moving_bins).map(|row| row.iter().sum()).collect()
    }

    pub fn moving_marginal(&self) -> Vec<f64> {
        let mut marginal = vec![0.0; self.moving_bins];
        for row in self.data.chunks_exact(self.moving_bins) {
            for (m, v) in marginal.iter_mut().zip(row) {
                *m += v;
            }
        }
        marginal
    }

    /// Mutual information of a normalized histogram.
    pub fn mutual_information(&self) -> f64 {
        let pf = self.fixed_marginal();
        let pm = self.moving_marginal();
        let mut mi = 0.0;
        for i in 0..self.fixed_bins {
            for j in 0..self.moving_bins {
                let p = self.get(i, j);
                if p > 1e-16 {
                    mi += p * (p / (pf[i] * pm[j])).ln();
                }
            }
        }
        mi
    }
}

/// Entropy `-Σ p ln p` of a normalized distribution.
pub fn entropy(p: &[f64]) -> f64 {
    -p.iter().filter(|&&v| v > 1e-16).map(|&v| v * v.ln()).sum::<f64>()
}
