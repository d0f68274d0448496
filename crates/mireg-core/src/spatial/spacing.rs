//! Pixel spacing.

use super::Vector;

/// Physical distance between neighbouring pixels along each index axis.
pub type Spacing<const D: usize> = Vector<D>;

impl<const D: usize> Spacing<D> {
    pub fn uniform(value: f64) -> Self {
        Self::new([value; D])
    }

    pub fn mean_spacing(&self) -> f64 {
        self.0.mean()
    }

    /// Every component finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|s| s.is_finite() && *s > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_validity() {
        assert_eq!(Spacing::new([1.0, 2.0, 3.0]).mean_spacing(), 2.0);
        assert!(Spacing::<3>::uniform(0.5).is_valid());
        assert!(!Spacing::new([1.0, 0.0, 1.0]).is_valid());
        assert!(!Spacing::new([1.0, f64::NAN]).is_valid());
    }
}
