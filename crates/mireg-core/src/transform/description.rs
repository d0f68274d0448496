//! Plain-data descriptions of transforms.
//!
//! A description captures everything needed to rebuild a transform, which
//! lets transforms be recorded, passed between registration stages and
//! converted to parameter records.

use crate::error::Result;
use crate::image::ImageGeometry;
use crate::spatial::Point;
use super::{BSplineTransform, CombinationMode, CombinationTransform, EulerTransform, Transform};

#[derive(Debug, Clone, PartialEq)]
pub enum TransformDescription<const D: usize> {
    Euler {
        center: Point<D>,
        parameters: Vec<f64>,
    },
    BSpline {
        grid: ImageGeometry<D>,
        order: usize,
        parameters: Vec<f64>,
    },
    Combination {
        initial: Option<Box<TransformDescription<D>>>,
        current: Box<TransformDescription<D>>,
        mode: CombinationMode,
    },
}

impl<const D: usize> TransformDescription<D> {
    /// Rebuild the described transform.
    pub fn build(&self) -> Result<Box<dyn Transform<D>>> {
        Ok(match self {
            Self::Euler { center, parameters } => {
                Box::new(EulerTransform::with_parameters(*center, parameters)?)
            }
            Self::BSpline { grid, order, parameters } => {
                Box::new(BSplineTransform::with_parameters(grid.clone(), *order, parameters)?)
            }
            Self::Combination { initial, current, mode } => {
                let current = current.build()?;
                match initial {
                    Some(initial) => Box::new(CombinationTransform::with_initial(initial.build()?, current, *mode)),
                    None => Box::new(CombinationTransform::new(current)),
                }
            }
        })
    }

    /// Name of the described transform (the current one for combinations).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Euler { .. } => "EulerTransform",
            Self::BSpline { .. } => "BSplineTransform",
            Self::Combination { current, .. } => current.name(),
        }
    }

    /// Parameters of the described transform (the current one for combinations).
    pub fn parameters(&self) -> &[f64] {
        match self {
            Self::Euler { parameters, .. } | Self::BSpline { parameters, .. } => parameters,
            Self::Combination { current, .. } => current.parameters(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Spacing;

    #[test]
    fn test_description_rebuilds_equal_transform() {
        let domain = ImageGeometry::<2>::with_size([10, 10]).unwrap();
        let mut bspline = BSplineTransform::from_domain(&domain, &Spacing::uniform(3.0), 3).unwrap();
        let params: Vec<f64> = (0..bspline.number_of_parameters()).map(|i| (i % 5) as f64 * 0.1).collect();
        bspline.set_parameters(&params).unwrap();

        let euler = EulerTransform::<2>::with_parameters(Point::new([4.5, 4.5]), &[0.1, 1.0, -1.0]).unwrap();
        let combined = CombinationTransform::with_initial(Box::new(euler), Box::new(bspline), CombinationMode::Compose);

        let description = combined.description();
        assert_eq!(description.name(), "BSplineTransform");
        assert_eq!(description.parameters(), params.as_slice());

        let rebuilt = description.build().unwrap();
        for &(x, y) in &[(1.0, 2.0), (4.5, 4.5), (8.2, 0.3)] {
            let p = Point::new([x, y]);
            assert_eq!(rebuilt.transform_point(&p), combined.transform_point(&p));
        }
    }
}
