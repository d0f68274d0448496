//! Registration outputs: transform parameter records and the result image.

use burn::tensor::backend::Backend;
use mireg_core::image::{Image, ImageGeometry};
use mireg_core::spatial::{Direction, Point, Spacing};
use mireg_core::transform::{CombinationMode, TransformDescription};
use crate::config::ParameterMap;
use crate::error::{RegistrationError, Result};

/// Pixel type of the written result image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelType {
    Char,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    #[default]
    Float,
    Double,
}

impl PixelType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Char => "char",
            Self::UnsignedChar => "unsigned char",
            Self::Short => "short",
            Self::UnsignedShort => "unsigned short",
            Self::Int => "int",
            Self::UnsignedInt => "unsigned int",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "char" => Some(Self::Char),
            "unsigned char" | "uchar" => Some(Self::UnsignedChar),
            "short" => Some(Self::Short),
            "unsigned short" | "ushort" => Some(Self::UnsignedShort),
            "int" => Some(Self::Int),
            "unsigned int" | "uint" => Some(Self::UnsignedInt),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            _ => None,
        }
    }

    /// Representable range, `None` for floating-point types.
    pub fn range(&self) -> Option<(f64, f64)> {
        match self {
            Self::Char => Some((i8::MIN as f64, i8::MAX as f64)),
            Self::UnsignedChar => Some((0.0, u8::MAX as f64)),
            Self::Short => Some((i16::MIN as f64, i16::MAX as f64)),
            Self::UnsignedShort => Some((0.0, u16::MAX as f64)),
            Self::Int => Some((i32::MIN as f64, i32::MAX as f64)),
            Self::UnsignedInt => Some((0.0, u32::MAX as f64)),
            Self::Float | Self::Double => None,
        }
    }

    /// Round and clamp a value into the type's range.
    pub fn cast(&self, value: f64) -> f64 {
        match self.range() {
            Some((lo, hi)) => value.round().clamp(lo, hi),
            None if *self == Self::Float => value as f32 as f64,
            None => value,
        }
    }
}

/// Resampled moving image with its output settings.
#[derive(Debug, Clone)]
pub struct ResultImage<B: Backend, const D: usize> {
    /// Values already cast to `pixel_type`.
    pub image: Image<B, D>,
    pub pixel_type: PixelType,
    /// File format tag for writers, e.g. `mhd`.
    pub format: String,
}

impl<B: Backend, const D: usize> ResultImage<B, D> {
    /// Cast a resampled image to the pixel type.
    pub fn new(resampled: &Image<B, D>, pixel_type: PixelType, format: impl Into<String>) -> Result<Self> {
        let values: Vec<f64> = resampled.to_values().into_iter().map(|v| pixel_type.cast(v)).collect();
        Ok(Self {
            image: resampled.with_values(&values)?,
            pixel_type,
            format: format.into(),
        })
    }
}

/// Flatten a transform into parameter records, innermost initial transform first.
///
/// Each record carries `HowToCombineTransforms`, telling how it combines
/// with the records before it.
pub fn transform_to_parameter_maps<const D: usize>(description: &TransformDescription<D>) -> Vec<ParameterMap> {
    let mut maps = Vec::new();
    flatten(description, CombinationMode::Compose, &mut maps);
    maps
}

fn flatten<const D: usize>(description: &TransformDescription<D>, mode: CombinationMode, maps: &mut Vec<ParameterMap>) {
    match description {
        TransformDescription::Combination { initial, current, mode } => {
            if let Some(initial) = initial {
                flatten(initial, CombinationMode::Compose, maps);
            }
            flatten(current, *mode, maps);
        }
        leaf => maps.push(leaf_map(leaf, mode)),
    }
}

fn leaf_map<const D: usize>(description: &TransformDescription<D>, mode: CombinationMode) -> ParameterMap {
    let parameters = description.parameters();
    let mut map = ParameterMap::new()
        .with("Transform", description.name())
        .with("NumberOfParameters", parameters.len())
        .with_values("TransformParameters", parameters.iter().copied())
        .with("HowToCombineTransforms", mode.name())
        .with("FixedImageDimension", D)
        .with("MovingImageDimension", D);

    match description {
        TransformDescription::Euler { center, .. } => {
            map.set_values("CenterOfRotationPoint", center.to_vec());
        }
        TransformDescription::BSpline { grid, order, .. } => {
            map.set_values("GridSize", grid.size())
                .set_values("GridIndex", [0usize; D])
                .set_values("GridSpacing", grid.spacing().to_vec())
                .set_values("GridOrigin", grid.origin().to_vec())
                .set_values("GridDirection", grid.direction().to_row_vec())
                .set("BSplineTransformSplineOrder", *order);
        }
        TransformDescription::Combination { .. } => {}
    }
    map
}

/// Rebuild a transform from records written by [`transform_to_parameter_maps`].
///
/// The records fold into nested combinations: each record becomes the
/// current transform over everything before it.
pub fn transform_from_parameter_maps<const D: usize>(maps: &[ParameterMap]) -> Result<TransformDescription<D>> {
    let mut combined: Option<TransformDescription<D>> = None;
    for map in maps {
        let mode = match map.get_str("HowToCombineTransforms")? {
            None => CombinationMode::Compose,
            Some(name) => CombinationMode::parse(&name)
                .ok_or_else(|| RegistrationError::configuration(format!("unsupported HowToCombineTransforms {}", name)))?,
        };
        combined = Some(TransformDescription::Combination {
            initial: combined.map(Box::new),
            current: Box::new(leaf_from_map(map)?),
            mode,
        });
    }
    combined.ok_or_else(|| RegistrationError::configuration("no transform parameter records"))
}

fn leaf_from_map<const D: usize>(map: &ParameterMap) -> Result<TransformDescription<D>> {
    for key in ["FixedImageDimension", "MovingImageDimension"] {
        if let Some(dimension) = map.get_usize(key)? {
            if dimension != D {
                return Err(RegistrationError::configuration(format!(
                    "{} is {} but the record is read as {}D",
                    key, dimension, D
                )));
            }
        }
    }

    let parameters = map.get_f64_list("TransformParameters")?.unwrap_or_default();
    if let Some(expected) = map.get_usize("NumberOfParameters")? {
        if expected != parameters.len() {
            return Err(RegistrationError::configuration(format!(
                "NumberOfParameters is {} but {} TransformParameters are given",
                expected,
                parameters.len()
            )));
        }
    }

    let name = map
        .get_str("Transform")?
        .ok_or_else(|| RegistrationError::configuration("transform record has no Transform"))?;
    match name.as_str() {
        "EulerTransform" => {
            let center = match map.get_f64_list("CenterOfRotationPoint")? {
                Some(values) => Point::from_slice(&values)
                    .ok_or_else(|| wrong_length("CenterOfRotationPoint", D, values.len()))?,
                None => Point::origin(),
            };
            Ok(TransformDescription::Euler { center, parameters })
        }
        "BSplineTransform" => {
            let size = array::<usize, D>(map.get_usize_list("GridSize")?, "GridSize")?;
            let spacing = array::<f64, D>(map.get_f64_list("GridSpacing")?, "GridSpacing")?;
            let origin = array::<f64, D>(map.get_f64_list("GridOrigin")?, "GridOrigin")?;
            let direction = match map.get_f64_list("GridDirection")? {
                Some(values) => Direction::from_row_slice(&values)
                    .ok_or_else(|| wrong_length("GridDirection", D * D, values.len()))?,
                None => Direction::identity(),
            };
            let order = map.get_usize("BSplineTransformSplineOrder")?.unwrap_or(3);
            let grid = ImageGeometry::new(size, Point::new(origin), Spacing::new(spacing), direction)?;
            Ok(TransformDescription::BSpline { grid, order, parameters })
        }
        other => Err(RegistrationError::configuration(format!("unsupported Transform {}", other))),
    }
}

fn array<T: Copy + Default, const D: usize>(values: Option<Vec<T>>, key: &str) -> Result<[T; D]> {
    let values = values.ok_or_else(|| RegistrationError::configuration(format!("transform record has no {}", key)))?;
    <[T; D]>::try_from(values.as_slice()).map_err(|_| wrong_length(key, D, values.len()))
}

fn wrong_length(key: &str, expected: usize, actual: usize) -> RegistrationError {
    RegistrationError::configuration(format!("{} needs {} values, got {}", key, expected, actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    #[test]
    fn test_pixel_type_cast() {
        assert_eq!(PixelType::UnsignedChar.cast(300.4), 255.0);
        assert_eq!(PixelType::UnsignedChar.cast(-3.0), 0.0);
        assert_eq!(PixelType::Short.cast(12.6), 13.0);
        assert_eq!(PixelType::Double.cast(0.1), 0.1);
        assert_eq!(PixelType::parse("unsigned short"), Some(PixelType::UnsignedShort));
        assert_eq!(PixelType::parse("complex"), None);
        assert_eq!(PixelType::default().name(), "float");
    }

    #[test]
    fn test_result_image_is_cast() {
        let device = Default::default();
        let geometry = ImageGeometry::with_size([2, 2]).unwrap();
        let image = Image::<Backend, 2>::from_values(geometry, &[-1.0, 0.4, 2.6, 400.0], &device).unwrap();
        let result = ResultImage::new(&image, PixelType::UnsignedChar, "mhd").unwrap();
        assert_eq!(result.image.to_values(), vec![0.0, 0.0, 3.0, 255.0]);
        assert_eq!(result.format, "mhd");
    }

    #[test]
    fn test_euler_record() {
        let description = TransformDescription::<2>::Euler {
            center: Point::new([1.0, 2.0]),
            parameters: vec![0.1, 3.0, -1.0],
        };
        let maps = transform_to_parameter_maps(&description);
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].get_str("Transform").unwrap().as_deref(), Some("EulerTransform"));
        assert_eq!(maps[0].get_usize("NumberOfParameters").unwrap(), Some(3));
        assert_eq!(maps[0].get_f64_list("CenterOfRotationPoint").unwrap(), Some(vec![1.0, 2.0]));

        let rebuilt = transform_from_parameter_maps::<2>(&maps).unwrap();
        let TransformDescription::Combination { initial, current, .. } = rebuilt else {
            panic!("expected a combination");
        };
        assert!(initial.is_none());
        assert_eq!(*current, description);
    }

    #[test]
    fn test_chain_round_trip() {
        let grid = ImageGeometry::new(
            [4, 4],
            Point::new([-1.0, -1.0]),
            Spacing::new([2.0, 2.0]),
            Direction::identity(),
        )
        .unwrap();
        let rigid = TransformDescription::<2>::Euler {
            center: Point::new([0.0, 0.0]),
            parameters: vec![0.0, 1.0, 0.0],
        };
        let chain = TransformDescription::Combination {
            initial: Some(Box::new(TransformDescription::Combination {
                initial: None,
                current: Box::new(rigid),
                mode: CombinationMode::Compose,
            })),
            current: Box::new(TransformDescription::BSpline {
                grid,
                order: 1,
                parameters: (0..32).map(|i| i as f64 * 0.01).collect(),
            }),
            mode: CombinationMode::Add,
        };

        let maps = transform_to_parameter_maps(&chain);
        assert_eq!(maps.len(), 2);
        assert_eq!(maps[1].get_str("HowToCombineTransforms").unwrap().as_deref(), Some("Add"));
        assert_eq!(maps[1].get_usize_list("GridSize").unwrap(), Some(vec![4, 4]));

        let json: Vec<String> = maps.iter().map(|m| m.to_json().unwrap()).collect();
        let parsed: Vec<ParameterMap> = json.iter().map(|j| ParameterMap::from_json(j).unwrap()).collect();
        assert_eq!(transform_from_parameter_maps::<2>(&parsed).unwrap(), chain);
    }

    #[test]
    fn test_bad_records() {
        assert!(transform_from_parameter_maps::<2>(&[]).is_err());

        let map = ParameterMap::new()
            .with("Transform", "EulerTransform")
            .with("NumberOfParameters", 3usize)
            .with_values("TransformParameters", [0.0, 1.0]);
        assert!(transform_from_parameter_maps::<2>(&[map]).is_err());

        let map = ParameterMap::new()
            .with("Transform", "EulerTransform")
            .with("FixedImageDimension", 3usize)
            .with_values("TransformParameters", [0.0, 1.0, 2.0]);
        assert!(transform_from_parameter_maps::<2>(&[map]).is_err());
    }
}
