//! Typed registration settings.
//!
//! `RegistrationConfig` is the validated, immutable snapshot of a
//! [`ParameterMap`]. Options that may vary per resolution level are resolved
//! into one [`LevelSettings`] per level up front.

use mireg_core::filter::{PyramidKind, PyramidSchedule};
use mireg_core::spatial::{Point, Spacing};
use mireg_core::transform::CombinationMode;
use mireg_core::CoreError;
use crate::config::parameter_map::ParameterMap;
use crate::config::validation::*;
use crate::error::{RegistrationError, Result};
use crate::output::PixelType;

/// Options that are understood but have no effect on the computation
/// (writers and other observability switches).
const PASSIVE_OPTIONS: &[&str] = &[
    "FixedInternalImagePixelType",
    "MovingInternalImagePixelType",
    "Resampler",
    "WriteTransformParametersEachIteration",
    "WriteTransformParametersEachResolution",
    "WriteIterationInfo",
    "WriteResultImageAfterEachResolution",
    "CompressResultImage",
    "CheckNumberOfSamples",
];

const ACTIVE_OPTIONS: &[&str] = &[
    "Registration",
    "Transform",
    "Metric",
    "Optimizer",
    "ImageSampler",
    "Interpolator",
    "ResampleInterpolator",
    "FixedImagePyramid",
    "MovingImagePyramid",
    "FixedImageDimension",
    "MovingImageDimension",
    "UseDirectionCosines",
    "NumberOfResolutions",
    "ImagePyramidSchedule",
    "FixedImagePyramidSchedule",
    "MovingImagePyramidSchedule",
    "MaximumNumberOfIterations",
    "NumberOfSpatialSamples",
    "NewSamplesEveryIteration",
    "MaximumNumberOfSamplingAttempts",
    "ErodeMask",
    "ErodeFixedMask",
    "ErodeMovingMask",
    "NumberOfHistogramBins",
    "FixedKernelBSplineOrder",
    "MovingKernelBSplineOrder",
    "FixedLimitRangeRatio",
    "MovingLimitRangeRatio",
    "RequiredRatioOfValidSamples",
    "FixedImageBSplineInterpolationOrder",
    "BSplineInterpolationOrder",
    "FinalBSplineInterpolationOrder",
    "AutomaticTransformInitialization",
    "AutomaticTransformInitializationMethod",
    "AutomaticScalesEstimation",
    "Scales",
    "CenterOfRotationPoint",
    "HowToCombineTransforms",
    "FinalGridSpacingInVoxels",
    "FinalGridSpacingInPhysicalUnits",
    "GridSpacingSchedule",
    "BSplineTransformSplineOrder",
    "AutomaticParameterEstimation",
    "SP_a",
    "SP_A",
    "SP_alpha",
    "SigmoidMax",
    "SigmoidMin",
    "SigmoidScale",
    "SigmoidInitialTime",
    "UseAdaptiveStepSizes",
    "MaximumStepLength",
    "NumberOfGradientMeasurements",
    "NumberOfJacobianMeasurements",
    "NumberOfSamplesForExactGradient",
    "ShowExactMetricValue",
    "RandomSeed",
    "DefaultPixelValue",
    "WriteResultImage",
    "ResultImageFormat",
    "ResultImagePixelType",
];

/// Whether an option name is recognized.
pub fn is_known_option(name: &str) -> bool {
    ACTIVE_OPTIONS.contains(&name) || PASSIVE_OPTIONS.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformKind {
    #[default]
    Euler,
    BSpline,
}

impl TransformKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Euler => "EulerTransform",
            Self::BSpline => "BSplineTransform",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "EulerTransform" => Some(Self::Euler),
            "BSplineTransform" => Some(Self::BSpline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplerKind {
    #[default]
    RandomCoordinate,
    Random,
    Full,
}

impl SamplerKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RandomCoordinate => "RandomCoordinate",
            Self::Random => "Random",
            Self::Full => "Full",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "RandomCoordinate" => Some(Self::RandomCoordinate),
            "Random" => Some(Self::Random),
            "Full" => Some(Self::Full),
            _ => None,
        }
    }
}

/// How `AutomaticTransformInitialization` aligns the images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitializationMethod {
    #[default]
    GeometricalCenter,
    CenterOfGravity,
}

impl InitializationMethod {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "GeometricalCenter" => Some(Self::GeometricalCenter),
            "CenterOfGravity" => Some(Self::CenterOfGravity),
            _ => None,
        }
    }
}

/// Final B-spline control point spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GridSpacing<const D: usize> {
    /// Multiples of the fixed image spacing.
    Voxels([f64; D]),
    /// Physical units.
    Physical([f64; D]),
}

impl<const D: usize> GridSpacing<D> {
    /// Spacing in physical units for a fixed image spacing.
    pub fn physical(&self, image_spacing: &Spacing<D>) -> Spacing<D> {
        match self {
            Self::Voxels(v) => Spacing::new(std::array::from_fn(|k| v[k] * image_spacing[k])),
            Self::Physical(p) => Spacing::new(*p),
        }
    }
}

/// Settings of the Mattes mutual information metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricOptions {
    pub fixed_kernel_order: usize,
    pub moving_kernel_order: usize,
    pub fixed_limit_range_ratio: f64,
    pub moving_limit_range_ratio: f64,
    pub required_ratio_of_valid_samples: f64,
}

impl Default for MetricOptions {
    fn default() -> Self {
        Self {
            fixed_kernel_order: 0,
            moving_kernel_order: 3,
            fixed_limit_range_ratio: 0.01,
            moving_limit_range_ratio: 0.01,
            required_ratio_of_valid_samples: 0.25,
        }
    }
}

/// Level-independent settings of the ASGD optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerOptions {
    pub automatic_parameter_estimation: bool,
    pub big_a: f64,
    pub alpha: f64,
    pub sigmoid_max: f64,
    pub sigmoid_min: f64,
    pub sigmoid_scale: f64,
    pub sigmoid_initial_time: f64,
    pub use_adaptive_step_sizes: bool,
    /// Zero selects an automatic count.
    pub number_of_gradient_measurements: usize,
    /// Zero selects an automatic count.
    pub number_of_jacobian_measurements: usize,
    pub number_of_samples_for_exact_gradient: usize,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            automatic_parameter_estimation: true,
            big_a: 20.0,
            alpha: 1.0,
            sigmoid_max: 1.0,
            sigmoid_min: -0.8,
            sigmoid_scale: 1e-8,
            sigmoid_initial_time: 0.0,
            use_adaptive_step_sizes: true,
            number_of_gradient_measurements: 0,
            number_of_jacobian_measurements: 0,
            number_of_samples_for_exact_gradient: 100_000,
        }
    }
}

/// Immutable per-level settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSettings<const D: usize> {
    pub level: usize,
    pub iterations: usize,
    pub samples: usize,
    pub histogram_bins: usize,
    pub new_samples_every_iteration: bool,
    pub fixed_factors: [usize; D],
    pub moving_factors: [usize; D],
    /// Multiplier of the final grid spacing.
    pub grid_spacing_factor: [f64; D],
    /// Gain numerator used when it is not estimated.
    pub sp_a: f64,
    /// `None` selects a fraction of the mean full-resolution fixed spacing.
    pub maximum_step_length: Option<f64>,
}

/// Validated registration configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationConfig<const D: usize> {
    pub levels: usize,
    pub transform: TransformKind,
    pub combination: CombinationMode,
    pub sampler: SamplerKind,
    pub fixed_pyramid: PyramidKind,
    pub moving_pyramid: PyramidKind,
    pub fixed_schedule: PyramidSchedule<D>,
    pub moving_schedule: PyramidSchedule<D>,
    pub use_direction_cosines: bool,
    pub fixed_interpolation_order: usize,
    pub moving_interpolation_order: usize,
    pub final_interpolation_order: usize,
    pub metric: MetricOptions,
    pub optimizer: OptimizerOptions,
    pub automatic_transform_initialization: bool,
    pub initialization_method: InitializationMethod,
    pub automatic_scales_estimation: bool,
    pub scales: Option<Vec<f64>>,
    pub center_of_rotation: Option<Point<D>>,
    pub final_grid_spacing: GridSpacing<D>,
    pub spline_order: usize,
    pub maximum_number_of_sampling_attempts: usize,
    pub erode_fixed_mask: bool,
    pub erode_moving_mask: bool,
    pub show_exact_metric_value: bool,
    pub random_seed: Option<u64>,
    pub default_pixel_value: f64,
    pub write_result_image: bool,
    pub result_image_format: String,
    pub result_pixel_type: PixelType,
    pub level_settings: Vec<LevelSettings<D>>,
}

impl<const D: usize> RegistrationConfig<D> {
    /// Build and validate a configuration; absent options take their defaults.
    pub fn from_parameter_map(map: &ParameterMap) -> Result<Self> {
        for key in map.keys().filter(|k| !is_known_option(k)) {
            tracing::warn!(option = key, "unrecognized option ignored");
        }

        for key in ["FixedImageDimension", "MovingImageDimension"] {
            if let Some(dim) = map.get_usize(key)? {
                if dim != D {
                    return Err(RegistrationError::configuration(format!(
                        "{} is {} but the images are {}-dimensional",
                        key, dim, D
                    )));
                }
            }
        }

        expect_component(map, "Registration", &["MultiResolutionRegistration"])?;
        expect_component(map, "Metric", &["AdvancedMattesMutualInformation"])?;
        expect_component(map, "Optimizer", &["AdaptiveStochasticGradientDescent"])?;

        let transform = parse_with(map, "Transform", TransformKind::parse)?.unwrap_or_default();
        let sampler = parse_with(map, "ImageSampler", SamplerKind::parse)?.unwrap_or_default();
        let combination = parse_with(map, "HowToCombineTransforms", CombinationMode::parse)?.unwrap_or_default();
        let fixed_pyramid =
            parse_with(map, "FixedImagePyramid", PyramidKind::from_component_name)?.unwrap_or_default();
        let moving_pyramid =
            parse_with(map, "MovingImagePyramid", PyramidKind::from_component_name)?.unwrap_or_default();
        let initialization_method = parse_with(
            map,
            "AutomaticTransformInitializationMethod",
            InitializationMethod::parse,
        )?
        .unwrap_or_default();
        let result_pixel_type = parse_with(map, "ResultImagePixelType", PixelType::parse)?.unwrap_or_default();

        let levels = map.get_usize("NumberOfResolutions")?.unwrap_or(4);
        validate_resolutions(levels)?;

        let fixed_schedule = pyramid_schedule::<D>(map, "FixedImagePyramidSchedule", levels)?;
        let moving_schedule = pyramid_schedule::<D>(map, "MovingImagePyramidSchedule", levels)?;

        let moving_interpolation_order = match map.get_str("Interpolator")?.as_deref() {
            None | Some("BSplineInterpolator") => map.get_usize("BSplineInterpolationOrder")?.unwrap_or(1),
            Some("LinearInterpolator") => 1,
            Some("NearestNeighborInterpolator") => 0,
            Some(other) => {
                return Err(RegistrationError::configuration(format!("unsupported Interpolator {}", other)))
            }
        };
        let final_interpolation_order = match map.get_str("ResampleInterpolator")?.as_deref() {
            None | Some("FinalBSplineInterpolator") => {
                map.get_usize("FinalBSplineInterpolationOrder")?.unwrap_or(3)
            }
            Some("FinalLinearInterpolator") => 1,
            Some("FinalNearestNeighborInterpolator") => 0,
            Some(other) => {
                return Err(RegistrationError::configuration(format!(
                    "unsupported ResampleInterpolator {}",
                    other
                )))
            }
        };
        let fixed_interpolation_order = map.get_usize("FixedImageBSplineInterpolationOrder")?.unwrap_or(1);
        validate_interpolation_order("BSplineInterpolationOrder", moving_interpolation_order)?;
        validate_interpolation_order("FinalBSplineInterpolationOrder", final_interpolation_order)?;
        validate_interpolation_order("FixedImageBSplineInterpolationOrder", fixed_interpolation_order)?;

        let metric = MetricOptions {
            fixed_kernel_order: map.get_usize("FixedKernelBSplineOrder")?.unwrap_or(0),
            moving_kernel_order: map.get_usize("MovingKernelBSplineOrder")?.unwrap_or(3),
            fixed_limit_range_ratio: map.get_f64("FixedLimitRangeRatio")?.unwrap_or(0.01),
            moving_limit_range_ratio: map.get_f64("MovingLimitRangeRatio")?.unwrap_or(0.01),
            required_ratio_of_valid_samples: map.get_f64("RequiredRatioOfValidSamples")?.unwrap_or(0.25),
        };
        validate_interpolation_order("FixedKernelBSplineOrder", metric.fixed_kernel_order)?;
        validate_interpolation_order("MovingKernelBSplineOrder", metric.moving_kernel_order)?;
        validate_non_negative("FixedLimitRangeRatio", metric.fixed_limit_range_ratio)?;
        validate_non_negative("MovingLimitRangeRatio", metric.moving_limit_range_ratio)?;
        validate_ratio("RequiredRatioOfValidSamples", metric.required_ratio_of_valid_samples)?;

        let defaults = OptimizerOptions::default();
        let optimizer = OptimizerOptions {
            automatic_parameter_estimation: map
                .get_bool("AutomaticParameterEstimation")?
                .unwrap_or(defaults.automatic_parameter_estimation),
            big_a: map.get_f64("SP_A")?.unwrap_or(defaults.big_a),
            alpha: map.get_f64("SP_alpha")?.unwrap_or(defaults.alpha),
            sigmoid_max: map.get_f64("SigmoidMax")?.unwrap_or(defaults.sigmoid_max),
            sigmoid_min: map.get_f64("SigmoidMin")?.unwrap_or(defaults.sigmoid_min),
            sigmoid_scale: map.get_f64("SigmoidScale")?.unwrap_or(defaults.sigmoid_scale),
            sigmoid_initial_time: map.get_f64("SigmoidInitialTime")?.unwrap_or(defaults.sigmoid_initial_time),
            use_adaptive_step_sizes: map
                .get_bool("UseAdaptiveStepSizes")?
                .unwrap_or(defaults.use_adaptive_step_sizes),
            number_of_gradient_measurements: map
                .get_usize("NumberOfGradientMeasurements")?
                .unwrap_or(defaults.number_of_gradient_measurements),
            number_of_jacobian_measurements: map
                .get_usize("NumberOfJacobianMeasurements")?
                .unwrap_or(defaults.number_of_jacobian_measurements),
            number_of_samples_for_exact_gradient: map
                .get_usize("NumberOfSamplesForExactGradient")?
                .unwrap_or(defaults.number_of_samples_for_exact_gradient),
        };
        validate_positive("SP_A", optimizer.big_a)?;
        validate_non_negative("SP_alpha", optimizer.alpha)?;
        validate_positive("SigmoidScale", optimizer.sigmoid_scale)?;
        validate_non_negative("SigmoidInitialTime", optimizer.sigmoid_initial_time)?;
        if !(optimizer.sigmoid_min < 0.0 && optimizer.sigmoid_max > 0.0) {
            return Err(RegistrationError::configuration(format!(
                "SigmoidMin must be negative and SigmoidMax positive, got {} and {}",
                optimizer.sigmoid_min, optimizer.sigmoid_max
            )));
        }

        let scales = map.get_f64_list("Scales")?;
        if let Some(scales) = &scales {
            for &s in scales {
                validate_positive("Scales", s)?;
            }
        }

        let center_of_rotation = match map.get_f64_list("CenterOfRotationPoint")? {
            None => None,
            Some(values) => Some(Point::from_slice(&values).ok_or_else(|| {
                RegistrationError::configuration(format!(
                    "CenterOfRotationPoint needs {} values, got {}",
                    D,
                    values.len()
                ))
            })?),
        };

        let final_grid_spacing = match map.get_f64_list("FinalGridSpacingInPhysicalUnits")? {
            Some(values) => GridSpacing::Physical(per_dimension::<D>("FinalGridSpacingInPhysicalUnits", &values)?),
            None => {
                let values = map.get_f64_list("FinalGridSpacingInVoxels")?.unwrap_or_else(|| vec![16.0]);
                GridSpacing::Voxels(per_dimension::<D>("FinalGridSpacingInVoxels", &values)?)
            }
        };
        let spline_order = map.get_usize("BSplineTransformSplineOrder")?.unwrap_or(3);
        validate_spline_order(spline_order)?;

        let grid_schedule = grid_spacing_schedule::<D>(map, levels)?;

        let iterations = map.per_level_usize("MaximumNumberOfIterations", levels)?.unwrap_or(vec![500; levels]);
        let samples = map.per_level_usize("NumberOfSpatialSamples", levels)?.unwrap_or(vec![2048; levels]);
        let bins = map.per_level_usize("NumberOfHistogramBins", levels)?.unwrap_or(vec![32; levels]);
        let refresh = map.per_level_bool("NewSamplesEveryIteration", levels)?.unwrap_or(vec![true; levels]);
        let sp_a = map.per_level_f64("SP_a", levels)?.unwrap_or(vec![400.0; levels]);
        let step_lengths = map.per_level_f64("MaximumStepLength", levels)?;

        let mut level_settings = Vec::with_capacity(levels);
        for level in 0..levels {
            validate_histogram_bins(bins[level])?;
            validate_sample_count(samples[level])?;
            validate_positive("SP_a", sp_a[level])?;
            let maximum_step_length = step_lengths.as_ref().map(|v| v[level]);
            if let Some(step) = maximum_step_length {
                validate_positive("MaximumStepLength", step)?;
            }
            level_settings.push(LevelSettings {
                level,
                iterations: iterations[level],
                samples: samples[level],
                histogram_bins: bins[level],
                new_samples_every_iteration: refresh[level],
                fixed_factors: *fixed_schedule.factors(level).ok_or_else(|| missing_level(level))?,
                moving_factors: *moving_schedule.factors(level).ok_or_else(|| missing_level(level))?,
                grid_spacing_factor: grid_schedule[level],
                sp_a: sp_a[level],
                maximum_step_length,
            });
        }

        let erode = map.get_bool("ErodeMask")?.unwrap_or(false);

        Ok(Self {
            levels,
            transform,
            combination,
            sampler,
            fixed_pyramid,
            moving_pyramid,
            fixed_schedule,
            moving_schedule,
            use_direction_cosines: map.get_bool("UseDirectionCosines")?.unwrap_or(true),
            fixed_interpolation_order,
            moving_interpolation_order,
            final_interpolation_order,
            metric,
            optimizer,
            automatic_transform_initialization: map.get_bool("AutomaticTransformInitialization")?.unwrap_or(false),
            initialization_method,
            automatic_scales_estimation: map.get_bool("AutomaticScalesEstimation")?.unwrap_or(false),
            scales,
            center_of_rotation,
            final_grid_spacing,
            spline_order,
            maximum_number_of_sampling_attempts: map.get_usize("MaximumNumberOfSamplingAttempts")?.unwrap_or(10),
            erode_fixed_mask: map.get_bool("ErodeFixedMask")?.unwrap_or(erode),
            erode_moving_mask: map.get_bool("ErodeMovingMask")?.unwrap_or(erode),
            show_exact_metric_value: map.get_bool("ShowExactMetricValue")?.unwrap_or(false),
            random_seed: map.get_usize("RandomSeed")?.map(|s| s as u64),
            default_pixel_value: map.get_f64("DefaultPixelValue")?.unwrap_or(0.0),
            write_result_image: map.get_bool("WriteResultImage")?.unwrap_or(true),
            result_image_format: map.get_str("ResultImageFormat")?.unwrap_or_else(|| "mhd".to_string()),
            result_pixel_type,
            level_settings,
        })
    }

    pub fn level(&self, level: usize) -> Option<&LevelSettings<D>> {
        self.level_settings.get(level)
    }

    /// Physical B-spline grid spacing of a level.
    pub fn grid_spacing(&self, level: usize, image_spacing: &Spacing<D>) -> Option<Spacing<D>> {
        let settings = self.level(level)?;
        let final_spacing = self.final_grid_spacing.physical(image_spacing);
        Some(Spacing::new(std::array::from_fn(|k| {
            final_spacing[k] * settings.grid_spacing_factor[k]
        })))
    }
}

fn missing_level(level: usize) -> RegistrationError {
    RegistrationError::configuration(format!("no pyramid factors for level {}", level))
}

fn expect_component(map: &ParameterMap, key: &str, supported: &[&str]) -> Result<()> {
    match map.get_str(key)? {
        Some(name) if !supported.contains(&name.as_str()) => Err(RegistrationError::configuration(format!(
            "unsupported {} {}, expected one of {:?}",
            key, name, supported
        ))),
        _ => Ok(()),
    }
}

fn parse_with<T>(map: &ParameterMap, key: &str, parse: impl Fn(&str) -> Option<T>) -> Result<Option<T>> {
    match map.get_str(key)? {
        None => Ok(None),
        Some(name) => parse(&name)
            .map(Some)
            .ok_or_else(|| RegistrationError::configuration(format!("unsupported {} {}", key, name))),
    }
}

/// Fixed or moving pyramid schedule; the shared `ImagePyramidSchedule`
/// applies when the specific one is absent.
fn pyramid_schedule<const D: usize>(map: &ParameterMap, key: &str, levels: usize) -> Result<PyramidSchedule<D>> {
    let (option, values) = match map.get_usize_list(key)? {
        Some(values) => (key, values),
        None => match map.get_usize_list("ImagePyramidSchedule")? {
            Some(values) => ("ImagePyramidSchedule", values),
            None => return Ok(PyramidSchedule::default_schedule(levels)),
        },
    };
    PyramidSchedule::from_flat(&values, levels).map_err(|e| match e {
        CoreError::InvalidSchedule { expected, actual } => RegistrationError::InvalidSchedule {
            option: option.to_string(),
            expected,
            actual,
        },
        other => RegistrationError::configuration(format!("{}: {}", option, other)),
    })
}

/// Grid spacing multipliers: one value per level, or one per level and dimension.
fn grid_spacing_schedule<const D: usize>(map: &ParameterMap, levels: usize) -> Result<Vec<[f64; D]>> {
    let Some(values) = map.get_f64_list("GridSpacingSchedule")? else {
        return Ok((0..levels)
            .map(|level| [2f64.powi((levels - 1 - level) as i32); D])
            .collect());
    };
    for &v in &values {
        validate_positive("GridSpacingSchedule", v)?;
    }
    if values.len() == levels {
        Ok(values.iter().map(|&v| [v; D]).collect())
    } else {
        validate_schedule_length("GridSpacingSchedule", levels * D, values.len())?;
        Ok(values
            .chunks_exact(D)
            .map(|chunk| std::array::from_fn(|k| chunk[k]))
            .collect())
    }
}

fn per_dimension<const D: usize>(option: &str, values: &[f64]) -> Result<[f64; D]> {
    for &v in values {
        validate_positive(option, v)?;
    }
    match values.len() {
        1 => Ok([values[0]; D]),
        n if n == D => Ok(std::array::from_fn(|k| values[k])),
        n => Err(RegistrationError::configuration(format!(
            "{} needs 1 or {} values, got {}",
            option, D, n
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistrationConfig::<3>::from_parameter_map(&ParameterMap::new()).unwrap();
        assert_eq!(config.levels, 4);
        assert_eq!(config.transform, TransformKind::Euler);
        assert_eq!(config.sampler, SamplerKind::RandomCoordinate);
        assert_eq!(config.combination, CombinationMode::Compose);
        assert_eq!(config.final_interpolation_order, 3);
        assert_eq!(config.result_image_format, "mhd");
        assert_eq!(config.result_pixel_type, PixelType::Float);
        assert!(config.write_result_image);
        assert!(config.use_direction_cosines);
        assert_eq!(config.final_grid_spacing, GridSpacing::Voxels([16.0; 3]));

        let first = config.level(0).unwrap();
        assert_eq!(first.iterations, 500);
        assert_eq!(first.samples, 2048);
        assert_eq!(first.histogram_bins, 32);
        assert!(first.new_samples_every_iteration);
        assert_eq!(first.fixed_factors, [8, 8, 8]);
        assert_eq!(first.grid_spacing_factor, [8.0; 3]);
        assert_eq!(config.level(3).unwrap().fixed_factors, [1, 1, 1]);
    }

    #[test]
    fn test_per_level_values() {
        let map = ParameterMap::new()
            .with("NumberOfResolutions", 2usize)
            .with_values("MaximumNumberOfIterations", [200usize, 100])
            .with("NumberOfSpatialSamples", 500usize)
            .with_values("ImagePyramidSchedule", [4usize, 4, 1, 1])
            .with_values("MovingImagePyramidSchedule", [2usize, 2, 1, 1]);
        let config = RegistrationConfig::<2>::from_parameter_map(&map).unwrap();

        assert_eq!(config.level(0).unwrap().iterations, 200);
        assert_eq!(config.level(1).unwrap().iterations, 100);
        assert_eq!(config.level(1).unwrap().samples, 500);
        assert_eq!(config.level(0).unwrap().fixed_factors, [4, 4]);
        assert_eq!(config.level(0).unwrap().moving_factors, [2, 2]);
    }

    #[test]
    fn test_schedule_length_mismatch_is_reported() {
        let map = ParameterMap::new()
            .with("NumberOfResolutions", 2usize)
            .with_values("ImagePyramidSchedule", [4usize, 4, 1]);
        let err = RegistrationConfig::<2>::from_parameter_map(&map).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::InvalidSchedule {
                option: "ImagePyramidSchedule".to_string(),
                expected: 4,
                actual: 3,
            }
        );
    }

    #[test]
    fn test_resolution_count_is_bounded() {
        for levels in [0usize, 70] {
            let map = ParameterMap::new().with("NumberOfResolutions", levels);
            assert!(matches!(
                RegistrationConfig::<2>::from_parameter_map(&map),
                Err(RegistrationError::Configuration(_))
            ));
        }

        let map = ParameterMap::new().with("NumberOfResolutions", 32usize);
        let config = RegistrationConfig::<2>::from_parameter_map(&map).unwrap();
        assert_eq!(config.level(0).unwrap().fixed_factors, [1 << 31; 2]);
    }

    #[test]
    fn test_grid_spacing_schedule() {
        let map = ParameterMap::new()
            .with("NumberOfResolutions", 2usize)
            .with("Transform", "BSplineTransform")
            .with("FinalGridSpacingInPhysicalUnits", 1.5)
            .with_values("GridSpacingSchedule", [4.0, 2.0]);
        let config = RegistrationConfig::<2>::from_parameter_map(&map).unwrap();
        let spacing = Spacing::uniform(1.0);
        assert_eq!(config.grid_spacing(0, &spacing).unwrap()[0], 6.0);
        assert_eq!(config.grid_spacing(1, &spacing).unwrap()[1], 3.0);

        let bad = map.with_values("GridSpacingSchedule", [4.0, 2.0, 1.0]);
        assert!(matches!(
            RegistrationConfig::<2>::from_parameter_map(&bad),
            Err(RegistrationError::InvalidSchedule { .. })
        ));
    }

    #[test]
    fn test_unsupported_components_are_rejected() {
        let map = ParameterMap::new().with("Metric", "AdvancedMeanSquares");
        assert!(matches!(
            RegistrationConfig::<2>::from_parameter_map(&map),
            Err(RegistrationError::Configuration(_))
        ));

        let map = ParameterMap::new().with("FixedImageDimension", 3usize);
        assert!(RegistrationConfig::<2>::from_parameter_map(&map).is_err());
    }

    #[test]
    fn test_unknown_options_are_not_fatal() {
        let map = ParameterMap::new().with("SomethingElse", 1.0);
        assert!(RegistrationConfig::<2>::from_parameter_map(&map).is_ok());
        assert!(!is_known_option("SomethingElse"));
        assert!(is_known_option("WriteIterationInfo"));
    }

    #[test]
    fn test_interpolator_components() {
        let map = ParameterMap::new()
            .with("Interpolator", "NearestNeighborInterpolator")
            .with("ResampleInterpolator", "FinalLinearInterpolator");
        let config = RegistrationConfig::<2>::from_parameter_map(&map).unwrap();
        assert_eq!(config.moving_interpolation_order, 0);
        assert_eq!(config.final_interpolation_order, 1);
    }
}
