use mireg_core::filter::PyramidKind;
use mireg_registration::config::{GridSpacing, ParameterMap, SamplerKind, TransformKind};
use mireg_registration::{PixelType, RegistrationConfig, RegistrationError};

const PARAMETER_FILE: &str = r#"{
    "Registration": "MultiResolutionRegistration",
    "Transform": "BSplineTransform",
    "Metric": "AdvancedMattesMutualInformation",
    "Optimizer": "AdaptiveStochasticGradientDescent",
    "ImageSampler": "Random",
    "FixedImagePyramid": "FixedSmoothingImagePyramid",
    "NumberOfResolutions": 3,
    "MaximumNumberOfIterations": [100, 200, 300],
    "NumberOfSpatialSamples": 512,
    "ImagePyramidSchedule": [4, 4, 2, 2, 1, 1],
    "FinalGridSpacingInVoxels": [8, 10],
    "UseDirectionCosines": "false",
    "ResultImagePixelType": "short",
    "SP_a": [1000, 500, 250],
    "WriteTransformParametersEachIteration": "false",
    "SomeUnknownOption": 3
}"#;

#[test]
fn test_parameter_file() -> anyhow::Result<()> {
    let map = ParameterMap::from_json(PARAMETER_FILE)?;
    let config = RegistrationConfig::<2>::from_parameter_map(&map)?;

    assert_eq!(config.levels, 3);
    assert_eq!(config.transform, TransformKind::BSpline);
    assert_eq!(config.sampler, SamplerKind::Random);
    assert_eq!(config.fixed_pyramid, PyramidKind::Smoothing);
    assert_eq!(config.moving_pyramid, PyramidKind::Recursive);
    assert!(!config.use_direction_cosines);
    assert_eq!(config.result_pixel_type, PixelType::Short);
    assert_eq!(config.final_grid_spacing, GridSpacing::Voxels([8.0, 10.0]));

    let iterations: Vec<usize> = config.level_settings.iter().map(|l| l.iterations).collect();
    assert_eq!(iterations, vec![100, 200, 300]);
    assert!(config.level_settings.iter().all(|l| l.samples == 512));
    assert_eq!(config.level_settings[0].fixed_factors, [4, 4]);
    assert_eq!(config.level_settings[2].moving_factors, [1, 1]);
    assert_eq!(config.level_settings[1].sp_a, 500.0);
    Ok(())
}

#[test]
fn test_short_per_level_list_is_rejected() -> anyhow::Result<()> {
    let mut map = ParameterMap::from_json(PARAMETER_FILE)?;
    map.set_values("MaximumNumberOfIterations", [100usize, 200]);
    let err = RegistrationConfig::<2>::from_parameter_map(&map).unwrap_err();
    assert!(matches!(err, RegistrationError::Configuration(_)));
    Ok(())
}

#[test]
fn test_bad_pyramid_schedule_length() -> anyhow::Result<()> {
    let mut map = ParameterMap::from_json(PARAMETER_FILE)?;
    map.set_values("ImagePyramidSchedule", [4usize, 4, 2, 2, 1]);
    let err = RegistrationConfig::<2>::from_parameter_map(&map).unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidSchedule { ref option, .. } if option == "ImagePyramidSchedule"));
    Ok(())
}

#[test]
fn test_unsupported_components() -> anyhow::Result<()> {
    let mut map = ParameterMap::from_json(PARAMETER_FILE)?;
    map.set("Metric", "AdvancedMeanSquares");
    assert!(RegistrationConfig::<2>::from_parameter_map(&map).is_err());

    let map = ParameterMap::from_json(PARAMETER_FILE)?.with("FixedImageDimension", 3usize);
    assert!(RegistrationConfig::<2>::from_parameter_map(&map).is_err());
    Ok(())
}

#[test]
fn test_map_round_trips_through_json() -> anyhow::Result<()> {
    let map = ParameterMap::from_json(PARAMETER_FILE)?;
    let again = ParameterMap::from_json(&map.to_json()?)?;
    assert_eq!(map, again);
    Ok(())
}
