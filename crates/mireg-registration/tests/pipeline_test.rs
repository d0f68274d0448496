use std::sync::Arc;
use burn_ndarray::NdArray;
use mireg_core::image::{Image, ImageGeometry};
use mireg_core::spatial::Point;
use mireg_core::transform::Transform;
use mireg_registration::config::ParameterMap;
use mireg_registration::output::transform_from_parameter_maps;
use mireg_registration::progress::LevelInfo;
use mireg_registration::{
    CancellationToken, HistoryCallback, MultiResolutionRegistration, ProgressCallback, ProgressInfo,
    RegistrationConfig, RegistrationError, RegistrationPipeline,
};

type B = NdArray<f32>;

fn blob(size: usize, center: (f64, f64)) -> Image<B, 2> {
    let device = Default::default();
    let values: Vec<f64> = (0..size * size)
        .map(|i| {
            let (x, y) = ((i % size) as f64, (i / size) as f64);
            let r2 = (x - center.0).powi(2) + (y - center.1).powi(2);
            100.0 * (-r2 / 12.0).exp()
        })
        .collect();
    Image::from_values(ImageGeometry::with_size([size, size]).unwrap(), &values, &device).unwrap()
}

fn two_blobs(size: usize, left: (f64, f64), right: (f64, f64)) -> Image<B, 2> {
    let device = Default::default();
    let values: Vec<f64> = (0..size * size)
        .map(|i| {
            let (x, y) = ((i % size) as f64, (i / size) as f64);
            [left, right]
                .iter()
                .map(|c| 100.0 * (-((x - c.0).powi(2) + (y - c.1).powi(2)) / 8.0).exp())
                .sum()
        })
        .collect();
    Image::from_values(ImageGeometry::with_size([size, size]).unwrap(), &values, &device).unwrap()
}

fn sum_of_squared_differences(a: &Image<B, 2>, b: &Image<B, 2>) -> f64 {
    a.to_values().iter().zip(b.to_values()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn quick_map(transform: &str, levels: usize) -> ParameterMap {
    ParameterMap::new()
        .with("Transform", transform)
        .with("NumberOfResolutions", levels)
        .with("MaximumNumberOfIterations", 4usize)
        .with("NumberOfSpatialSamples", 64usize)
        .with("NumberOfHistogramBins", 16usize)
        .with("FinalGridSpacingInVoxels", 8.0)
        .with("RandomSeed", 11usize)
}

/// Cancels the run once the given level has finished.
struct CancelAfterLevel {
    level: usize,
    token: CancellationToken,
}

impl ProgressCallback for CancelAfterLevel {
    fn on_progress(&self, _info: &ProgressInfo) {}

    fn on_level_complete(&self, info: &LevelInfo) {
        if info.level == self.level {
            self.token.cancel();
        }
    }
}

#[test]
fn test_pipeline_chains_stages() -> anyhow::Result<()> {
    let fixed = blob(20, (9.5, 9.5));
    let moving = blob(20, (10.5, 9.0));
    let maps = vec![quick_map("EulerTransform", 2), quick_map("BSplineTransform", 1)];

    let history = Arc::new(HistoryCallback::new());
    let pipeline = RegistrationPipeline::<B, 2>::from_parameter_maps(&maps)?.with_callback(history.clone());
    let results = pipeline.execute(&fixed, &moving)?;

    assert_eq!(results.len(), 2);
    let last = &results[1];
    assert!(last.transform.initial().is_some());
    assert_eq!(last.transform_parameters.len(), 2);
    assert_eq!(last.transform_parameters[0].get_str("Transform")?.as_deref(), Some("EulerTransform"));
    assert_eq!(last.transform_parameters[1].get_str("Transform")?.as_deref(), Some("BSplineTransform"));

    // Two rigid levels and one B-spline level, four iterations each.
    assert_eq!(history.get_history().len(), 12);
    assert_eq!(history.get_levels().len(), 3);

    // The records rebuild the same mapping.
    let rebuilt = transform_from_parameter_maps::<2>(&last.transform_parameters)?.build()?;
    let p = Point::new([7.0, 12.0]);
    assert!((rebuilt.transform_point(&p) - last.transform.transform_point(&p)).norm() < 1e-9);
    Ok(())
}

#[test]
fn test_bspline_stage_improves_on_rigid_stage() -> anyhow::Result<()> {
    // Shared offset of (1, 0.5) plus an extra voxel on the right blob only.
    let fixed = two_blobs(24, (7.0, 12.0), (16.0, 12.0));
    let moving = two_blobs(24, (8.0, 12.5), (18.0, 12.5));

    let rigid = ParameterMap::new()
        .with("Transform", "EulerTransform")
        .with("NumberOfResolutions", 2usize)
        .with("MaximumNumberOfIterations", 100usize)
        .with("NumberOfSpatialSamples", 200usize)
        .with("RandomSeed", 3usize);
    let deformable = ParameterMap::new()
        .with("Transform", "BSplineTransform")
        .with("NumberOfResolutions", 1usize)
        .with("MaximumNumberOfIterations", 200usize)
        .with("NumberOfSpatialSamples", 500usize)
        .with("FinalGridSpacingInVoxels", 8.0)
        .with("RandomSeed", 3usize);

    let pipeline = RegistrationPipeline::<B, 2>::from_parameter_maps(&[rigid, deformable])?;
    let results = pipeline.execute(&fixed, &moving)?;
    assert_eq!(results.len(), 2);

    let rigid_image = &results[0].result_image.as_ref().expect("rigid result image").image;
    let final_image = &results[1].result_image.as_ref().expect("final result image").image;
    let before = sum_of_squared_differences(&fixed, &moving);
    let after_rigid = sum_of_squared_differences(&fixed, rigid_image);
    let after_deformable = sum_of_squared_differences(&fixed, final_image);
    println!("SSD: start {before:.1}, rigid {after_rigid:.1}, deformable {after_deformable:.1}");

    assert!(after_rigid < before);
    assert!(after_deformable < after_rigid);

    // The right blob needs the local correction the rigid stage cannot give.
    let right = Point::new([16.0, 12.0]);
    let rigid_error = (results[0].transform.transform_point(&right) - Point::new([18.0, 12.5])).norm();
    let final_error = (results[1].transform.transform_point(&right) - Point::new([18.0, 12.5])).norm();
    assert!(final_error < rigid_error, "rigid {rigid_error}, deformable {final_error}");
    Ok(())
}

#[test]
fn test_pipeline_reports_bad_stage() {
    let maps = vec![quick_map("EulerTransform", 1), quick_map("AffineTransform", 1)];
    let failure = RegistrationPipeline::<B, 2>::from_parameter_maps(&maps).err().expect("stage 1 is invalid");
    assert!(failure.to_string().contains("stage 1"));
}

#[test]
fn test_cancelled_before_start() -> anyhow::Result<()> {
    let image = blob(16, (7.5, 7.5));
    let config = RegistrationConfig::<2>::from_parameter_map(&quick_map("EulerTransform", 2))?;
    let token = CancellationToken::new();
    token.cancel();

    let failure = MultiResolutionRegistration::<B, 2>::new(config)
        .with_cancellation(token)
        .execute(&image, &image)
        .err()
        .expect("cancelled run fails");
    assert_eq!(failure.level, 0);
    assert_eq!(failure.iteration, 0);
    assert_eq!(failure.cause, RegistrationError::Cancelled);
    assert!(failure.completed.is_empty());
    Ok(())
}

#[test]
fn test_cancelled_between_levels_keeps_completed_levels() -> anyhow::Result<()> {
    let image = blob(16, (7.5, 7.5));
    let config = RegistrationConfig::<2>::from_parameter_map(&quick_map("EulerTransform", 3))?;
    let registration = MultiResolutionRegistration::<B, 2>::new(config);
    let token = registration.cancellation_token();
    let registration = registration.with_callback(Arc::new(CancelAfterLevel { level: 0, token }));

    let failure = registration.execute(&image, &image).err().expect("cancelled run fails");
    assert_eq!(failure.level, 1);
    assert_eq!(failure.cause, RegistrationError::Cancelled);
    assert_eq!(failure.completed.len(), 1);
    assert_eq!(failure.completed[0].iterations_run, 4);
    Ok(())
}
