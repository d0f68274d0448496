use mireg_core::image::ImageGeometry;
use mireg_core::spatial::{Point, Spacing, Vector};
use mireg_core::transform::{
    BSplineTransform, CombinationMode, CombinationTransform, EulerTransform, Transform,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_rigid_inverse_round_trip_3d(
        ax in -1.5f64..1.5, ay in -1.4f64..1.4, az in -1.5f64..1.5,
        tx in -20.0f64..20.0, ty in -20.0f64..20.0, tz in -20.0f64..20.0,
        px in -30.0f64..30.0, py in -30.0f64..30.0, pz in -30.0f64..30.0
    ) {
        let transform = EulerTransform::<3>::with_parameters(
            Point::new([1.0, -2.0, 3.0]),
            &[ax, ay, az, tx, ty, tz],
        ).unwrap();
        let inverse = transform.inverse().unwrap();

        let point = Point::new([px, py, pz]);
        let back = inverse.transform_point(&transform.transform_point(&point));
        prop_assert!(back.distance(&point) < 1e-8);
    }

    #[test]
    fn test_rigid_transform_preserves_distances_2d(
        angle in -3.1f64..3.1, tx in -5.0f64..5.0, ty in -5.0f64..5.0,
        ax in -10.0f64..10.0, ay in -10.0f64..10.0,
        bx in -10.0f64..10.0, by in -10.0f64..10.0
    ) {
        let transform = EulerTransform::<2>::with_parameters(Point::new([0.5, 0.5]), &[angle, tx, ty]).unwrap();
        let a = Point::new([ax, ay]);
        let b = Point::new([bx, by]);
        let distance = transform.transform_point(&a).distance(&transform.transform_point(&b));
        prop_assert!((distance - a.distance(&b)).abs() < 1e-9);
    }
}

#[test]
fn test_zero_bspline_is_identity_everywhere() {
    let domain = ImageGeometry::<3>::with_size([8, 6, 5]).unwrap();
    let transform = BSplineTransform::from_domain(&domain, &Spacing::uniform(2.0), 3).unwrap();
    for point in [Point::new([0.0, 0.0, 0.0]), Point::new([3.3, 2.1, 4.0]), Point::new([50.0, -3.0, 1.0])] {
        assert_eq!(transform.transform_point(&point), point);
    }
}

#[test]
fn test_parameter_length_is_checked() {
    let mut transform = EulerTransform::<2>::new(Point::origin());
    assert!(transform.set_parameters(&[0.0, 1.0]).is_err());
    assert_eq!(transform.parameters(), &[0.0, 0.0, 0.0]);
}

#[test]
fn test_combination_exposes_only_current_parameters() {
    let mut initial = EulerTransform::<2>::new(Point::origin());
    initial.set_translation(Vector::new([2.0, 0.0]));

    let domain = ImageGeometry::<2>::with_size([10, 10]).unwrap();
    let current = BSplineTransform::from_domain(&domain, &Spacing::uniform(4.0), 3).unwrap();
    let count = current.number_of_parameters();

    let mut combined = CombinationTransform::with_initial(
        Box::new(initial),
        Box::new(current),
        CombinationMode::Compose,
    );
    assert_eq!(combined.number_of_parameters(), count);

    let shifted = combined.transform_point(&Point::new([1.0, 1.0]));
    assert!(shifted.distance(&Point::new([3.0, 1.0])) < 1e-12);

    // A constant displacement in x on every control point adds to the initial shift.
    let mut params = vec![0.0; count];
    for p in params.iter_mut().take(count / 2) {
        *p = 0.5;
    }
    combined.set_parameters(&params).unwrap();
    let shifted = combined.transform_point(&Point::new([1.0, 1.0]));
    assert!(shifted.distance(&Point::new([3.5, 1.0])) < 1e-9);
}
