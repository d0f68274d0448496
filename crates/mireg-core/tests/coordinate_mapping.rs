use mireg_core::image::{Image, ImageGeometry};
use mireg_core::spatial::{Direction, Point, Spacing};
use burn::tensor::Tensor;
use burn_ndarray::NdArray;
use nalgebra::{Rotation3, Vector3};
use proptest::prelude::*;

type Backend = NdArray<f32>;
const D: usize = 3;

fn make_rotation(ax: f64, ay: f64, az: f64) -> Direction<D> {
    let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), az)
        * Rotation3::from_axis_angle(&Vector3::y_axis(), ay)
        * Rotation3::from_axis_angle(&Vector3::x_axis(), ax);
    Direction(rotation.into_inner())
}

proptest! {
    #[test]
    fn test_coordinate_roundtrip(
        ox in -100.0f64..100.0, oy in -100.0f64..100.0, oz in -100.0f64..100.0,
        sx in 0.1f64..5.0, sy in 0.1f64..5.0, sz in 0.1f64..5.0,
        ax in -3.14f64..3.14, ay in -3.14f64..3.14, az in -3.14f64..3.14,
        px in -50.0f64..50.0, py in -50.0f64..50.0, pz in -50.0f64..50.0
    ) {
        let geometry = ImageGeometry::new(
            [4, 5, 6],
            Point::new([ox, oy, oz]),
            Spacing::new([sx, sy, sz]),
            make_rotation(ax, ay, az),
        ).unwrap();

        let point = Point::new([px, py, pz]);
        let index = geometry.physical_to_index(&point);
        let back = geometry.index_to_physical(&index);

        for k in 0..D {
            prop_assert!((back[k] - point[k]).abs() < 1e-8);
        }
    }

    #[test]
    fn test_pixel_centres_are_inside(
        sx in 0.1f64..5.0, sy in 0.1f64..5.0,
        x in 0usize..7, y in 0usize..4
    ) {
        let geometry = ImageGeometry::<2>::new(
            [7, 4],
            Point::new([3.0, -2.0]),
            Spacing::new([sx, sy]),
            Direction::identity(),
        ).unwrap();
        let point = geometry.index_point(&[x, y]);
        prop_assert!(geometry.contains(&point));
        prop_assert_eq!(geometry.nearest_index(&geometry.physical_to_index(&point)), Some([x, y]));
    }
}

#[test]
fn test_image_size_is_reversed_tensor_shape() {
    let device = Default::default();
    let data = Tensor::<Backend, 3>::zeros([2, 3, 4], &device);
    let image = Image::new(
        data,
        Point::new([0.0, 0.0, 0.0]),
        Spacing::new([1.0, 1.0, 1.0]),
        Direction::identity(),
    ).unwrap();
    assert_eq!(image.size(), [4, 3, 2]);
    assert_eq!(image.shape(), [2, 3, 4]);
}

#[test]
fn test_valid_domain_extends_half_a_pixel() {
    let geometry = ImageGeometry::<2>::new(
        [10, 10],
        Point::new([0.0, 0.0]),
        Spacing::new([2.0, 2.0]),
        Direction::identity(),
    ).unwrap();
    assert!(geometry.contains(&Point::new([-1.0, 19.0])));
    assert!(!geometry.contains(&Point::new([-1.01, 0.0])));
    assert!(!geometry.contains(&Point::new([0.0, 19.01])));
}

#[test]
fn test_singular_direction_is_rejected() {
    let direction = Direction::<2>::from_row_slice(&[1.0, 2.0, 2.0, 4.0]).unwrap();
    let result = ImageGeometry::new([3, 3], Point::origin(), Spacing::uniform(1.0), direction);
    assert!(result.is_err());
}
