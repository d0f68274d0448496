//! Initial placement of rigid transforms.
//!
//! Aligns the centers of the fixed and moving images, either their
//! geometrical centers or their intensity centers of gravity, and rotates
//! about the fixed center.

use rayon::prelude::*;
use mireg_core::image::{index_grid, ImageMask};
use mireg_core::interpolation::ImageAccessor;
use mireg_core::spatial::{Point, Vector};
use mireg_core::transform::EulerTransform;
use crate::config::InitializationMethod;
use crate::error::{RegistrationError, Result};

/// Intensity-weighted mean physical position.
///
/// Only pixels inside the mask with positive intensity contribute.
pub fn center_of_gravity<const D: usize>(image: &ImageAccessor<D>, mask: Option<&ImageMask<D>>) -> Result<Point<D>> {
    let geometry = image.geometry();
    let (weighted, total) = index_grid(geometry.size())
        .collect::<Vec<_>>()
        .into_par_iter()
        .filter(|index| mask.map_or(true, |m| m.is_inside(&geometry.index_point(index))))
        .map(|index| {
            let w = image.value_at_index(&index).max(0.0);
            (geometry.index_point(&index).coords() * w, w)
        })
        .reduce(|| (Vector::zeros(), 0.0), |(a, wa), (b, wb)| (a + b, wa + wb));

    if total <= 0.0 {
        return Err(RegistrationError::domain("image has no positive intensity to compute a center of gravity"));
    }
    Ok(Point::origin() + weighted / total)
}

/// Center of an image under the chosen method.
pub fn image_center<const D: usize>(
    image: &ImageAccessor<D>,
    mask: Option<&ImageMask<D>>,
    method: InitializationMethod,
) -> Result<Point<D>> {
    match method {
        InitializationMethod::GeometricalCenter => Ok(image.geometry().center()),
        InitializationMethod::CenterOfGravity => center_of_gravity(image, mask),
    }
}

/// Rigid transform about `center` translating the fixed center onto the moving one.
///
/// # Arguments
/// * `fixed` - Full-resolution fixed image
/// * `moving` - Full-resolution moving image
/// * `masks` - Optional fixed and moving masks
/// * `method` - How image centers are computed
/// * `center` - Center of rotation; the fixed center when `None`
pub fn initialize_euler<const D: usize>(
    fixed: &ImageAccessor<D>,
    moving: &ImageAccessor<D>,
    masks: (Option<&ImageMask<D>>, Option<&ImageMask<D>>),
    method: InitializationMethod,
    center: Option<Point<D>>,
) -> Result<EulerTransform<D>> {
    let fixed_center = image_center(fixed, masks.0, method)?;
    let moving_center = image_center(moving, masks.1, method)?;
    let mut transform = EulerTransform::new(center.unwrap_or(fixed_center));
    transform.set_translation(moving_center - fixed_center);
    tracing::debug!(
        fixed = ?fixed_center.to_vec(),
        moving = ?moving_center.to_vec(),
        "initialized rigid transform"
    );
    Ok(transform)
}
