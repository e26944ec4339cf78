use nalgebra::Vector3;
use rayon::prelude::*;
use tracing::debug;

use crate::{error::ReconstructError, volume::Volume, Pos, Result};

/// Resamples a volume onto a grid with the given spacing using trilinear
/// interpolation. The physical extent, origin and orientation are kept.
///
/// Output voxel `(i, j, k)` samples the input at continuous index
/// `(i, j, k) * spacing / input_spacing`. Samples outside
/// `[-0.5, n - 0.5)` along any axis are zero.
pub fn resample(volume: &Volume, spacing: Pos) -> Result<Volume> {
    if spacing.iter().any(|&x| !x.is_finite() || x <= 0.0) {
        return Err(ReconstructError::InvalidParameters {
            reason: format!(
                "resample spacing must be positive and finite, got ({}, {}, {})",
                spacing.x, spacing.y, spacing.z
            ),
        });
    }

    if volume.has_spacing(spacing) {
        return Ok(volume.clone());
    }

    let old_spacing = volume.spacing();
    let input = volume.dimensions();
    let dimensions = resampled_dimensions(input, old_spacing, spacing);
    let scale = spacing.component_div(&old_spacing);
    debug!(
        "Resampling {}x{}x{} volume to {}x{}x{}",
        input.x, input.y, input.z, dimensions.x, dimensions.y, dimensions.z
    );

    let limit = input.cast::<f32>().add_scalar(-0.5);
    // Half open, a sample exactly half a voxel past the end is outside.
    let inside = |index: Pos| (0..3).all(|i| index[i] >= -0.5 && index[i] < limit[i]);

    let (nx, ny) = (dimensions.x, dimensions.y);
    let mut voxels = vec![0.0; nx * ny * dimensions.z];
    voxels
        .par_chunks_mut(nx * ny)
        .enumerate()
        .for_each(|(k, slice)| {
            for j in 0..ny {
                for i in 0..nx {
                    let index = Pos::new(i as f32, j as f32, k as f32).component_mul(&scale);
                    if inside(index) {
                        slice[i + nx * j] = volume.interpolate(index);
                    }
                }
            }
        });

    Ok(Volume::new(dimensions, spacing, voxels)?
        .with_origin(volume.origin())
        .with_direction(*volume.direction()))
}

/// Number of voxels needed along each axis to cover the same physical extent
/// with the new spacing.
pub fn resampled_dimensions(
    dimensions: Vector3<usize>,
    old_spacing: Pos,
    new_spacing: Pos,
) -> Vector3<usize> {
    Vector3::from_fn(|i, _| {
        let size = dimensions[i] as f64 * old_spacing[i] as f64 / new_spacing[i] as f64;
        // Keeps float noise from adding a whole extra voxel.
        ((size - 1e-4).ceil() as usize).max(1)
    })
}
