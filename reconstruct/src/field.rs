use common::config::IntensityConvention;

use crate::{geometry::BoundingBox, volume::Volume, Pos};

/// Value returned for points outside of a field's grid. It is far on the
/// exterior side so no surface is ever generated out there.
pub const OUTSIDE_VALUE: f32 = f32::MAX;

/// A continuous function over space whose zero level set is the surface.
/// Negative values are inside.
pub trait ScalarField: Sync {
    fn value(&self, point: Pos) -> f32;

    /// Region the field is defined over.
    fn bounds(&self) -> BoundingBox;
}

/// Trilinear interpolation over the voxels of a volume with uniform spacing.
pub struct VolumeField {
    grid: Volume,
    origin: Pos,
    cell_size: f32,
}

impl VolumeField {
    /// Wraps a volume, mapping its intensities through the convention so the
    /// inside is negative. The grid's first voxel sits at `origin`.
    pub fn new(volume: &Volume, convention: IntensityConvention, origin: Pos) -> Self {
        Self {
            grid: volume.map(move |x| convention.apply(x)),
            origin,
            cell_size: volume.spacing().x,
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// True if any voxel is inside the surface.
    pub fn has_interior(&self) -> bool {
        self.grid.voxels().iter().any(|&x| x < 0.0)
    }
}

impl ScalarField for VolumeField {
    fn value(&self, point: Pos) -> f32 {
        let index = (point - self.origin) / self.cell_size;
        let max = self.grid.dimensions().cast::<f32>().add_scalar(-1.0);

        let outside = (0..3).any(|i| !(index[i] >= 0.0 && index[i] <= max[i]));
        if outside {
            return OUTSIDE_VALUE;
        }

        self.grid.interpolate(index)
    }

    fn bounds(&self) -> BoundingBox {
        let extent = self.grid.dimensions().cast::<f32>() * self.cell_size;
        BoundingBox::new(self.origin, self.origin + extent)
    }
}
