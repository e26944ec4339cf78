use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

use crate::{error::ReconstructError, Pos, Result};

/// A dense grid of scalar samples, like a stack of scan slices. Voxel
/// `(i, j, k)` lives at `voxels[i + nx * (j + ny * k)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    dimensions: Vector3<usize>,
    spacing: Pos,
    origin: Pos,
    direction: Matrix3<f32>,
    voxels: Vec<f32>,
}

/// Anything that can produce a volume, like a directory of slice images.
pub trait VolumeSource {
    fn load(&self) -> Result<Volume>;
}

impl Volume {
    /// Creates a volume at the origin with an identity orientation, checking
    /// that the dimensions and spacing make sense for the voxel buffer.
    pub fn new(dimensions: Vector3<usize>, spacing: Pos, voxels: Vec<f32>) -> Result<Self> {
        if dimensions.iter().any(|&x| x == 0) {
            return Err(ReconstructError::invalid_volume(format!(
                "dimensions must be positive, got {}x{}x{}",
                dimensions.x, dimensions.y, dimensions.z
            )));
        }

        if spacing.iter().any(|&x| !x.is_finite() || x <= 0.0) {
            return Err(ReconstructError::invalid_volume(format!(
                "spacing must be positive and finite, got ({}, {}, {})",
                spacing.x, spacing.y, spacing.z
            )));
        }

        let expected = dimensions
            .iter()
            .try_fold(1_usize, |acc, &x| acc.checked_mul(x))
            .ok_or_else(|| ReconstructError::invalid_volume("voxel count overflows"))?;
        if voxels.len() != expected {
            return Err(ReconstructError::invalid_volume(format!(
                "expected {expected} voxels, got {}",
                voxels.len()
            )));
        }

        Ok(Self {
            dimensions,
            spacing,
            origin: Pos::zeros(),
            direction: Matrix3::identity(),
            voxels,
        })
    }

    /// Creates a volume by evaluating `f` at every voxel index.
    pub fn from_fn(
        dimensions: Vector3<usize>,
        spacing: Pos,
        mut f: impl FnMut(usize, usize, usize) -> f32,
    ) -> Result<Self> {
        let (nx, ny, nz) = (dimensions.x, dimensions.y, dimensions.z);
        let mut voxels = Vec::with_capacity(nx.saturating_mul(ny).saturating_mul(nz));
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    voxels.push(f(i, j, k));
                }
            }
        }

        Self::new(dimensions, spacing, voxels)
    }

    pub fn with_origin(self, origin: Pos) -> Self {
        Self { origin, ..self }
    }

    pub fn with_direction(self, direction: Matrix3<f32>) -> Self {
        Self { direction, ..self }
    }

    pub fn dimensions(&self) -> Vector3<usize> {
        self.dimensions
    }

    pub fn spacing(&self) -> Pos {
        self.spacing
    }

    pub fn origin(&self) -> Pos {
        self.origin
    }

    pub fn direction(&self) -> &Matrix3<f32> {
        &self.direction
    }

    pub fn voxels(&self) -> &[f32] {
        &self.voxels
    }

    pub fn voxel_count(&self) -> usize {
        self.voxels.len()
    }

    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.dimensions.x * (j + self.dimensions.y * k)
    }

    /// Value of a voxel. Panics if the index is outside the grid.
    pub fn get(&self, i: usize, j: usize, k: usize) -> f32 {
        self.voxels[self.index(i, j, k)]
    }

    /// Size of the scanned region in physical units.
    pub fn physical_extent(&self) -> Pos {
        self.dimensions.cast::<f32>().component_mul(&self.spacing)
    }

    /// Minimum and maximum voxel value.
    pub fn value_range(&self) -> (f32, f32) {
        self.voxels
            .iter()
            .fold((f32::MAX, f32::MIN), |(min, max), &x| (min.min(x), max.max(x)))
    }

    /// Index of the first voxel that is NaN or infinite, if any.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.voxels.iter().position(|x| !x.is_finite())
    }

    pub fn has_spacing(&self, spacing: Pos) -> bool {
        (self.spacing - spacing).abs().max() <= f32::EPSILON
    }

    /// Trilinear interpolation at a continuous voxel index. Neighbours
    /// outside the grid are clamped to its edge.
    pub fn interpolate(&self, index: Pos) -> f32 {
        let base = index.map(f32::floor);
        let t = index - base;

        let clamp = |x: f32, n: usize| (x.max(0.0) as usize).min(n - 1);
        let (n, b) = (self.dimensions, base);
        let [x0, y0, z0] = [clamp(b.x, n.x), clamp(b.y, n.y), clamp(b.z, n.z)];
        let [x1, y1, z1] = [
            clamp(b.x + 1.0, n.x),
            clamp(b.y + 1.0, n.y),
            clamp(b.z + 1.0, n.z),
        ];

        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let c00 = lerp(self.get(x0, y0, z0), self.get(x1, y0, z0), t.x);
        let c10 = lerp(self.get(x0, y1, z0), self.get(x1, y1, z0), t.x);
        let c01 = lerp(self.get(x0, y0, z1), self.get(x1, y0, z1), t.x);
        let c11 = lerp(self.get(x0, y1, z1), self.get(x1, y1, z1), t.x);

        lerp(lerp(c00, c10, t.y), lerp(c01, c11, t.y), t.z)
    }

    /// Applies `f` to every voxel, keeping the geometry.
    pub fn map(&self, f: impl Fn(f32) -> f32 + Sync + Send) -> Self {
        Self {
            voxels: self.voxels.par_iter().map(|&x| f(x)).collect(),
            ..self.clone()
        }
    }
}
