use std::{fs, path::Path};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// The lattice is never coarser than this many cubes along the longest axis.
pub const MIN_CELL_COUNT: u32 = 32;
/// Bisection steps used to refine each marching cubes edge crossing.
pub const ROOT_FINDING_STEPS: u32 = 5;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ReconstructionParameters {
    /// Number of marching cubes cells along the longest axis of the field
    /// bounds. Values below [`MIN_CELL_COUNT`] are raised to it.
    pub target_cell_count: u32,
    /// Target edge length used by the remesher.
    pub edge_length_multiplier: f32,
    /// Number of isotropic remeshing passes, zero disables remeshing.
    pub remesh_passes: u32,
    /// Triangle budget for decimation, zero disables decimation.
    pub reduced_triangle_count: u32,

    pub root_finding_steps: u32,
    pub smooth_speed: f32,
    pub prevent_normal_flips: bool,
    // Kept last, it can serialize as a table.
    pub convention: IntensityConvention,
}

/// How raw voxel intensities are turned into a signed field where the
/// interior is negative.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum IntensityConvention {
    /// Positive voxels are tissue and map to `-v`, everything else is `0`.
    PositiveInterior,
    /// Voxels brighter than `level` are interior, the field is `level - v`.
    Threshold { level: f32 },
}

impl ReconstructionParameters {
    pub fn load(path: &Path) -> Result<Self> {
        let file = fs::read(path)?;
        let string = String::from_utf8_lossy(&file);
        let params: Self = toml::from_str(&string)?;
        info!("Loaded reconstruction parameters from {}", path.display());
        Ok(params)
    }

    /// Cell count actually used to size the marching cubes lattice.
    pub fn effective_cell_count(&self) -> u32 {
        self.target_cell_count.max(MIN_CELL_COUNT)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_cell_count == 0 {
            bail!("target_cell_count must be at least 1");
        }

        if !self.edge_length_multiplier.is_finite() || self.edge_length_multiplier <= 0.0 {
            bail!(
                "edge_length_multiplier must be positive, got {}",
                self.edge_length_multiplier
            );
        }

        if !(self.smooth_speed > 0.0 && self.smooth_speed <= 1.0) {
            bail!("smooth_speed must be in (0, 1], got {}", self.smooth_speed);
        }

        if let IntensityConvention::Threshold { level } = self.convention {
            if !level.is_finite() {
                bail!("threshold level must be finite");
            }
        }

        Ok(())
    }
}

impl IntensityConvention {
    /// Maps a raw voxel intensity to a field value, interior negative.
    #[inline]
    pub fn apply(&self, value: f32) -> f32 {
        match self {
            IntensityConvention::PositiveInterior => {
                if value > 0.0 {
                    -value
                } else {
                    0.0
                }
            }
            IntensityConvention::Threshold { level } => level - value,
        }
    }
}

impl Default for ReconstructionParameters {
    fn default() -> Self {
        Self {
            target_cell_count: MIN_CELL_COUNT,
            edge_length_multiplier: 1.0,
            remesh_passes: 0,
            reduced_triangle_count: 0,

            root_finding_steps: ROOT_FINDING_STEPS,
            smooth_speed: 1.0,
            prevent_normal_flips: true,
            convention: IntensityConvention::PositiveInterior,
        }
    }
}

impl Default for IntensityConvention {
    fn default() -> Self {
        Self::PositiveInterior
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_interior_clamps_background() {
        let convention = IntensityConvention::PositiveInterior;
        assert_eq!(convention.apply(12.5), -12.5);
        assert_eq!(convention.apply(0.0), 0.0);
        assert_eq!(convention.apply(-40.0), 0.0);
    }

    #[test]
    fn threshold_is_signed() {
        let convention = IntensityConvention::Threshold { level: 100.0 };
        assert_eq!(convention.apply(150.0), -50.0);
        assert_eq!(convention.apply(60.0), 40.0);
    }

    #[test]
    fn cell_count_minimum_is_enforced() {
        let mut params = ReconstructionParameters {
            target_cell_count: 1,
            ..Default::default()
        };
        assert_eq!(params.effective_cell_count(), MIN_CELL_COUNT);

        params.target_cell_count = 100;
        assert_eq!(params.effective_cell_count(), 100);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let params: ReconstructionParameters =
            toml::from_str("remesh_passes = 3\nreduced_triangle_count = 5000").unwrap();

        assert_eq!(params.remesh_passes, 3);
        assert_eq!(params.reduced_triangle_count, 5000);
        assert_eq!(params.target_cell_count, MIN_CELL_COUNT);
        assert_eq!(params.root_finding_steps, ROOT_FINDING_STEPS);
        assert_eq!(params.convention, IntensityConvention::PositiveInterior);
    }

    #[test]
    fn toml_round_trip() {
        let params = ReconstructionParameters {
            convention: IntensityConvention::Threshold { level: 300.0 },
            edge_length_multiplier: 1.5,
            ..Default::default()
        };

        let string = toml::to_string(&params).unwrap();
        let parsed: ReconstructionParameters = toml::from_str(&string).unwrap();
        assert_eq!(parsed, params);
    }

    #[test]
    fn rejects_bad_edge_length() {
        let params = ReconstructionParameters {
            edge_length_multiplier: 0.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        assert!(ReconstructionParameters::default().validate().is_ok());
    }
}
