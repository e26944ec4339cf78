use std::{
    panic::{self, AssertUnwindSafe},
    time::Instant,
};

use common::{config::ReconstructionParameters, progress::Progress};
use tracing::{info, warn};

use crate::{
    error::ReconstructError,
    field::{ScalarField, VolumeField},
    marching_cubes::MarchingCubes,
    mesh::Mesh,
    post_process::MeshPostProcessor,
    resample::resample,
    volume::Volume,
    Pos, Result,
};

/// Steps of a reconstruction, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resample,
    Field,
    Extract,
    Center,
    Remesh,
    Decimate,
    Finish,
    Done,
}

/// Runs the whole volume to mesh pipeline with one set of parameters.
pub struct Reconstructor {
    params: ReconstructionParameters,
    progress: Progress,
}

impl Stage {
    pub fn fraction(&self) -> f32 {
        match self {
            Stage::Resample => 0.15,
            Stage::Field => 0.35,
            Stage::Extract => 0.55,
            Stage::Center => 0.70,
            Stage::Remesh => 0.78,
            Stage::Decimate => 0.88,
            Stage::Finish => 0.95,
            Stage::Done => 1.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Resample => "Resampling volume to 1x1x1 spacing...",
            Stage::Field => "Filling grid...",
            Stage::Extract => "Running Marching Cubes...",
            Stage::Center => "Centering mesh...",
            Stage::Remesh => "Smoothing / remeshing...",
            Stage::Decimate => "Decimating mesh...",
            Stage::Finish => "Flipping coordinate system...",
            Stage::Done => "Done",
        }
    }
}

impl Reconstructor {
    pub fn new(params: ReconstructionParameters) -> Self {
        Self {
            params,
            progress: Progress::new(),
        }
    }

    pub fn params(&self) -> &ReconstructionParameters {
        &self.params
    }

    /// Handle that mirrors the current stage and can cancel the run from
    /// another thread.
    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    pub fn reconstruct(&self, volume: &Volume) -> Result<Mesh> {
        self.reconstruct_with(volume, |_, _| {})
    }

    /// Like [`Reconstructor::reconstruct`], calling `on_progress` with the
    /// fraction and label of every stage as it starts. Panics in the
    /// callback are logged and ignored.
    ///
    /// The progress handle starts over on every call. A cancel requested
    /// while idle stops the next run.
    pub fn reconstruct_with(
        &self,
        volume: &Volume,
        on_progress: impl FnMut(f32, &str),
    ) -> Result<Mesh> {
        self.progress.reset();
        let result = self.run(volume, on_progress);
        self.progress.set_finished();
        // A cancel only stops the run it interrupted.
        if matches!(result, Err(ReconstructError::Cancelled)) {
            self.progress.clear_cancelled();
        }
        result
    }

    fn run(&self, volume: &Volume, mut on_progress: impl FnMut(f32, &str)) -> Result<Mesh> {
        self.params
            .validate()
            .map_err(|err| ReconstructError::InvalidParameters {
                reason: err.to_string(),
            })?;

        let start = Instant::now();
        let mut enter = |stage: Stage| -> Result<()> {
            if self.progress.is_cancelled() {
                info!("Reconstruction cancelled before {stage:?}");
                return Err(ReconstructError::Cancelled);
            }

            let (fraction, label) = (stage.fraction(), stage.label());
            self.progress.set_stage(fraction, label);
            let call = panic::catch_unwind(AssertUnwindSafe(|| on_progress(fraction, label)));
            if call.is_err() {
                warn!("Progress callback panicked during {stage:?}, ignoring");
            }

            Ok(())
        };

        enter(Stage::Resample)?;
        // Checked before the intensity mapping, which can hide NaN.
        if let Some(index) = volume.first_non_finite() {
            return Err(ReconstructError::DegenerateField {
                reason: format!("voxel {index} is not finite"),
            });
        }
        let volume = resample(volume, Pos::repeat(1.0))?;

        enter(Stage::Field)?;
        let field = VolumeField::new(&volume, self.params.convention, Pos::zeros());
        let bounds = field.bounds();
        if !bounds.is_finite() {
            return Err(ReconstructError::DegenerateField {
                reason: format!("field bounds are not finite: {bounds:?}"),
            });
        }

        if !field.has_interior() {
            warn!("Volume has no interior voxels, nothing to reconstruct");
            enter(Stage::Done)?;
            return Ok(Mesh::default());
        }

        enter(Stage::Extract)?;
        let extract_start = Instant::now();
        let cube_size = bounds.max_dim() / self.params.effective_cell_count() as f32;
        let mut mesh = MarchingCubes::new(cube_size, self.params.root_finding_steps)
            .extract(&field, bounds);
        info!(
            "Extracted {} vertices and {} faces with cube size {:.3} in {:?}",
            mesh.vertex_count(),
            mesh.face_count(),
            cube_size,
            extract_start.elapsed()
        );

        MeshPostProcessor::new(&self.params, volume.dimensions()).run(&mut mesh, &mut enter)?;

        enter(Stage::Done)?;
        info!("Reconstruction finished in {:?}", start.elapsed());
        Ok(mesh)
    }
}

/// Reconstructs the surface of `volume`, reporting each stage to
/// `on_progress` when one is given.
pub fn reconstruct(
    volume: &Volume,
    params: &ReconstructionParameters,
    on_progress: Option<&mut dyn FnMut(f32, &str)>,
) -> Result<Mesh> {
    let reconstructor = Reconstructor::new(params.clone());
    match on_progress {
        Some(callback) => reconstructor.reconstruct_with(volume, callback),
        None => reconstructor.reconstruct(volume),
    }
}

#[cfg(test)]
mod tests {
    use common::config::ReconstructionParameters;
    use nalgebra::Vector3;

    use super::{reconstruct, Reconstructor, Stage};
    use crate::{error::ReconstructError, volume::Volume, Pos};

    fn ball(n: usize, radius: f32) -> Volume {
        let center = Pos::repeat(n as f32 / 2.0);
        Volume::from_fn(Vector3::repeat(n), Pos::repeat(1.0), |i, j, k| {
            radius - (Pos::new(i as f32, j as f32, k as f32) - center).magnitude()
        })
        .unwrap()
    }

    #[test]
    fn stage_fractions_increase() {
        let stages = [
            Stage::Resample,
            Stage::Field,
            Stage::Extract,
            Stage::Center,
            Stage::Remesh,
            Stage::Decimate,
            Stage::Finish,
            Stage::Done,
        ];

        for pair in stages.windows(2) {
            assert!(pair[0].fraction() < pair[1].fraction());
        }
        assert_eq!(Stage::Done.fraction(), 1.0);
    }

    #[test]
    fn reports_every_stage() {
        let mut seen = Vec::new();
        let mut callback = |fraction: f32, label: &str| seen.push((fraction, label.to_owned()));
        let mesh = reconstruct(
            &ball(16, 5.0),
            &ReconstructionParameters::default(),
            Some(&mut callback),
        )
        .unwrap();

        assert!(mesh.face_count() > 0);
        assert!(seen.windows(2).all(|x| x[0].0 <= x[1].0));
        assert_eq!(seen.first().unwrap().1, Stage::Resample.label());
        assert_eq!(seen.last().unwrap().0, 1.0);
        assert!(seen.iter().all(|(_, label)| label != Stage::Remesh.label()));
    }

    #[test]
    fn rejects_invalid_parameters() {
        let params = ReconstructionParameters {
            edge_length_multiplier: -1.0,
            ..Default::default()
        };

        let result = reconstruct(&ball(8, 2.0), &params, None);
        assert!(matches!(result, Err(ReconstructError::InvalidParameters { .. })));
    }

    #[test]
    fn non_finite_voxels_are_degenerate() {
        let mut voxels = vec![1.0; 64];
        voxels[21] = f32::NAN;
        let volume = Volume::new(Vector3::repeat(4), Pos::repeat(1.0), voxels).unwrap();

        let result = reconstruct(&volume, &ReconstructionParameters::default(), None);
        assert!(matches!(result, Err(ReconstructError::DegenerateField { .. })));

        // Background clamping would turn this into zero.
        let mut voxels = vec![0.0; 64];
        voxels[7] = f32::NEG_INFINITY;
        let volume = Volume::new(Vector3::repeat(4), Pos::new(1.0, 1.0, 2.0), voxels).unwrap();
        let result = reconstruct(&volume, &ReconstructionParameters::default(), None);
        assert!(matches!(result, Err(ReconstructError::DegenerateField { .. })));
    }

    #[test]
    fn cancelled_before_start() {
        let reconstructor = Reconstructor::new(ReconstructionParameters::default());
        let progress = reconstructor.progress();
        progress.cancel();

        let result = reconstructor.reconstruct(&ball(8, 2.0));
        assert!(matches!(result, Err(ReconstructError::Cancelled)));
        assert!(progress.complete());
    }

    #[test]
    fn cancelled_mid_run() {
        let reconstructor = Reconstructor::new(ReconstructionParameters::default());
        let progress = reconstructor.progress();

        let result = reconstructor.reconstruct_with(&ball(16, 5.0), |_, label| {
            if label == Stage::Extract.label() {
                progress.cancel();
            }
        });
        assert!(matches!(result, Err(ReconstructError::Cancelled)));
        assert_eq!(progress.label(), Stage::Extract.label());
    }

    #[test]
    fn reusable_after_cancel() {
        let reconstructor = Reconstructor::new(ReconstructionParameters::default());
        let progress = reconstructor.progress();
        progress.cancel();

        let result = reconstructor.reconstruct(&ball(8, 2.0));
        assert!(matches!(result, Err(ReconstructError::Cancelled)));
        assert!(!progress.is_cancelled());

        let mesh = reconstructor.reconstruct(&ball(12, 4.0)).unwrap();
        assert!(mesh.face_count() > 0);
    }

    #[test]
    fn progress_restarts_every_run() {
        let reconstructor = Reconstructor::new(ReconstructionParameters::default());
        let progress = reconstructor.progress();
        reconstructor.reconstruct(&ball(12, 4.0)).unwrap();
        assert!(progress.complete());

        let mut seen = Vec::new();
        reconstructor
            .reconstruct_with(&ball(12, 4.0), |fraction, _| {
                seen.push((fraction, progress.progress(), progress.complete()))
            })
            .unwrap();

        let first = Stage::Resample.fraction();
        assert_eq!(seen.first(), Some(&(first, first, false)));
        assert!(seen.iter().all(|&(fraction, shown, done)| fraction == shown && !done));
        assert!(progress.complete());
    }

    #[test]
    fn progress_handle_tracks_stages() {
        let reconstructor = Reconstructor::new(ReconstructionParameters::default());
        let progress = reconstructor.progress();
        reconstructor.reconstruct(&ball(12, 4.0)).unwrap();

        assert_eq!(progress.progress(), 1.0);
        assert_eq!(progress.label(), Stage::Done.label());
        assert!(progress.complete());
    }
}
