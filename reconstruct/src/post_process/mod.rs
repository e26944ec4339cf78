//! Cleanup applied to the raw marching cubes surface, in order: normals,
//! recentering, remeshing, decimation, the handedness flip and final normals.

use std::time::Instant;

use common::config::ReconstructionParameters;
use nalgebra::Vector3;
use tracing::info;

use crate::{mesh::Mesh, pipeline::Stage, Result};

pub mod decimate;
pub mod edit_mesh;
pub mod remesh;

pub use decimate::Decimator;
pub use remesh::Remesher;

pub struct MeshPostProcessor {
    pub remesher: Remesher,
    pub decimator: Decimator,
    /// Voxel dimensions of the grid the mesh was extracted from.
    pub grid_dimensions: Vector3<usize>,
}

impl MeshPostProcessor {
    pub fn new(params: &ReconstructionParameters, grid_dimensions: Vector3<usize>) -> Self {
        Self {
            remesher: Remesher::from_parameters(params),
            decimator: Decimator::from_parameters(params),
            grid_dimensions,
        }
    }

    /// Runs every stage on the mesh. `on_stage` is called before each stage
    /// and can abort the run by returning an error.
    pub fn run(
        &self,
        mesh: &mut Mesh,
        mut on_stage: impl FnMut(Stage) -> Result<()>,
    ) -> Result<()> {
        mesh.compute_normals();

        on_stage(Stage::Center)?;
        recenter(mesh, self.grid_dimensions);

        if self.remesher.passes > 0 {
            on_stage(Stage::Remesh)?;
            self.remesher.post_process(mesh);
        }

        if self.decimator.target_triangles > 0 {
            on_stage(Stage::Decimate)?;
            self.decimator.post_process(mesh);
        }

        on_stage(Stage::Finish)?;
        let start = Instant::now();
        mesh.flip_handedness();
        mesh.compute_normals();
        info!(
            "Finished mesh with {} vertices and {} faces in {:?}",
            mesh.vertex_count(),
            mesh.face_count(),
            start.elapsed()
        );

        Ok(())
    }
}

/// Moves the mesh so the middle of the voxel grid sits at the origin.
pub fn recenter(mesh: &mut Mesh, grid_dimensions: Vector3<usize>) {
    let offset = -grid_dimensions.cast::<f32>() / 2.0;
    mesh.translate(offset);
    info!(
        "Centered mesh on the grid by ({:.1}, {:.1}, {:.1})",
        offset.x, offset.y, offset.z
    );
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use common::config::ReconstructionParameters;
    use nalgebra::Vector3;

    use super::{recenter, MeshPostProcessor};
    use crate::{builder::MeshBuilder, error::ReconstructError, pipeline::Stage, Pos};

    #[test]
    fn recenter_moves_grid_center_to_origin() {
        let mut mesh = MeshBuilder::icosphere(Pos::new(32.0, 32.0, 20.0), 5.0, 2);
        recenter(&mut mesh, Vector3::new(64, 64, 40));
        assert_relative_eq!(mesh.centroid(), Pos::zeros(), epsilon = 1e-4);
    }

    #[test]
    fn default_stages() {
        let mut mesh = MeshBuilder::icosphere(Pos::new(10.0, 10.0, 10.0), 5.0, 2);
        let faces = mesh.face_count();

        let params = ReconstructionParameters::default();
        let processor = MeshPostProcessor::new(&params, Vector3::new(20, 20, 20));

        let mut stages = Vec::new();
        processor
            .run(&mut mesh, |stage| {
                stages.push(stage);
                Ok(())
            })
            .unwrap();

        assert_eq!(stages, [Stage::Center, Stage::Finish]);
        assert_eq!(mesh.face_count(), faces);
        assert_relative_eq!(mesh.centroid(), Pos::zeros(), epsilon = 1e-4);
        assert!(mesh.volume() > 0.0);

        let normals = mesh.normals().unwrap();
        for (vertex, normal) in mesh.vertices().iter().zip(normals) {
            assert!(normal.dot(&vertex.normalize()) > 0.9);
        }
    }

    #[test]
    fn every_stage_runs() {
        let mut mesh = MeshBuilder::icosphere(Pos::new(10.0, 10.0, 10.0), 8.0, 3);
        let params = ReconstructionParameters {
            remesh_passes: 1,
            edge_length_multiplier: 1.5,
            reduced_triangle_count: 500,
            ..Default::default()
        };
        let processor = MeshPostProcessor::new(&params, Vector3::new(20, 20, 20));

        let mut stages = Vec::new();
        processor
            .run(&mut mesh, |stage| {
                stages.push(stage);
                Ok(())
            })
            .unwrap();

        assert_eq!(
            stages,
            [Stage::Center, Stage::Remesh, Stage::Decimate, Stage::Finish]
        );
        assert!(mesh.face_count() <= 500);
        assert!(mesh.is_valid());
    }

    #[test]
    fn stage_callback_aborts() {
        let mut mesh = MeshBuilder::icosphere(Pos::zeros(), 1.0, 1);
        let before = mesh.vertices().to_vec();
        let processor =
            MeshPostProcessor::new(&ReconstructionParameters::default(), Vector3::new(2, 2, 2));

        let result = processor.run(&mut mesh, |_| Err(ReconstructError::Cancelled));
        assert!(matches!(result, Err(ReconstructError::Cancelled)));
        assert_eq!(mesh.vertices(), &before[..]);
    }

    #[test]
    fn empty_mesh_is_noop() {
        let mut mesh = crate::mesh::Mesh::default();
        let params = ReconstructionParameters {
            remesh_passes: 2,
            reduced_triangle_count: 10,
            ..Default::default()
        };

        MeshPostProcessor::new(&params, Vector3::new(4, 4, 4))
            .run(&mut mesh, |_| Ok(()))
            .unwrap();
        assert!(mesh.is_empty());
    }
}
