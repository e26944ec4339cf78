use std::time::Instant;

use common::config::ReconstructionParameters;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use tracing::{debug, info};

use super::edit_mesh::EditMesh;
use crate::{geometry::bvh::Bvh, mesh::Mesh, Pos};

/// Isotropic remeshing in the style of Botsch and Kobbelt. Each pass splits
/// long edges, collapses short ones, flips edges toward valence six and
/// then relaxes the vertices, projecting them back onto the input surface.
pub struct Remesher {
    pub passes: u32,
    pub target_edge_length: f32,
    pub smooth_speed: f32,
    pub prevent_normal_flips: bool,
}

#[derive(Default, Debug)]
struct PassStats {
    splits: usize,
    collapses: usize,
    flips: usize,
}

impl Remesher {
    pub fn from_parameters(params: &ReconstructionParameters) -> Self {
        Self {
            passes: params.remesh_passes,
            target_edge_length: params.edge_length_multiplier,
            smooth_speed: params.smooth_speed,
            prevent_normal_flips: params.prevent_normal_flips,
        }
    }

    pub fn post_process(&self, mesh: &mut Mesh) {
        if self.passes == 0 || mesh.is_empty() {
            return;
        }

        let start = Instant::now();
        let reference = mesh.clone();
        let bvh = Bvh::build(&reference);

        let high = self.target_edge_length * 4.0 / 3.0;
        let low = self.target_edge_length * 4.0 / 5.0;

        let mut edit = EditMesh::from_mesh(mesh);
        for pass in 0..self.passes {
            let mut stats = PassStats::default();
            self.split_long_edges(&mut edit, high, &mut stats);
            self.collapse_short_edges(&mut edit, low, high, &mut stats);
            self.equalize_valences(&mut edit, &mut stats);
            self.smooth(&mut edit, |point| {
                bvh.closest(&reference, point)
                    .map(|hit| hit.position)
                    .unwrap_or(point)
            });
            debug!("Remesh pass {pass}: {stats:?}, {} faces", edit.face_count());
        }

        *mesh = edit.into_mesh();
        info!(
            "Remeshed to {} faces with {} passes in {:?}",
            mesh.face_count(),
            self.passes,
            start.elapsed()
        );
    }

    fn split_long_edges(&self, edit: &mut EditMesh, high: f32, stats: &mut PassStats) {
        let max = high * high;
        for (a, b) in edit.edges() {
            if edit.edge_faces(a, b).len() == 2 && edit.length_squared(a, b) > max {
                edit.split_edge(a, b);
                stats.splits += 1;
            }
        }
    }

    fn collapse_short_edges(
        &self,
        edit: &mut EditMesh,
        low: f32,
        high: f32,
        stats: &mut PassStats,
    ) {
        let (min, max) = (low * low, high * high);

        let mut edges = edit
            .edges()
            .into_iter()
            .map(|(a, b)| (OrderedFloat(edit.length_squared(a, b)), a, b))
            .filter(|(length, ..)| length.0 < min)
            .collect::<Vec<_>>();
        edges.sort_unstable();

        for (_, a, b) in edges {
            if !edit.is_alive(a) || !edit.is_alive(b) || edit.is_fixed_edge(a, b) {
                continue;
            }

            if edit.length_squared(a, b) >= min {
                continue;
            }

            let position = (edit.position(a) + edit.position(b)) / 2.0;
            if edit.can_collapse(a, b, position, Some(max), self.prevent_normal_flips) {
                edit.collapse_edge(a, b, position);
                stats.collapses += 1;
            }
        }
    }

    fn equalize_valences(&self, edit: &mut EditMesh, stats: &mut PassStats) {
        let target = |edit: &EditMesh, v: u32| if edit.is_fixed(v) { 4 } else { 6 };
        let deviation = |edit: &EditMesh, v: u32, change: i32| {
            (edit.valence(v) as i32 + change - target(edit, v)).abs()
        };

        for (a, b) in edit.edges() {
            if edit.is_fixed_edge(a, b) {
                continue;
            }

            let faces = edit.edge_faces(a, b);
            let [c, d] = [faces[0], faces[1]].map(|f| {
                let face = edit.face(f);
                face.into_iter().find(|&v| v != a && v != b).unwrap_or(a)
            });
            if c == d || c == a || d == a {
                continue;
            }

            let before = deviation(edit, a, 0)
                + deviation(edit, b, 0)
                + deviation(edit, c, 0)
                + deviation(edit, d, 0);
            let after = deviation(edit, a, -1)
                + deviation(edit, b, -1)
                + deviation(edit, c, 1)
                + deviation(edit, d, 1);

            if after < before && edit.flip_edge(a, b) {
                stats.flips += 1;
            }
        }
    }

    /// Moves every free vertex toward the centroid of its neighbours, then
    /// onto the reference surface with `project`.
    fn smooth(&self, edit: &mut EditMesh, project: impl Fn(Pos) -> Pos + Sync) {
        let mesh = &*edit;
        let vertices = mesh
            .vertices()
            .filter(|&v| !mesh.is_fixed(v))
            .collect::<Vec<_>>();

        let updates = vertices
            .par_iter()
            .map(|&vertex| {
                let ring = mesh.neighbors(vertex);
                let position = mesh.position(vertex);
                if ring.is_empty() {
                    return (vertex, position);
                }

                let sum = ring.iter().map(|&v| mesh.position(v)).sum::<Pos>();
                let centroid = sum / ring.len() as f32;
                let smoothed = position + (centroid - position) * self.smooth_speed;
                (vertex, project(smoothed))
            })
            .collect::<Vec<_>>();

        for (vertex, position) in updates {
            edit.set_position(vertex, position);
        }
    }
}
