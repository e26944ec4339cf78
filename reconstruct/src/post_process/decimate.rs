use std::{cmp::Reverse, collections::BinaryHeap, time::Instant};

use common::config::ReconstructionParameters;
use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};
use ordered_float::OrderedFloat;
use tracing::{debug, info};

use super::edit_mesh::EditMesh;
use crate::{mesh::Mesh, Pos};

/// Greedy edge collapse decimation driven by Garland and Heckbert's quadric
/// error metric.
pub struct Decimator {
    /// Zero disables decimation.
    pub target_triangles: usize,
    pub prevent_normal_flips: bool,
}

/// Heap entry, ordered by cost then by the edge's vertex ids. The versions
/// of both vertices at push time detect stale entries.
type Candidate = Reverse<(OrderedFloat<f64>, u32, u32, u32, u32)>;

impl Decimator {
    pub fn from_parameters(params: &ReconstructionParameters) -> Self {
        Self {
            target_triangles: params.reduced_triangle_count as usize,
            prevent_normal_flips: params.prevent_normal_flips,
        }
    }

    pub fn post_process(&self, mesh: &mut Mesh) {
        let target = self.target_triangles.min(mesh.face_count());
        if self.target_triangles == 0 || mesh.face_count() <= target {
            return;
        }

        let start = Instant::now();
        let initial = mesh.face_count();
        let mut edit = EditMesh::from_mesh(mesh);

        let mut quadrics = vec![Matrix4::<f64>::zeros(); mesh.vertex_count()];
        for face in mesh.faces() {
            let quadric = face_quadric(face.map(|x| mesh.vertices()[x as usize]));
            for &vertex in face {
                quadrics[vertex as usize] += quadric;
            }
        }

        let mut versions = vec![0_u32; mesh.vertex_count()];
        let mut heap = BinaryHeap::<Candidate>::new();
        for (a, b) in edit.edges() {
            push_candidate(&mut heap, &edit, &quadrics, &versions, a, b);
        }

        let mut skipped = 0;
        while edit.face_count() > target {
            let Some(Reverse((_, a, b, version_a, version_b))) = heap.pop() else {
                break;
            };

            let stale = versions[a as usize] != version_a || versions[b as usize] != version_b;
            if stale || !edit.is_alive(a) || !edit.is_alive(b) || edit.is_fixed_edge(a, b) {
                continue;
            }

            let quadric = quadrics[a as usize] + quadrics[b as usize];
            let (_, position) = optimal_placement(&quadric, edit.position(a), edit.position(b));
            if !edit.can_collapse(a, b, position, None, self.prevent_normal_flips) {
                skipped += 1;
                continue;
            }

            edit.collapse_edge(a, b, position);
            quadrics[a as usize] = quadric;
            versions[a as usize] += 1;
            versions[b as usize] += 1;

            for neighbor in edit.neighbors(a) {
                let (x, y) = (a.min(neighbor), a.max(neighbor));
                push_candidate(&mut heap, &edit, &quadrics, &versions, x, y);
            }
        }

        *mesh = edit.into_mesh();
        debug!("Skipped {skipped} invalid collapses");
        info!(
            "Decimated {} faces to {} (target {}) in {:?}",
            initial,
            mesh.face_count(),
            target,
            start.elapsed()
        );
    }
}

fn push_candidate(
    heap: &mut BinaryHeap<Candidate>,
    edit: &EditMesh,
    quadrics: &[Matrix4<f64>],
    versions: &[u32],
    a: u32,
    b: u32,
) {
    if edit.is_fixed_edge(a, b) {
        return;
    }

    let quadric = quadrics[a as usize] + quadrics[b as usize];
    let (cost, _) = optimal_placement(&quadric, edit.position(a), edit.position(b));
    heap.push(Reverse((
        OrderedFloat(cost),
        a,
        b,
        versions[a as usize],
        versions[b as usize],
    )));
}

/// Fundamental error quadric of a face's plane, weighted by its area.
fn face_quadric([v0, v1, v2]: [Pos; 3]) -> Matrix4<f64> {
    let [v0, v1, v2] = [v0, v1, v2].map(|v| v.cast::<f64>());
    let cross = (v1 - v0).cross(&(v2 - v0));
    let area = cross.magnitude() / 2.0;
    let Some(normal) = cross.try_normalize(f64::EPSILON) else {
        return Matrix4::zeros();
    };

    let plane = Vector4::new(normal.x, normal.y, normal.z, -normal.dot(&v0));
    plane * plane.transpose() * area
}

fn quadric_error(quadric: &Matrix4<f64>, position: Vector3<f64>) -> f64 {
    let point = position.push(1.0);
    (point.transpose() * quadric * point)[0].max(0.0)
}

/// Position minimizing the quadric, falling back to the best of the edge's
/// endpoints and midpoint when the system is singular or its solution lands
/// further from the edge than the edge is long.
fn optimal_placement(quadric: &Matrix4<f64>, a: Pos, b: Pos) -> (f64, Pos) {
    let system: Matrix3<f64> = quadric.fixed_view::<3, 3>(0, 0).into_owned();
    let rhs = -quadric.fixed_view::<3, 1>(0, 3).into_owned();

    let (a64, b64) = (a.cast::<f64>(), b.cast::<f64>());
    let reach = (a64 - b64).magnitude_squared();
    if system.determinant().abs() > 1e-10 {
        if let Some(inverse) = system.try_inverse() {
            let position = inverse * rhs;
            let near = (position - (a64 + b64) / 2.0).magnitude_squared() <= reach;
            if near && position.iter().all(|x| x.is_finite()) {
                return (quadric_error(quadric, position), position.cast::<f32>());
            }
        }
    }

    [a, b, (a + b) / 2.0]
        .into_iter()
        .map(|x| (quadric_error(quadric, x.cast::<f64>()), x))
        .min_by_key(|(cost, _)| OrderedFloat(*cost))
        .unwrap_or((0.0, a))
}
