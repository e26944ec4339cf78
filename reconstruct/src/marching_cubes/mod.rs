//! Isosurface extraction with marching cubes. Edge crossings are refined by
//! bisection on the field instead of linear interpolation between corners.

use itertools::iproduct;
use nalgebra::Vector3;
use rayon::prelude::*;
use tracing::debug;

use crate::{builder::MeshBuilder, field::ScalarField, geometry::BoundingBox, mesh::Mesh, Pos};
use tables::{CORNERS, EDGES, TRIANGLES};

mod tables;

/// The lattice extends this many cubes past the field bounds on every side
/// so surfaces touching the bounds are still closed.
pub const BOUNDS_PADDING_CELLS: f32 = 3.0;

pub struct MarchingCubes {
    cube_size: f32,
    root_finding_steps: u32,
}

/// Corner values of the whole lattice, sampled once and shared by
/// neighbouring cubes.
struct Lattice {
    origin: Pos,
    cube_size: f32,
    /// Corner count along each axis, one more than the cube count.
    size: Vector3<usize>,
    values: Vec<f32>,
}

impl MarchingCubes {
    pub fn new(cube_size: f32, root_finding_steps: u32) -> Self {
        Self {
            cube_size,
            root_finding_steps,
        }
    }

    /// Polygonizes the zero level set of `field` within `bounds`. Degenerate
    /// bounds or cube sizes give an empty mesh.
    pub fn extract(&self, field: &dyn ScalarField, bounds: BoundingBox) -> Mesh {
        let size = self.cube_size;
        if bounds.is_degenerate() || !size.is_finite() || size <= 0.0 {
            debug!("Skipping extraction over degenerate bounds {bounds:?}, cube size {size}");
            return Mesh::default();
        }

        let lattice = Lattice::sample(field, bounds.padded(BOUNDS_PADDING_CELLS * size), size);
        let cubes = lattice.size.map(|x| x - 1);
        debug!("Sampled {}x{}x{} marching cubes lattice", cubes.x, cubes.y, cubes.z);

        let mut builder = MeshBuilder::<(u64, u64)>::new();
        for (z, y, x) in iproduct!(0..cubes.z, 0..cubes.y, 0..cubes.x) {
            let corners = CORNERS.map(|[dx, dy, dz]| lattice.id(x + dx, y + dy, z + dz));

            let case = (0..8)
                .filter(|&i| lattice.values[corners[i]] < 0.0)
                .fold(0, |acc, i| acc | (1 << i));

            for triangle in TRIANGLES[case].chunks_exact(3) {
                if triangle[0] < 0 {
                    break;
                }

                let face = [0, 1, 2].map(|i| {
                    let [a, b] = EDGES[triangle[i] as usize].map(|x| corners[x]);
                    let key = (a.min(b) as u64, a.max(b) as u64);
                    builder.welded_vertex(key, || self.find_root(field, &lattice, a, b))
                });
                builder.add_face(face);
            }
        }

        builder.build()
    }

    /// Bisects the lattice edge between two corners, one inside and one
    /// outside, returning the middle of the final bracket.
    fn find_root(&self, field: &dyn ScalarField, lattice: &Lattice, a: usize, b: usize) -> Pos {
        let (mut inside, mut outside) = (lattice.position(a), lattice.position(b));
        if lattice.values[a] >= 0.0 {
            std::mem::swap(&mut inside, &mut outside);
        }

        for _ in 0..self.root_finding_steps {
            let mid = (inside + outside) / 2.0;
            if field.value(mid) < 0.0 {
                inside = mid;
            } else {
                outside = mid;
            }
        }

        (inside + outside) / 2.0
    }
}

impl Lattice {
    fn sample(field: &dyn ScalarField, bounds: BoundingBox, cube_size: f32) -> Self {
        let cubes = bounds.extent().map(|x| ((x / cube_size).ceil() as usize).max(1));
        let size = cubes.add_scalar(1);
        let origin = bounds.min();

        let mut values = vec![0.0; size.x * size.y * size.z];
        values
            .par_chunks_mut(size.x * size.y)
            .enumerate()
            .for_each(|(z, layer)| {
                for (y, x) in iproduct!(0..size.y, 0..size.x) {
                    let pos = origin + Pos::new(x as f32, y as f32, z as f32) * cube_size;
                    layer[x + y * size.x] = field.value(pos);
                }
            });

        Self {
            origin,
            cube_size,
            size,
            values,
        }
    }

    fn id(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.size.x * (y + self.size.y * z)
    }

    fn position(&self, id: usize) -> Pos {
        let x = id % self.size.x;
        let y = (id / self.size.x) % self.size.y;
        let z = id / (self.size.x * self.size.y);
        self.origin + Pos::new(x as f32, y as f32, z as f32) * self.cube_size
    }
}
