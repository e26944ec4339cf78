use std::collections::HashMap;

use crate::{mesh::Mesh, Pos};

/// Incrementally builds an indexed mesh. Vertices created for a key (like the
/// lattice edge they lie on) are shared between every face that asks for the
/// same key.
pub struct MeshBuilder<K = (u64, u64)> {
    vertices: Vec<Pos>,
    faces: Vec<[u32; 3]>,
    welded: HashMap<K, u32>,
}

impl<K: Eq + std::hash::Hash> MeshBuilder<K> {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            welded: HashMap::new(),
        }
    }

    pub fn add_vertex(&mut self, vertex: Pos) -> u32 {
        self.vertices.push(vertex);
        (self.vertices.len() - 1) as u32
    }

    /// Returns the vertex already created for `key`, or adds the one produced
    /// by `vertex`.
    pub fn welded_vertex(&mut self, key: K, vertex: impl FnOnce() -> Pos) -> u32 {
        if let Some(&idx) = self.welded.get(&key) {
            return idx;
        }

        let idx = self.add_vertex(vertex());
        self.welded.insert(key, idx);
        idx
    }

    /// Adds a face, dropping it if two of its corners are the same vertex.
    pub fn add_face(&mut self, face: [u32; 3]) {
        let [a, b, c] = face;
        if a != b && b != c && c != a {
            self.faces.push(face);
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn build(self) -> Mesh {
        Mesh::new(self.vertices, self.faces)
    }
}

impl MeshBuilder {
    /// Builds a sphere by repeatedly subdividing an icosahedron and pushing
    /// the new vertices out to the radius. Each subdivision quadruples the
    /// face count, starting from 20.
    pub fn icosphere(center: Pos, radius: f32, subdivisions: u32) -> Mesh {
        let t = (1.0 + 5_f32.sqrt()) / 2.0;
        let mut vertices = [
            (-1.0, t, 0.0),
            (1.0, t, 0.0),
            (-1.0, -t, 0.0),
            (1.0, -t, 0.0),
            (0.0, -1.0, t),
            (0.0, 1.0, t),
            (0.0, -1.0, -t),
            (0.0, 1.0, -t),
            (t, 0.0, -1.0),
            (t, 0.0, 1.0),
            (-t, 0.0, -1.0),
            (-t, 0.0, 1.0),
        ]
        .map(|(x, y, z)| Pos::new(x, y, z).normalize())
        .to_vec();

        let mut faces = vec![
            [0, 11, 5],
            [0, 5, 1],
            [0, 1, 7],
            [0, 7, 10],
            [0, 10, 11],
            [1, 5, 9],
            [5, 11, 4],
            [11, 10, 2],
            [10, 7, 6],
            [7, 1, 8],
            [3, 9, 4],
            [3, 4, 2],
            [3, 2, 6],
            [3, 6, 8],
            [3, 8, 9],
            [4, 9, 5],
            [2, 4, 11],
            [6, 2, 10],
            [8, 6, 7],
            [9, 8, 1],
        ];

        for _ in 0..subdivisions {
            let mut midpoints = HashMap::new();
            let mut midpoint = |a: u32, b: u32, vertices: &mut Vec<Pos>| {
                *midpoints.entry((a.min(b), a.max(b))).or_insert_with(|| {
                    let mid = (vertices[a as usize] + vertices[b as usize]).normalize();
                    vertices.push(mid);
                    (vertices.len() - 1) as u32
                })
            };

            let mut next = Vec::with_capacity(faces.len() * 4);
            for [a, b, c] in faces {
                let ab = midpoint(a, b, &mut vertices);
                let bc = midpoint(b, c, &mut vertices);
                let ca = midpoint(c, a, &mut vertices);

                next.extend([[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
            }
            faces = next;
        }

        vertices.iter_mut().for_each(|v| *v = center + *v * radius);
        Mesh::new(vertices, faces)
    }
}

impl<K: Eq + std::hash::Hash> Default for MeshBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}
