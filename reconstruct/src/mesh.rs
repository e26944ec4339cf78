use std::collections::HashMap;

use mesh_format::MeshRef;

use crate::Pos;

/// A mesh made of vertices and triangular faces, with optional per vertex
/// normals. Faces are wound counter-clockwise when seen from outside.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    vertices: Vec<Pos>,
    faces: Vec<[u32; 3]>,
    normals: Option<Vec<Pos>>,
}

impl Mesh {
    pub fn new(vertices: Vec<Pos>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            faces,
            normals: None,
        }
    }

    pub fn vertices(&self) -> &[Pos] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    pub fn face(&self, index: usize) -> &[u32; 3] {
        &self.faces[index]
    }

    /// Per vertex normals, if they have been computed since the last
    /// topology change.
    pub fn normals(&self) -> Option<&[Pos]> {
        self.normals.as_deref()
    }

    pub fn face_verts(&self, index: usize) -> [Pos; 3] {
        self.faces[index].map(|x| self.vertices[x as usize])
    }

    /// Unit normal of a face, following the counter-clockwise winding. Zero
    /// area faces give the zero vector.
    pub fn face_normal(&self, index: usize) -> Pos {
        let [v0, v1, v2] = self.face_verts(index);
        (v1 - v0)
            .cross(&(v2 - v0))
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Pos::zeros)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Checks that every face references three distinct existing vertices
    /// and that all positions are finite.
    pub fn is_valid(&self) -> bool {
        let count = self.vertices.len() as u32;
        let faces = self.faces.iter().all(|&[a, b, c]| {
            a < count && b < count && c < count && a != b && b != c && c != a
        });
        let positions = self.vertices.iter().all(|v| v.iter().all(|x| x.is_finite()));
        let normals = (self.normals.as_ref()).map_or(true, |n| n.len() == self.vertices.len());

        faces && positions && normals
    }

    /// True if every edge is shared by exactly two faces.
    pub fn is_manifold(&self) -> bool {
        let mut edges = HashMap::<_, u8>::new();

        for &[a, b, c] in self.faces() {
            for (a, b) in [(a, b), (b, c), (c, a)] {
                *edges.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }

        edges.values().all(|&count| count == 2)
    }

    /// Mean of all vertex positions.
    pub fn centroid(&self) -> Pos {
        if self.vertices.is_empty() {
            return Pos::zeros();
        }

        self.vertices.iter().sum::<Pos>() / self.vertices.len() as f32
    }

    pub fn surface_area(&self) -> f32 {
        (0..self.faces.len())
            .map(|face| {
                let [v0, v1, v2] = self.face_verts(face);
                (v1 - v0).cross(&(v2 - v0)).magnitude() / 2.0
            })
            .sum()
    }

    /// Signed enclosed volume, positive for closed meshes with outward
    /// facing triangles.
    pub fn volume(&self) -> f32 {
        (0..self.faces.len())
            .map(|face| {
                let [v0, v1, v2] = self.face_verts(face);
                v0.dot(&v1.cross(&v2)) / 6.0
            })
            .sum()
    }

    pub fn translate(&mut self, offset: Pos) {
        self.vertices.iter_mut().for_each(|v| *v += offset);
    }

    /// Converts between left and right handed coordinate systems by negating
    /// z. The winding of each face is reversed so they keep facing outward.
    pub fn flip_handedness(&mut self) {
        self.vertices.iter_mut().for_each(|v| v.z = -v.z);
        if let Some(normals) = &mut self.normals {
            normals.iter_mut().for_each(|n| n.z = -n.z);
        }

        self.faces.iter_mut().for_each(|face| face.swap(1, 2));
    }

    /// Recomputes per vertex normals as the area weighted average of the
    /// incident face normals. Vertices without faces get a zero normal.
    pub fn compute_normals(&mut self) {
        let mut normals = vec![Pos::zeros(); self.vertices.len()];

        for face in self.faces.iter() {
            let [v0, v1, v2] = face.map(|x| self.vertices[x as usize]);
            // The cross product's length is twice the face area.
            let weighted = (v1 - v0).cross(&(v2 - v0));
            for &vertex in face {
                normals[vertex as usize] += weighted;
            }
        }

        normals.iter_mut().for_each(|n| {
            *n = n.try_normalize(f32::EPSILON).unwrap_or_else(Pos::zeros);
        });
        self.normals = Some(normals);
    }

    pub fn mesh_ref(&self) -> MeshRef {
        MeshRef::new(&self.vertices, &self.faces).with_normals(self.normals())
    }

    pub fn into_parts(self) -> (Vec<Pos>, Vec<[u32; 3]>) {
        (self.vertices, self.faces)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::Mesh;
    use crate::{builder::MeshBuilder, Pos};

    fn tetrahedron() -> Mesh {
        let vertices = vec![
            Pos::new(0.0, 0.0, 0.0),
            Pos::new(1.0, 0.0, 0.0),
            Pos::new(0.0, 1.0, 0.0),
            Pos::new(0.0, 0.0, 1.0),
        ];
        let faces = vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];
        Mesh::new(vertices, faces)
    }

    #[test]
    fn tetrahedron_queries() {
        let mesh = tetrahedron();
        assert!(mesh.is_valid());
        assert!(mesh.is_manifold());
        assert_relative_eq!(mesh.volume(), 1.0 / 6.0, epsilon = 1e-6);
        assert_relative_eq!(mesh.face_normal(0), Pos::new(0.0, 0.0, -1.0));
        assert_relative_eq!(mesh.centroid(), Pos::repeat(0.25));
    }

    #[test]
    fn invalid_faces() {
        let mesh = Mesh::new(vec![Pos::zeros(); 3], vec![[0, 1, 1]]);
        assert!(!mesh.is_valid());

        let mesh = Mesh::new(vec![Pos::zeros(); 3], vec![[0, 1, 3]]);
        assert!(!mesh.is_valid());
    }

    #[test]
    fn normals_point_outward() {
        let mut mesh = MeshBuilder::icosphere(Pos::zeros(), 3.0, 2);
        mesh.compute_normals();

        let normals = mesh.normals().unwrap();
        for (vertex, normal) in mesh.vertices().iter().zip(normals) {
            assert_relative_eq!(normal.magnitude(), 1.0, epsilon = 1e-5);
            assert!(normal.dot(&vertex.normalize()) > 0.95);
        }
    }

    #[test]
    fn normals_are_idempotent() {
        let mut mesh = tetrahedron();
        mesh.compute_normals();
        let first = mesh.normals().unwrap().to_vec();
        mesh.compute_normals();
        assert_eq!(first, mesh.normals().unwrap());
    }

    #[test]
    fn isolated_vertex_has_zero_normal() {
        let (mut vertices, faces) = tetrahedron().into_parts();
        vertices.push(Pos::new(5.0, 5.0, 5.0));

        let mut mesh = Mesh::new(vertices, faces);
        mesh.compute_normals();
        assert_eq!(mesh.normals().unwrap()[4], Pos::zeros());
    }

    #[test]
    fn flip_keeps_outward_orientation() {
        let mut mesh = MeshBuilder::icosphere(Pos::new(0.0, 0.0, 4.0), 2.0, 1);
        let volume = mesh.volume();
        mesh.compute_normals();
        mesh.flip_handedness();

        assert_relative_eq!(mesh.volume(), volume, epsilon = 1e-3);
        assert_relative_eq!(mesh.centroid().z, -4.0, epsilon = 1e-4);

        let center = mesh.centroid();
        for (vertex, normal) in mesh.vertices().iter().zip(mesh.normals().unwrap()) {
            assert!(normal.dot(&(vertex - center)) > 0.0);
        }
    }

    #[test]
    fn translate_moves_centroid() {
        let mut mesh = tetrahedron();
        mesh.translate(Pos::new(-0.25, -0.25, -0.25));
        assert_relative_eq!(mesh.centroid(), Pos::zeros(), epsilon = 1e-6);
    }
}
