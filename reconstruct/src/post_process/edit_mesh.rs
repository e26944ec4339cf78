use std::collections::{BTreeSet, HashMap};

use crate::{half_edge::HalfEdgeMesh, mesh::Mesh, Pos};

/// Indexed triangle mesh supporting local edits. Removed faces and vertices
/// are only flagged dead, so ids stay stable until [`EditMesh::into_mesh`]
/// compacts them.
pub struct EditMesh {
    vertices: Vec<Pos>,
    vertex_alive: Vec<bool>,
    /// Vertices on open or non-manifold edges, never moved or removed.
    fixed: Vec<bool>,
    /// Alive faces around each vertex.
    vertex_faces: Vec<Vec<u32>>,

    faces: Vec<[u32; 3]>,
    face_alive: Vec<bool>,
    alive_faces: usize,
}

impl EditMesh {
    pub fn from_mesh(mesh: &Mesh) -> Self {
        let vertex_count = mesh.vertex_count();
        let mut fixed = HalfEdgeMesh::build(mesh).boundary_vertices(vertex_count);

        let mut edge_faces = HashMap::<(u32, u32), u32>::new();
        let mut vertex_faces = vec![Vec::new(); vertex_count];
        for (idx, face) in mesh.faces().iter().enumerate() {
            for i in 0..3 {
                let (a, b) = (face[i], face[(i + 1) % 3]);
                *edge_faces.entry((a.min(b), a.max(b))).or_default() += 1;
                vertex_faces[a as usize].push(idx as u32);
            }
        }

        for (&(a, b), _) in edge_faces.iter().filter(|(_, count)| **count > 2) {
            fixed[a as usize] = true;
            fixed[b as usize] = true;
        }

        Self {
            vertices: mesh.vertices().to_vec(),
            vertex_alive: vec![true; vertex_count],
            fixed,
            vertex_faces,

            faces: mesh.faces().to_vec(),
            face_alive: vec![true; mesh.face_count()],
            alive_faces: mesh.face_count(),
        }
    }

    pub fn face_count(&self) -> usize {
        self.alive_faces
    }

    pub fn position(&self, vertex: u32) -> Pos {
        self.vertices[vertex as usize]
    }

    pub fn set_position(&mut self, vertex: u32, position: Pos) {
        self.vertices[vertex as usize] = position;
    }

    pub fn is_alive(&self, vertex: u32) -> bool {
        self.vertex_alive[vertex as usize]
    }

    pub fn is_fixed(&self, vertex: u32) -> bool {
        self.fixed[vertex as usize]
    }

    pub fn face(&self, face: u32) -> [u32; 3] {
        self.faces[face as usize]
    }

    pub fn faces(&self) -> impl Iterator<Item = &[u32; 3]> + '_ {
        (self.faces.iter().zip(&self.face_alive))
            .filter(|(_, alive)| **alive)
            .map(|(face, _)| face)
    }

    /// Alive vertices that are referenced by at least one face.
    pub fn vertices(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.vertices.len() as u32).filter(|&v| {
            self.vertex_alive[v as usize] && !self.vertex_faces[v as usize].is_empty()
        })
    }

    pub fn length_squared(&self, a: u32, b: u32) -> f32 {
        (self.position(a) - self.position(b)).magnitude_squared()
    }

    /// Every edge of an alive face as `(min, max)`, in ascending order.
    pub fn edges(&self) -> Vec<(u32, u32)> {
        let mut edges = BTreeSet::new();
        for face in self.faces() {
            for i in 0..3 {
                let (a, b) = (face[i], face[(i + 1) % 3]);
                edges.insert((a.min(b), a.max(b)));
            }
        }

        edges.into_iter().collect()
    }

    /// Faces containing both `a` and `b`.
    pub fn edge_faces(&self, a: u32, b: u32) -> Vec<u32> {
        self.vertex_faces[a as usize]
            .iter()
            .copied()
            .filter(|&f| self.faces[f as usize].contains(&b))
            .collect()
    }

    /// A fixed edge touches a fixed vertex or is not shared by exactly two
    /// faces.
    pub fn is_fixed_edge(&self, a: u32, b: u32) -> bool {
        self.is_fixed(a) || self.is_fixed(b) || self.edge_faces(a, b).len() != 2
    }

    /// Sorted one ring of a vertex.
    pub fn neighbors(&self, vertex: u32) -> Vec<u32> {
        let mut out = self.vertex_faces[vertex as usize]
            .iter()
            .flat_map(|&f| self.faces[f as usize])
            .filter(|&v| v != vertex)
            .collect::<Vec<_>>();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn valence(&self, vertex: u32) -> usize {
        self.neighbors(vertex).len()
    }

    /// Cross product of a face's edges, its length is twice the area.
    pub fn face_cross(&self, face: u32) -> Pos {
        let [v0, v1, v2] = self.faces[face as usize].map(|x| self.position(x));
        (v1 - v0).cross(&(v2 - v0))
    }

    fn add_face(&mut self, face: [u32; 3]) -> u32 {
        let idx = self.faces.len() as u32;
        self.faces.push(face);
        self.face_alive.push(true);
        self.alive_faces += 1;

        for vertex in face {
            self.vertex_faces[vertex as usize].push(idx);
        }

        idx
    }

    fn remove_face(&mut self, face: u32) {
        if !self.face_alive[face as usize] {
            return;
        }

        self.face_alive[face as usize] = false;
        self.alive_faces -= 1;
        for vertex in self.faces[face as usize] {
            self.vertex_faces[vertex as usize].retain(|&f| f != face);
        }
    }

    /// Inserts a vertex at the middle of the edge, splitting both faces
    /// around it in two. Returns the new vertex.
    pub fn split_edge(&mut self, a: u32, b: u32) -> u32 {
        let mid = self.vertices.len() as u32;
        self.vertices.push((self.position(a) + self.position(b)) / 2.0);
        self.vertex_alive.push(true);
        self.fixed.push(false);
        self.vertex_faces.push(Vec::new());

        for face in self.edge_faces(a, b) {
            let [x, y, z] = self.faces[face as usize];
            // Rotate so the face reads (a, b, c) or (b, a, c).
            let (first, second, c) = if x != a && x != b {
                (y, z, x)
            } else if y != a && y != b {
                (z, x, y)
            } else {
                (x, y, z)
            };

            self.remove_face(face);
            self.add_face([first, mid, c]);
            self.add_face([mid, second, c]);
        }

        mid
    }

    /// Checks that merging `remove` into `keep` at `position` keeps the mesh
    /// a valid manifold. With `max_length_squared` the new edges around
    /// `position` may not be longer than it, with `check_normals` no face may
    /// flip or degenerate.
    pub fn can_collapse(
        &self,
        keep: u32,
        remove: u32,
        position: Pos,
        max_length_squared: Option<f32>,
        check_normals: bool,
    ) -> bool {
        // A tetrahedron can't be collapsed any further.
        if self.alive_faces <= 4 {
            return false;
        }

        // Link condition, the only shared neighbours are the apexes of the
        // two faces on the edge.
        let shared = self.edge_faces(keep, remove);
        if shared.len() != 2 {
            return false;
        }

        let apexes = shared
            .iter()
            .flat_map(|&f| self.faces[f as usize])
            .filter(|&v| v != keep && v != remove)
            .collect::<BTreeSet<_>>();
        let (ring_keep, ring_remove) = (self.neighbors(keep), self.neighbors(remove));
        let common = ring_keep
            .iter()
            .filter(|v| ring_remove.binary_search(v).is_ok())
            .copied()
            .collect::<BTreeSet<_>>();
        if common != apexes {
            return false;
        }

        if let Some(max) = max_length_squared {
            let too_long = (ring_keep.iter().chain(&ring_remove))
                .filter(|&&v| v != keep && v != remove)
                .any(|&v| (self.position(v) - position).magnitude_squared() > max);
            if too_long {
                return false;
            }
        }

        if check_normals {
            for vertex in [keep, remove] {
                for &face in &self.vertex_faces[vertex as usize] {
                    if shared.contains(&face) {
                        continue;
                    }

                    let old = self.face_cross(face);
                    let [v0, v1, v2] = self.faces[face as usize].map(|x| {
                        if x == keep || x == remove {
                            position
                        } else {
                            self.position(x)
                        }
                    });
                    let new = (v1 - v0).cross(&(v2 - v0));

                    if new.magnitude_squared() <= f32::EPSILON * old.magnitude_squared()
                        || old.dot(&new) <= 0.0
                    {
                        return false;
                    }
                }
            }
        }

        true
    }

    /// Merges `remove` into `keep`, moving `keep` to `position`. The two
    /// faces on the edge are deleted.
    pub fn collapse_edge(&mut self, keep: u32, remove: u32, position: Pos) {
        for face in self.edge_faces(keep, remove) {
            self.remove_face(face);
        }

        for face in std::mem::take(&mut self.vertex_faces[remove as usize]) {
            for vertex in self.faces[face as usize].iter_mut() {
                if *vertex == remove {
                    *vertex = keep;
                }
            }
            self.vertex_faces[keep as usize].push(face);
        }

        self.vertices[keep as usize] = position;
        self.vertex_alive[remove as usize] = false;
    }

    /// Replaces the edge `(a, b)` with the one joining the opposite corners
    /// of its two faces. Returns false (leaving the mesh untouched) if the
    /// flip would create a duplicate edge or fold the surface.
    pub fn flip_edge(&mut self, a: u32, b: u32) -> bool {
        let shared = self.edge_faces(a, b);
        let &[f1, f2] = shared.as_slice() else {
            return false;
        };

        // Order the faces so f1 runs a -> b and f2 runs b -> a.
        let (f1, f2) = if directed(&self.faces[f1 as usize], a, b) {
            (f1, f2)
        } else {
            (f2, f1)
        };
        let (face1, face2) = (&self.faces[f1 as usize], &self.faces[f2 as usize]);
        if !directed(face1, a, b) || !directed(face2, b, a) {
            return false;
        }

        let c = opposite(&self.faces[f1 as usize], a, b);
        let d = opposite(&self.faces[f2 as usize], a, b);
        if c == d || self.neighbors(c).contains(&d) {
            return false;
        }

        let old = self.face_cross(f1) + self.face_cross(f2);
        let [pa, pb, pc, pd] = [a, b, c, d].map(|x| self.position(x));
        let n1 = (pa - pc).cross(&(pd - pc));
        let n2 = (pb - pd).cross(&(pc - pd));
        if n1.dot(&old) <= 0.0 || n2.dot(&old) <= 0.0 || n1.dot(&n2) <= 0.0 {
            return false;
        }

        self.remove_face(f1);
        self.remove_face(f2);
        self.add_face([c, a, d]);
        self.add_face([d, b, c]);
        true
    }

    /// Builds a mesh from the alive faces, dropping unreferenced vertices.
    pub fn into_mesh(self) -> Mesh {
        let mut remap = vec![u32::MAX; self.vertices.len()];
        let mut vertices = Vec::new();
        for vertex in self.vertices() {
            remap[vertex as usize] = vertices.len() as u32;
            vertices.push(self.vertices[vertex as usize]);
        }

        let faces = self
            .faces()
            .map(|face| face.map(|x| remap[x as usize]))
            .collect();
        Mesh::new(vertices, faces)
    }
}

/// True if the face walks from `a` straight to `b`.
fn directed(face: &[u32; 3], a: u32, b: u32) -> bool {
    (0..3).any(|i| face[i] == a && face[(i + 1) % 3] == b)
}

fn opposite(face: &[u32; 3], a: u32, b: u32) -> u32 {
    face.iter().copied().find(|&x| x != a && x != b).unwrap_or(a)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::EditMesh;
    use crate::{builder::MeshBuilder, mesh::Mesh, Pos};

    /// Two triangles forming the unit square, split along (0, 2).
    fn square() -> Mesh {
        let vertices = vec![
            Pos::new(0.0, 0.0, 0.0),
            Pos::new(1.0, 0.0, 0.0),
            Pos::new(1.0, 1.0, 0.0),
            Pos::new(0.0, 1.0, 0.0),
        ];
        Mesh::new(vertices, vec![[0, 1, 2], [0, 2, 3]])
    }

    #[test]
    fn boundary_is_fixed() {
        let edit = EditMesh::from_mesh(&square());
        assert!((0..4).all(|v| edit.is_fixed(v)));
        assert!(edit.is_fixed_edge(0, 2));

        let sphere = MeshBuilder::icosphere(Pos::zeros(), 1.0, 1);
        let edit = EditMesh::from_mesh(&sphere);
        assert!(edit.vertices().all(|v| !edit.is_fixed(v)));
    }

    #[test]
    fn split_keeps_winding() {
        let mut sphere = MeshBuilder::icosphere(Pos::zeros(), 1.0, 1);
        let volume = sphere.volume();
        let mut edit = EditMesh::from_mesh(&sphere);

        let (a, b) = edit.edges()[0];
        let mid = edit.split_edge(a, b);
        assert_eq!(edit.valence(mid), 4);
        assert_eq!(edit.face_count(), sphere.face_count() + 2);

        sphere = edit.into_mesh();
        assert!(sphere.is_manifold());
        assert!(sphere.is_valid());
        assert_relative_eq!(sphere.volume(), volume, epsilon = 1e-5);
    }

    #[test]
    fn collapse_removes_two_faces() {
        let sphere = MeshBuilder::icosphere(Pos::zeros(), 1.0, 2);
        let mut edit = EditMesh::from_mesh(&sphere);

        let (a, b) = edit.edges()[0];
        let position = (edit.position(a) + edit.position(b)) / 2.0;
        assert!(edit.can_collapse(a, b, position, None, true));
        edit.collapse_edge(a, b, position);

        assert!(!edit.is_alive(b));
        assert_eq!(edit.face_count(), sphere.face_count() - 2);

        let mesh = edit.into_mesh();
        assert_eq!(mesh.vertex_count(), sphere.vertex_count() - 1);
        assert!(mesh.is_manifold());
        assert!(mesh.is_valid());
    }

    #[test]
    fn collapse_rejects_long_edges() {
        let sphere = MeshBuilder::icosphere(Pos::zeros(), 1.0, 2);
        let edit = EditMesh::from_mesh(&sphere);

        let (a, b) = edit.edges()[0];
        let position = (edit.position(a) + edit.position(b)) / 2.0;
        let length = edit.length_squared(a, b);
        assert!(!edit.can_collapse(a, b, position, Some(length * 0.1), false));
    }

    #[test]
    fn tetrahedron_does_not_collapse() {
        let vertices = vec![
            Pos::new(0.0, 0.0, 0.0),
            Pos::new(1.0, 0.0, 0.0),
            Pos::new(0.0, 1.0, 0.0),
            Pos::new(0.0, 0.0, 1.0),
        ];
        let faces = vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];
        let edit = EditMesh::from_mesh(&Mesh::new(vertices, faces));

        for (a, b) in edit.edges() {
            assert!(!edit.can_collapse(a, b, edit.position(a), None, false));
        }
    }

    #[test]
    fn flip_square_diagonal() {
        let mut edit = EditMesh::from_mesh(&square());
        assert!(edit.flip_edge(0, 2));
        assert_eq!(edit.edge_faces(1, 3).len(), 2);
        assert!(edit.edge_faces(0, 2).is_empty());

        let mesh = edit.into_mesh();
        for face in 0..mesh.face_count() {
            assert_relative_eq!(mesh.face_normal(face), Pos::new(0.0, 0.0, 1.0));
        }
    }
}
