use std::collections::HashMap;

use crate::mesh::Mesh;

#[derive(Clone)]
pub struct HalfEdgeMesh {
    half_edges: Vec<HalfEdge>,
}

#[derive(Debug, Clone)]
pub struct HalfEdge {
    pub origin_vertex: u32,
    pub vertex: u32,
    pub face: u32,

    pub next: u32,
    pub prev: u32,
    pub twin: Option<u32>,
}

impl HalfEdgeMesh {
    pub fn build(mesh: &Mesh) -> Self {
        let mut half_edges = Vec::with_capacity(mesh.face_count() * 3);
        let mut edge_map = HashMap::new();

        for (face_idx, face) in mesh.faces().iter().enumerate() {
            let first_edge = half_edges.len() as u32;
            for i in 0..3 {
                let next = first_edge + (i as u32 + 1) % 3;
                let prev = first_edge + (i as u32 + 2) % 3;

                let half_edge = HalfEdge {
                    origin_vertex: face[i],
                    vertex: face[(i + 1) % 3],
                    face: face_idx as u32,

                    next,
                    prev,
                    twin: None,
                };

                let edge_key = (face[i], face[(i + 1) % 3]);
                half_edges.push(half_edge);
                edge_map.insert(edge_key, first_edge + i as u32);
            }
        }

        for edge in half_edges.iter_mut() {
            edge.twin = edge_map.get(&(edge.vertex, edge.origin_vertex)).copied();
        }

        Self { half_edges }
    }

    /// Flags every vertex touching a half edge without a twin.
    pub fn boundary_vertices(&self, vertex_count: usize) -> Vec<bool> {
        let mut boundary = vec![false; vertex_count];
        for edge in self.half_edges.iter().filter(|x| x.twin.is_none()) {
            boundary[edge.origin_vertex as usize] = true;
            boundary[edge.vertex as usize] = true;
        }

        boundary
    }

    /// True if every half edge has a twin.
    pub fn is_closed(&self) -> bool {
        self.half_edges.iter().all(|x| x.twin.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::HalfEdgeMesh;
    use crate::{builder::MeshBuilder, mesh::Mesh, Pos};

    #[test]
    fn icosphere_is_closed() {
        let mesh = MeshBuilder::icosphere(Pos::zeros(), 1.0, 1);
        let half_edge = HalfEdgeMesh::build(&mesh);

        assert!(half_edge.is_closed());
        let boundary = half_edge.boundary_vertices(mesh.vertex_count());
        assert!(boundary.iter().all(|&x| !x));
    }

    #[test]
    fn open_mesh_boundary() {
        let sphere = MeshBuilder::icosphere(Pos::zeros(), 1.0, 0);
        let (vertices, mut faces) = sphere.into_parts();
        let [a, b, c] = faces.remove(0);

        let mesh = Mesh::new(vertices, faces);
        let half_edge = HalfEdgeMesh::build(&mesh);
        assert!(!half_edge.is_closed());

        let boundary = half_edge.boundary_vertices(mesh.vertex_count());
        assert_eq!(boundary.iter().filter(|&&x| x).count(), 3);
        assert!(boundary[a as usize] && boundary[b as usize] && boundary[c as usize]);
    }
}
