use super::Hit;
use crate::{mesh::Mesh, Pos};
use bvh_node::{BvhNode, FaceInfo};

mod bvh_node;

const LEAF_SIZE: usize = 8;

/// Bounding volume hierarchy over the faces of a mesh. The mesh itself is not
/// stored, queries must be made with the same mesh the hierarchy was built
/// from.
#[derive(Default)]
pub struct Bvh {
    /// Children come before their parent, the root is last.
    nodes: Vec<BvhNode>,
}

impl Bvh {
    pub fn build(mesh: &Mesh) -> Self {
        let faces = mesh.face_count();
        if faces == 0 {
            return Self::default();
        }

        let info = (0..faces)
            .map(|face| FaceInfo::of(mesh, face))
            .collect::<Vec<_>>();
        let mut nodes = Vec::with_capacity(faces / LEAF_SIZE * 2 + 1);
        bvh_node::build(&mut nodes, &info, (0..faces).collect());

        Self { nodes }
    }

    /// Finds the closest point on the surface of the mesh. The returned hit's
    /// `t` is the (non squared) distance to the point.
    pub fn closest(&self, mesh: &Mesh, point: Pos) -> Option<Hit> {
        let root = self.nodes.len().checked_sub(1)?;
        let mut hit = Hit::default();
        bvh_node::closest(&self.nodes, root, mesh, point, &mut hit);
        hit.t = hit.t.sqrt();
        Some(hit)
    }
}
