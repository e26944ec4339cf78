use ordered_float::OrderedFloat;

use crate::{
    geometry::{bvh::LEAF_SIZE, triangle::closest_point, BoundingBox, Hit},
    mesh::Mesh,
    Pos,
};

pub enum BvhNode {
    Leaf {
        faces: Box<[usize]>,
        bounds: BoundingBox,
    },
    Node {
        left: usize,
        right: usize,
        bounds: BoundingBox,
    },
}

/// Per face data computed once before the tree is split.
pub struct FaceInfo {
    pub bounds: BoundingBox,
    pub center: Pos,
}

impl BvhNode {
    fn bounds(&self) -> &BoundingBox {
        match self {
            BvhNode::Leaf { bounds, .. } | BvhNode::Node { bounds, .. } => bounds,
        }
    }
}

impl FaceInfo {
    pub fn of(mesh: &Mesh, face: usize) -> Self {
        let mut bounds = BoundingBox::empty();
        bounds.expand_face(mesh, face);
        Self {
            center: bounds.center(),
            bounds,
        }
    }
}

/// Best first search from `root`. Subtrees whose box is further than the
/// current best are skipped. `out.t` holds the squared distance.
pub fn closest(arena: &[BvhNode], root: usize, mesh: &Mesh, point: Pos, out: &mut Hit) {
    let mut stack = vec![(arena[root].bounds().distance_squared(point), root)];

    while let Some((distance, node)) = stack.pop() {
        if distance >= out.t {
            continue;
        }

        match &arena[node] {
            BvhNode::Leaf { faces, .. } => {
                for &face in faces.iter() {
                    let position = closest_point(mesh, face, point);
                    let t = (position - point).magnitude_squared();
                    if t < out.t {
                        *out = Hit { position, t, face };
                    }
                }
            }
            &BvhNode::Node { left, right, .. } => {
                let near = (arena[left].bounds().distance_squared(point), left);
                let far = (arena[right].bounds().distance_squared(point), right);
                let (near, far) = if near.0 <= far.0 { (near, far) } else { (far, near) };

                // Popped last in, so the nearer child is searched first.
                stack.push(far);
                stack.push(near);
            }
        }
    }
}

/// Builds the subtree over `faces` and returns its index in the arena.
/// Faces are split at the median center along the longest axis.
pub fn build(arena: &mut Vec<BvhNode>, info: &[FaceInfo], mut faces: Vec<usize>) -> usize {
    let bounds = faces.iter().fold(BoundingBox::empty(), |mut acc, &face| {
        acc.expand_point(info[face].bounds.min());
        acc.expand_point(info[face].bounds.max());
        acc
    });

    let node = if faces.len() <= LEAF_SIZE {
        BvhNode::Leaf {
            faces: faces.into_boxed_slice(),
            bounds,
        }
    } else {
        let axis = bounds.longest_axis();
        let median = faces.len() / 2;
        faces.select_nth_unstable_by_key(median, |&face| {
            (OrderedFloat(info[face].center[axis]), face)
        });

        let right_faces = faces.split_off(median);
        let left = build(arena, info, faces);
        let right = build(arena, info, right_faces);
        BvhNode::Node {
            left,
            right,
            bounds,
        }
    };

    arena.push(node);
    arena.len() - 1
}
