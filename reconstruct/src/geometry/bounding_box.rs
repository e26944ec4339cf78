use nalgebra::Vector3;

use crate::{mesh::Mesh, Pos};

/// Axis aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min: Pos,
    max: Pos,
}

impl BoundingBox {
    pub fn new(min: Pos, max: Pos) -> Self {
        Self { min, max }
    }

    /// A box containing nothing, expanding it by a point gives a box around
    /// just that point.
    pub fn empty() -> Self {
        Self {
            min: Pos::repeat(f32::MAX),
            max: Pos::repeat(f32::MIN),
        }
    }

    pub fn min(&self) -> Pos {
        self.min
    }

    pub fn max(&self) -> Pos {
        self.max
    }

    pub fn center(&self) -> Pos {
        (self.min + self.max) / 2.0
    }

    pub fn extent(&self) -> Pos {
        self.max - self.min
    }

    /// Length of the longest side.
    pub fn max_dim(&self) -> f32 {
        self.extent().max()
    }

    /// True if the box has no volume or is not made of finite numbers.
    pub fn is_degenerate(&self) -> bool {
        let extent = self.extent();
        !self.is_finite() || extent.iter().any(|&x| x <= 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|x| x.is_finite())
    }

    pub fn longest_axis(&self) -> usize {
        let lengths = (self.max - self.min).abs();

        if lengths.x > lengths.y && lengths.x > lengths.z {
            return 0;
        }

        if lengths.y > lengths.x {
            return 1;
        }

        2
    }

    pub fn expand_point(&mut self, point: Pos) {
        self.min = self.min.inf(&point);
        self.max = self.max.sup(&point);
    }

    pub fn expand_face(&mut self, mesh: &Mesh, face_idx: usize) {
        let verts = mesh.vertices();
        let face = mesh.face(face_idx);

        self.expand_point(verts[face[0] as usize]);
        self.expand_point(verts[face[1] as usize]);
        self.expand_point(verts[face[2] as usize]);
    }

    /// Grows the box by `amount` on every side.
    pub fn padded(&self, amount: f32) -> Self {
        Self {
            min: self.min - Vector3::repeat(amount),
            max: self.max + Vector3::repeat(amount),
        }
    }

    /// Squared distance from a point to the closest point of the box, zero
    /// if the point is inside.
    pub fn distance_squared(&self, point: Pos) -> f32 {
        let outside = (self.min - point).sup(&(point - self.max)).sup(&Pos::zeros());
        outside.magnitude_squared()
    }
}
