use nalgebra::Vector3;

pub mod bounding_box;
pub mod bvh;
pub mod triangle;

pub use bounding_box::BoundingBox;

/// Result of a closest point query against a mesh.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub position: Vector3<f32>,
    /// Squared distance while searching, distance once returned.
    pub t: f32,
    pub face: usize,
}

impl Default for Hit {
    fn default() -> Self {
        Self {
            position: Vector3::repeat(f32::NAN),
            t: f32::MAX,
            face: usize::MAX,
        }
    }
}
