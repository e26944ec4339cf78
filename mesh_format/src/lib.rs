//! Writers for the mesh interchange formats a reconstruction can be exported
//! to.

use std::io::{self, Write};

use nalgebra::Vector3;

pub mod obj;
pub mod stl;

/// Borrowed view of an indexed triangle mesh.
#[derive(Debug, Clone, Copy)]
pub struct MeshRef<'a> {
    pub verts: &'a [Vector3<f32>],
    pub faces: &'a [[u32; 3]],
    pub normals: Option<&'a [Vector3<f32>]>,
}

impl<'a> MeshRef<'a> {
    pub fn new(verts: &'a [Vector3<f32>], faces: &'a [[u32; 3]]) -> Self {
        Self {
            verts,
            faces,
            normals: None,
        }
    }

    pub fn with_normals(self, normals: Option<&'a [Vector3<f32>]>) -> Self {
        Self { normals, ..self }
    }

    fn face_verts(&self, face: &[u32; 3]) -> [Vector3<f32>; 3] {
        face.map(|idx| self.verts[idx as usize])
    }
}

/// Writes a mesh as Wavefront OBJ.
pub fn write_obj<W: Write>(writer: &mut W, mesh: MeshRef) -> io::Result<()> {
    obj::write(writer, mesh)
}

/// Writes a mesh as binary STL. Per-vertex normals are ignored, each facet
/// gets its geometric normal.
pub fn write_stl<W: Write>(writer: &mut W, mesh: MeshRef) -> io::Result<()> {
    stl::write(writer, mesh)
}
