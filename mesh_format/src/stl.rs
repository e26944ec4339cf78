use std::io::{self, Write};

use nalgebra::Vector3;
use stl_io::{Normal, Triangle, Vertex};

use crate::MeshRef;

/// From Wikipedia :eyes:
/// ```text
/// UINT8[80]    – Header                 - 80 bytes
/// UINT32       – Number of triangles    - 04 bytes
/// foreach triangle                      - 50 bytes
///     REAL32[3] – Normal vector         - 12 bytes
///     REAL32[3] – Vertex 1              - 12 bytes
///     REAL32[3] – Vertex 2              - 12 bytes
///     REAL32[3] – Vertex 3              - 12 bytes
///     UINT16    – Attribute byte count  - 02 bytes
/// end
/// ```
pub fn write<W: Write>(writer: &mut W, mesh: MeshRef) -> io::Result<()> {
    let triangles = mesh
        .faces
        .iter()
        .map(|face| {
            let [v0, v1, v2] = mesh.face_verts(face);
            let normal = (v1 - v0).cross(&(v2 - v0));
            let normal = normal.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros);

            Triangle {
                normal: Normal::new([normal.x, normal.y, normal.z]),
                vertices: [v0, v1, v2].map(|v| Vertex::new([v.x, v.y, v.z])),
            }
        })
        .collect::<Vec<_>>();

    stl_io::write_stl(writer, triangles.iter())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::Vector3;

    use crate::MeshRef;

    #[test]
    fn binary_layout() {
        let verts = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        ];
        let faces = vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];

        let mut out = Vec::new();
        super::write(&mut out, MeshRef::new(&verts, &faces)).unwrap();
        assert_eq!(out.len(), 80 + 4 + 50 * faces.len());

        let mesh = stl_io::read_stl(&mut Cursor::new(out)).unwrap();
        assert_eq!(mesh.faces.len(), 4);
        assert_eq!(mesh.vertices.len(), 4);

        let first = &mesh.faces[0];
        assert_eq!(first.normal, stl_io::Normal::new([0.0, 0.0, -1.0]));
    }
}
