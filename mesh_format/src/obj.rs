use std::io::{self, BufWriter, Write};

use crate::MeshRef;

/// ```text
/// v x y z
/// vn x y z
/// f a//a b//b c//c
/// ```
/// Indices are one based. Faces only reference normals when the mesh has one
/// normal per vertex.
pub fn write<W: Write>(writer: &mut W, mesh: MeshRef) -> io::Result<()> {
    let mut out = BufWriter::new(writer);

    let normals = mesh
        .normals
        .filter(|normals| normals.len() == mesh.verts.len());

    for vert in mesh.verts {
        writeln!(out, "v {} {} {}", vert.x, vert.y, vert.z)?;
    }

    if let Some(normals) = normals {
        for normal in normals {
            writeln!(out, "vn {} {} {}", normal.x, normal.y, normal.z)?;
        }
    }

    for face in mesh.faces {
        let [a, b, c] = face.map(|idx| idx + 1);
        match normals {
            Some(_) => writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}")?,
            None => writeln!(out, "f {a} {b} {c}")?,
        }
    }

    out.flush()
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;

    use crate::MeshRef;

    fn triangle() -> (Vec<Vector3<f32>>, Vec<[u32; 3]>) {
        let verts = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ];
        (verts, vec![[0, 1, 2]])
    }

    #[test]
    fn writes_one_based_faces() {
        let (verts, faces) = triangle();
        let mut out = Vec::new();
        super::write(&mut out, MeshRef::new(&verts, &faces)).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines, ["v 0 0 0", "v 1 0 0", "v 0 1 0", "f 1 2 3"]);
    }

    #[test]
    fn references_normals_when_present() {
        let (verts, faces) = triangle();
        let normals = vec![Vector3::z(); 3];
        let mesh = MeshRef::new(&verts, &faces).with_normals(Some(&normals));

        let mut out = Vec::new();
        super::write(&mut out, mesh).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().filter(|x| x.starts_with("vn ")).count(), 3);
        assert!(text.contains("f 1//1 2//2 3//3"));
    }

    #[test]
    fn mismatched_normals_are_skipped() {
        let (verts, faces) = triangle();
        let normals = vec![Vector3::z(); 2];
        let mesh = MeshRef::new(&verts, &faces).with_normals(Some(&normals));

        let mut out = Vec::new();
        super::write(&mut out, mesh).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("vn "));
        assert!(text.contains("f 1 2 3"));
    }
}
