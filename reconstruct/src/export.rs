use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use common::format::MeshFormat;
use tracing::info;

use crate::{error::ReconstructError, mesh::Mesh, Result};

/// Destination for a finished mesh.
pub trait MeshSink {
    fn write(&self, mesh: &Mesh, destination: &Path) -> Result<()>;
}

/// Writes meshes to disk, picking the format from the file extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSink;

impl FileSink {
    pub fn format_for(destination: &Path) -> Result<MeshFormat> {
        let extension = destination
            .extension()
            .map(|x| x.to_string_lossy().into_owned())
            .unwrap_or_default();
        MeshFormat::from_extension(&extension)
            .ok_or(ReconstructError::UnsupportedFormat(extension))
    }
}

impl MeshSink for FileSink {
    fn write(&self, mesh: &Mesh, destination: &Path) -> Result<()> {
        let format = Self::format_for(destination)?;
        let mut writer = BufWriter::new(File::create(destination)?);
        write_mesh(&mut writer, mesh, format)?;
        writer.flush()?;

        info!(
            "Wrote {} faces to {} as {}",
            mesh.face_count(),
            destination.display(),
            format.name()
        );
        Ok(())
    }
}

/// Serializes a mesh in the given format.
pub fn write_mesh<W: Write>(writer: &mut W, mesh: &Mesh, format: MeshFormat) -> Result<()> {
    let mesh = mesh.mesh_ref();
    match format {
        MeshFormat::Obj => mesh_format::write_obj(writer, mesh)?,
        MeshFormat::Stl => mesh_format::write_stl(writer, mesh)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{env, fs, path::Path, process};

    use common::format::MeshFormat;

    use super::{write_mesh, FileSink, MeshSink};
    use crate::{builder::MeshBuilder, error::ReconstructError, Pos};

    #[test]
    fn obj_includes_normals() {
        let mut mesh = MeshBuilder::icosphere(Pos::zeros(), 1.0, 0);
        mesh.compute_normals();

        let mut out = Vec::new();
        write_mesh(&mut out, &mesh, MeshFormat::Obj).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().filter(|x| x.starts_with("v ")).count(), 12);
        assert_eq!(text.lines().filter(|x| x.starts_with("vn ")).count(), 12);
        assert_eq!(text.lines().filter(|x| x.starts_with("f ")).count(), 20);
    }

    #[test]
    fn stl_size_matches_face_count() {
        let mesh = MeshBuilder::icosphere(Pos::zeros(), 1.0, 1);
        let mut out = Vec::new();
        write_mesh(&mut out, &mesh, MeshFormat::Stl).unwrap();

        assert_eq!(out.len(), 84 + 50 * mesh.face_count());
    }

    #[test]
    fn file_sink_picks_format_from_extension() {
        assert_eq!(FileSink::format_for(Path::new("a/b.STL")).unwrap(), MeshFormat::Stl);
        assert!(matches!(
            FileSink::format_for(Path::new("model.ply")),
            Err(ReconstructError::UnsupportedFormat(ext)) if ext == "ply"
        ));
        assert!(matches!(
            FileSink::format_for(Path::new("model")),
            Err(ReconstructError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn file_sink_writes_file() {
        let mesh = MeshBuilder::icosphere(Pos::zeros(), 1.0, 0);
        let path = env::temp_dir().join(format!("reconstruct-sink-{}.obj", process::id()));

        FileSink.write(&mesh, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(text.lines().filter(|x| x.starts_with("f ")).count(), 20);
    }
}
