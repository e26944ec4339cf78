use serde::{Deserialize, Serialize};

/// Interchange formats a reconstructed mesh can be written to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshFormat {
    Obj,
    Stl,
}

impl MeshFormat {
    pub const ALL: [MeshFormat; 2] = [MeshFormat::Obj, MeshFormat::Stl];

    pub fn from_extension(extension: &str) -> Option<Self> {
        Some(match extension.to_lowercase().as_str() {
            "obj" => MeshFormat::Obj,
            "stl" => MeshFormat::Stl,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            MeshFormat::Obj => "Wavefront OBJ",
            MeshFormat::Stl => "Binary STL",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MeshFormat::Obj => "obj",
            MeshFormat::Stl => "stl",
        }
    }
}
