use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use common::config::{IntensityConvention, ReconstructionParameters};
use nalgebra::Vector3;
use reconstruct::volume::VolumeSource;

use crate::source::{ImageStackSource, Phantom};

#[derive(Debug, Parser)]
/// Reconstructs a triangle mesh from a stack of scan slices.
pub struct Args {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(long, default_value = "1, 1, 1", value_parser = vector_value_parser)]
    /// Physical size of a voxel along the X, Y and Z axes. Z is the distance
    /// between slices.
    pub spacing: Vector3<f32>,
    #[arg(long, default_value_t = 64)]
    /// Voxels along each axis of the phantom volume.
    pub phantom_size: usize,

    #[arg(long)]
    /// TOML file with reconstruction parameters. Flags below override it.
    pub config: Option<PathBuf>,
    #[arg(long)]
    /// Marching cubes cells along the longest axis, at least 32.
    pub target_cell_count: Option<u32>,
    #[arg(long)]
    /// Target edge length of the remesher.
    pub edge_length: Option<f32>,
    #[arg(long)]
    /// Number of isotropic remeshing passes.
    pub remesh_passes: Option<u32>,
    #[arg(long)]
    /// Decimate the mesh down to this many triangles.
    pub reduced_triangle_count: Option<u32>,
    #[arg(long)]
    /// Treat voxels brighter than this as interior instead of every positive
    /// voxel.
    pub threshold: Option<f32>,

    /// File to write the mesh to, .obj or .stl.
    pub output: PathBuf,
}

#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    #[arg(long)]
    /// Directory of grayscale slice images, ordered by file name.
    pub slices: Option<PathBuf>,
    #[arg(long)]
    /// Reconstruct a synthetic sphere of this radius instead.
    pub phantom_radius: Option<f32>,
}

impl Args {
    pub fn parameters(&self) -> Result<ReconstructionParameters> {
        let mut params = match &self.config {
            Some(path) => ReconstructionParameters::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ReconstructionParameters::default(),
        };

        if let Some(count) = self.target_cell_count {
            params.target_cell_count = count;
        }
        if let Some(length) = self.edge_length {
            params.edge_length_multiplier = length;
        }
        if let Some(passes) = self.remesh_passes {
            params.remesh_passes = passes;
        }
        if let Some(count) = self.reduced_triangle_count {
            params.reduced_triangle_count = count;
        }
        if let Some(level) = self.threshold {
            params.convention = IntensityConvention::Threshold { level };
        }

        params.validate()?;
        Ok(params)
    }

    pub fn volume_source(&self) -> Box<dyn VolumeSource> {
        match (&self.source.slices, self.source.phantom_radius) {
            (Some(directory), _) => Box::new(ImageStackSource {
                directory: directory.to_owned(),
                spacing: self.spacing,
            }),
            (None, radius) => Box::new(Phantom {
                size: self.phantom_size,
                radius: radius.unwrap_or(self.phantom_size as f32 / 3.0),
                spacing: self.spacing,
            }),
        }
    }
}

fn vector_value_parser(raw: &str) -> Result<Vector3<f32>> {
    let mut vec = Vector3::zeros();

    let mut parts = raw.splitn(3, ',');
    for i in 0..3 {
        let element = parts.next().context("Missing vector element")?.trim();
        vec[i] = element
            .parse()
            .context("Can't convert element from string")?;
    }

    Ok(vec)
}
