//! Surface reconstruction from volumetric scans. A [`volume::Volume`] is
//! resampled to unit spacing, wrapped as a trilinear scalar field, polygonized
//! with marching cubes and post processed into an exportable [`mesh::Mesh`].

use nalgebra::Vector3;

pub mod builder;
pub mod error;
pub mod export;
pub mod field;
pub mod geometry;
pub mod half_edge;
pub mod marching_cubes;
pub mod mesh;
pub mod pipeline;
pub mod post_process;
pub mod resample;
pub mod volume;

pub use error::{ReconstructError, Result};
pub use pipeline::{reconstruct, Reconstructor};

pub type Pos = Vector3<f32>;
