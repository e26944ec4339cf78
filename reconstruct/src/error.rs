use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconstructError {
    #[error("Invalid volume: {reason}")]
    InvalidVolume { reason: String },

    #[error("Invalid reconstruction parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error("Degenerate scalar field: {reason}")]
    DegenerateField { reason: String },

    #[error("Reconstruction was cancelled")]
    Cancelled,

    #[error("Unsupported mesh format `{0}`")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ReconstructError>;

impl ReconstructError {
    pub(crate) fn invalid_volume(reason: impl Into<String>) -> Self {
        Self::InvalidVolume {
            reason: reason.into(),
        }
    }
}
