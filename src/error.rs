//! Error type shared by every library module.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrainScanError {
    /// An image could not be opened or decoded.
    #[error("failed to load image '{0}': {1}")]
    ImageLoad(PathBuf, String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Two tensors, or a tensor and a layer, disagree on shape.
    #[error("shape mismatch: {0}")]
    Shape(String),

    /// An architecture description cannot be turned into a network.
    #[error("invalid architecture: {0}")]
    Architecture(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// The explanation service could not be reached or answered with garbage.
    #[error("explanation request failed: {0}")]
    Explain(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BrainScanError>;

impl From<figment::Error> for BrainScanError {
    fn from(e: figment::Error) -> Self {
        BrainScanError::Config(e.to_string())
    }
}
