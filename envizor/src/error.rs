use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{what} not found: {}", .path.display())]
    NotFound { what: &'static str, path: PathBuf },

    #[error("No images found in: {}", .0.display())]
    NoImages(PathBuf),

    #[error("Row has {found} fields but the header names {expected}")]
    Schema { expected: usize, found: usize },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Class names error: {0}")]
    ClassNames(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Inference error: {0:#}")]
    Inference(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(what: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            what,
            path: path.into(),
        }
    }

    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    pub fn class_names(msg: impl Into<String>) -> Self {
        Self::ClassNames(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    /// Faults that invalidate the whole run rather than a single image.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ClassNames(_) | Self::Config(_) | Self::NotFound { .. } | Self::NoImages(_)
        )
    }
}
