use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading a dotenv file.
#[derive(Debug, Error)]
pub enum DotenvError {
    #[error("Failed to read dotenv file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while assembling or writing a deployment spec.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Invalid value '{value}' for {field}: expected {expected}")]
    InvalidField {
        field: String,
        value: String,
        expected: &'static str,
    },

    #[error("Failed to serialize deployment spec")]
    Serialize(#[from] serde_yaml_ng::Error),

    #[error("Failed to write deployment spec {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
