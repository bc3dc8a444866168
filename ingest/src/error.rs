//! Error types for ingestion.

use thiserror::Error;

use sdif_sqlite::ContainerError;

/// Errors that can occur while reading a tabular source into a container.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Writing to the container failed.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// CSV parsing failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A row or column skip specification cannot be applied.
    #[error("invalid skip specification: {0}")]
    InvalidSkipSpec(String),

    /// A column named in a skip specification is not in the header.
    #[error("column '{name}' not found (available: {available})")]
    ColumnNotFound { name: String, available: String },

    /// An ingestion option has an unusable value.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// An explicit encoding label is not recognized.
    #[error("unknown encoding '{0}'")]
    UnknownEncoding(String),
}

/// Convenience alias for results with [`IngestError`].
pub type Result<T> = std::result::Result<T, IngestError>;
