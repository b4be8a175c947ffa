// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShuffleError {

    #[error("unsupported element type '{name}'")]
    UnsupportedType {
        name: String,
    },

    #[error("failed to read dataset at '{path}': {message}")]
    DatasetRead {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("failed to write dataset at '{path}': {message}")]
    DatasetWrite {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("scratch slot {index} was never written")]
    SlotNotFound {
        index: usize,
    },

    #[error("invalid shuffling algorithm '{name}'")]
    InvalidAlgorithm {
        name: String,
    },

    #[error("configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type Result<T> = std::result::Result<T, ShuffleError>;

// Convenience constructors
impl ShuffleError {

    pub fn unsupported_type(name: impl Into<String>) -> Self {
        Self::UnsupportedType { name: name.into() }
    }

    pub fn read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DatasetRead {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn read_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::DatasetRead {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DatasetWrite {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn write_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::DatasetWrite {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn slot_not_found(index: usize) -> Self {
        Self::SlotNotFound { index }
    }

    pub fn invalid_algorithm(name: impl Into<String>) -> Self {
        Self::InvalidAlgorithm { name: name.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
