//! Error types for standoc-core

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors. Recoverable conditions go to the diagnostics sink instead.
#[derive(Error, Debug)]
pub enum StandocError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("{0}")]
    Xml(#[from] standoc_xml::Error),

    #[error("Invalid query: {0}")]
    Query(#[from] standoc_xml::QueryError),

    #[error("Transform error: {0}")]
    Transform(String),

    #[error("{0}")]
    Other(String),
}

impl StandocError {
    /// Create an error from any message.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, StandocError>;
