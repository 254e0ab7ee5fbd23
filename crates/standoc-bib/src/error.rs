/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Error types for bibliographic resolution.
 */

//! Error types for sources, cache stores and reassembly.
//!
//! None of these escape [`crate::Resolver::resolve`]: failed fetches become
//! [`crate::Outcome::Failed`], cache errors are logged and treated as misses.

use std::path::PathBuf;
use thiserror::Error;

/// Errors a [`crate::BibliographicSource`] can report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The source has no record for this code.
    #[error("not found in {source_name}")]
    NotFound { source_name: String },

    /// The source could not be reached.
    #[error("no access to {0}")]
    Unavailable(String),

    /// The fetch did not finish in time.
    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The source answered with something unusable.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Errors from a [`crate::CacheStore`].
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt cache entry at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A malformed message reached the [`crate::Reassembler`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    #[error("ordinal {ordinal} out of range for {len} descriptors")]
    OutOfRange { ordinal: usize, len: usize },

    #[error("ordinal {0} delivered twice")]
    Duplicate(usize),
}
