/*
 * source.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Bibliographic sources.
 */

//! Where bibliographic records come from.
//!
//! A source answers `fetch(code, year)` with the record as XML text. The
//! network transport of real sources is out of scope here; the CLI reads
//! records from a directory and tests use an in-memory map.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::file_stem;
use crate::error::FetchError;

/// A bibliographic record as XML text.
pub type Record = String;

/// A service that resolves standard codes to bibliographic records.
#[async_trait]
pub trait BibliographicSource: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    async fn fetch(&self, code: &str, year: Option<&str>) -> Result<Record, FetchError>;
}

fn lookup_key(code: &str, year: Option<&str>) -> String {
    match year {
        Some(year) => format!("{}:{}", code, year),
        None => code.to_string(),
    }
}

#[derive(Debug, Clone)]
enum Canned {
    Record(Record),
    Failure(FetchError),
}

/// An in-memory source with optional per-code latency.
///
/// Records are registered under `code` or `code:year`. A dated request falls
/// back to the undated registration.
#[derive(Debug, Default, Clone)]
pub struct StaticSource {
    entries: HashMap<String, Canned>,
    delays: HashMap<String, Duration>,
    fetches: Arc<AtomicUsize>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, code: &str, year: Option<&str>, record: impl Into<Record>) -> Self {
        self.entries
            .insert(lookup_key(code, year), Canned::Record(record.into()));
        self
    }

    pub fn with_failure(mut self, code: &str, year: Option<&str>, error: FetchError) -> Self {
        self.entries
            .insert(lookup_key(code, year), Canned::Failure(error));
        self
    }

    /// Delay every fetch of `code` by `delay`.
    pub fn with_delay(mut self, code: &str, delay: Duration) -> Self {
        self.delays.insert(code.to_string(), delay);
        self
    }

    /// Number of fetches served so far, across clones.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BibliographicSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, code: &str, year: Option<&str>) -> Result<Record, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(code) {
            tokio::time::sleep(*delay).await;
        }
        let canned = self
            .entries
            .get(&lookup_key(code, year))
            .or_else(|| self.entries.get(code));
        match canned {
            Some(Canned::Record(record)) => Ok(record.clone()),
            Some(Canned::Failure(error)) => Err(error.clone()),
            None => Err(FetchError::NotFound {
                source_name: self.name().to_string(),
            }),
        }
    }
}

/// Records stored as XML files in a directory, one per code.
///
/// The file for `ISO 123` with year `2001` is looked up first as the encoded
/// stem of `ISO 123:2001`, then of `ISO 123`, with an `.xml` extension.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path where the record for `code`/`year` would be stored.
    pub fn record_path(&self, code: &str, year: Option<&str>) -> PathBuf {
        self.dir
            .join(format!("{}.xml", file_stem(&lookup_key(code, year))))
    }
}

#[async_trait]
impl BibliographicSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    async fn fetch(&self, code: &str, year: Option<&str>) -> Result<Record, FetchError> {
        let mut candidates = vec![self.record_path(code, year)];
        if year.is_some() {
            candidates.push(self.record_path(code, None));
        }
        for path in candidates {
            match tokio::fs::read_to_string(&path).await {
                Ok(record) => {
                    tracing::trace!(code, path = %path.display(), "read bibliographic record");
                    return Ok(record);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(FetchError::Unavailable(format!("{}: {}", path.display(), e)));
                }
            }
        }
        Err(FetchError::NotFound {
            source_name: format!("{}", self.dir.display()),
        })
    }
}
