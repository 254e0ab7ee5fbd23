/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Concurrent resolution of reference descriptors.
 */

//! Bibliographic resolver.
//!
//! Every fetchable descriptor gets its own tokio task. A task consults the
//! tiered cache, fetches on a miss or a stale undated entry, writes the
//! active scopes and sends `(ordinal, Resolution)` to the coordinator over an
//! mpsc channel. Tasks never see the document tree. The coordinator feeds the
//! messages into a [`Reassembler`], which restores ordinal order.
//!
//! Per descriptor the state moves `Pending → Fetching → Resolved | Failed`.
//! Cache hits skip `Fetching`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::mpsc;

use crate::cache::{CacheEntry, Scope, TieredCache};
use crate::descriptor::ReferenceDescriptor;
use crate::error::FetchError;
use crate::reassembler::Reassembler;
use crate::source::{BibliographicSource, Record};

/// Default per-fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a descriptor is in its resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Pending,
    Fetching,
    Resolved,
    Failed,
}

/// Where a retrieved record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache(Scope),
    Fetched,
}

/// The terminal result for one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A record from a cache scope or the source.
    Retrieved { record: Record, origin: Origin },
    /// Not looked up at all; rendered from the citation text.
    NoFetch,
    /// The fetch failed or timed out.
    Failed { error: FetchError },
}

impl Outcome {
    pub fn state(&self) -> ResolutionState {
        match self {
            Outcome::Retrieved { .. } | Outcome::NoFetch => ResolutionState::Resolved,
            Outcome::Failed { .. } => ResolutionState::Failed,
        }
    }
}

/// An outcome plus any cache trouble met on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: Outcome,
    /// Cache errors are not fatal; they are reported and treated as misses.
    pub cache_errors: Vec<String>,
}

impl Resolution {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            cache_errors: Vec::new(),
        }
    }

    pub fn no_fetch() -> Self {
        Self::new(Outcome::NoFetch)
    }
}

/// Maps code prefixes to bibliographic source names.
///
/// Matching is by prefix at a word boundary, longest prefix first, so
/// `ISO/IEC 27001` is `ISO` and `IEV` is `IEC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixTable {
    entries: Vec<(String, String)>,
}

impl Default for PrefixTable {
    fn default() -> Self {
        Self::new([
            ("ISO", "ISO"),
            ("IEC", "IEC"),
            ("IEV", "IEC"),
            ("RFC", "IETF"),
            ("BCP", "IETF"),
            ("I-D", "IETF"),
            ("ITU", "ITU"),
            ("IEEE", "IEEE"),
            ("NIST", "NIST"),
            ("GB", "CN"),
        ])
    }
}

impl PrefixTable {
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut entries: Vec<(String, String)> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { entries }
    }

    /// Extend or override the defaults.
    pub fn with_overrides<K, V>(self, overrides: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut merged = self.entries;
        for (prefix, source) in overrides {
            let prefix = prefix.into();
            merged.retain(|(p, _)| *p != prefix);
            merged.push((prefix, source.into()));
        }
        Self::new(merged)
    }

    pub fn source_for(&self, code: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(prefix, _)| {
                code.strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.chars().next().is_none_or(|c| !c.is_alphanumeric()))
            })
            .map(|(_, source)| source.as_str())
    }
}

/// `"<SOURCE>(<code>[:<year>])"`.
pub fn cache_key(source: &str, code: &str, year: Option<&str>) -> String {
    match year {
        Some(year) => format!("{}({}:{})", source, code, year),
        None => format!("{}({})", source, code),
    }
}

/// Resolver settings.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub fetch_timeout: Duration,
    pub prefixes: PrefixTable,
    /// Clear every active cache scope before the first lookup.
    pub flush_caches: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            prefixes: PrefixTable::default(),
            flush_caches: false,
        }
    }
}

#[derive(Debug, Clone)]
struct FetchRequest {
    ordinal: usize,
    code: String,
    year: Option<String>,
    key: String,
}

/// Resolves descriptors against a bibliographic source through the cache.
pub struct Resolver {
    source: Option<Arc<dyn BibliographicSource>>,
    cache: TieredCache,
    options: ResolverOptions,
    today: NaiveDate,
    flushed: AtomicBool,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("source", &self.source.as_ref().map(|s| s.name().to_string()))
            .field("cache", &self.cache)
            .field("options", &self.options)
            .field("today", &self.today)
            .finish()
    }
}

impl Resolver {
    pub fn new(
        source: Option<Arc<dyn BibliographicSource>>,
        cache: TieredCache,
        options: ResolverOptions,
    ) -> Self {
        Self {
            source,
            cache,
            options,
            today: chrono::Utc::now().date_naive(),
            flushed: AtomicBool::new(false),
        }
    }

    /// A resolver that never fetches: every descriptor renders directly.
    pub fn offline() -> Self {
        Self::new(None, TieredCache::disabled(), ResolverOptions::default())
    }

    /// Fix the date used for staleness checks and new cache entries.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn is_offline(&self) -> bool {
        self.source.is_none()
    }

    pub fn cache(&self) -> &TieredCache {
        &self.cache
    }

    /// The cache key for a descriptor, or `None` when it is not fetched.
    pub fn key_for(&self, descriptor: &ReferenceDescriptor) -> Option<String> {
        self.request_for(descriptor).map(|r| r.key)
    }

    fn request_for(&self, descriptor: &ReferenceDescriptor) -> Option<FetchRequest> {
        if !descriptor.is_fetchable() {
            return None;
        }
        let code = descriptor.lookup_code()?;
        let Some(source) = self.options.prefixes.source_for(&code) else {
            tracing::debug!(code, "no bibliographic source for code prefix");
            return None;
        };
        let year = descriptor.concrete_year().map(str::to_string);
        Some(FetchRequest {
            ordinal: descriptor.ordinal,
            key: cache_key(source, &code, year.as_deref()),
            code,
            year,
        })
    }

    async fn flush_once(&self) {
        if !self.options.flush_caches || self.flushed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.cache.flush().await {
            tracing::warn!(error = %e, "could not flush bibliographic caches");
        }
    }

    /// Resolve every descriptor, returning one resolution per ordinal in
    /// ordinal order.
    pub async fn resolve(&self, descriptors: &[ReferenceDescriptor]) -> Vec<Resolution> {
        let mut reassembler = Reassembler::new(descriptors.len());
        let Some(source) = self.source.clone() else {
            for descriptor in descriptors {
                accept(&mut reassembler, descriptor.ordinal, Resolution::no_fetch());
            }
            return reassembler.finish();
        };

        self.flush_once().await;

        let (tx, mut rx) = mpsc::channel(descriptors.len().max(1));
        let mut handles = Vec::new();

        for descriptor in descriptors {
            let Some(request) = self.request_for(descriptor) else {
                tracing::trace!(ordinal = descriptor.ordinal, "rendering without lookup");
                accept(&mut reassembler, descriptor.ordinal, Resolution::no_fetch());
                continue;
            };
            tracing::trace!(
                ordinal = request.ordinal,
                key = %request.key,
                state = ?ResolutionState::Pending,
                "queued"
            );

            let tx = tx.clone();
            let source = Arc::clone(&source);
            let cache = self.cache.clone();
            let timeout = self.options.fetch_timeout;
            let today = self.today;
            handles.push(tokio::spawn(async move {
                let ordinal = request.ordinal;
                let resolution = resolve_one(request, source, cache, timeout, today).await;
                // The receiver only goes away if the coordinator is gone.
                let _ = tx.send((ordinal, resolution)).await;
            }));
        }
        drop(tx);

        while let Some((ordinal, resolution)) = rx.recv().await {
            accept(&mut reassembler, ordinal, resolution);
        }
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "resolution task did not finish");
            }
        }

        reassembler.finish()
    }
}

fn accept(reassembler: &mut Reassembler, ordinal: usize, resolution: Resolution) {
    if let Err(e) = reassembler.accept(ordinal, resolution) {
        tracing::error!(error = %e, "dropping resolution");
    }
}

async fn resolve_one(
    request: FetchRequest,
    source: Arc<dyn BibliographicSource>,
    cache: TieredCache,
    timeout: Duration,
    today: NaiveDate,
) -> Resolution {
    let lookup = cache.lookup(&request.key, today).await;
    let mut cache_errors: Vec<String> = lookup.errors.iter().map(ToString::to_string).collect();

    if let Some((entry, scope)) = lookup.hit {
        tracing::debug!(key = %request.key, scope = scope.as_str(), "resolved from cache");
        return Resolution {
            outcome: Outcome::Retrieved {
                record: entry.record,
                origin: Origin::Cache(scope),
            },
            cache_errors,
        };
    }

    tracing::debug!(
        code = %request.code,
        year = request.year.as_deref().unwrap_or(""),
        state = ?ResolutionState::Fetching,
        "fetching"
    );
    let fetched = match tokio::time::timeout(
        timeout,
        source.fetch(&request.code, request.year.as_deref()),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout {
            seconds: timeout.as_secs(),
        }),
    };

    let outcome = match fetched {
        Ok(record) => {
            let entry = CacheEntry::new(&request.key, record.clone(), today, request.year.is_some());
            cache_errors.extend(cache.store(entry).await.iter().map(ToString::to_string));
            Outcome::Retrieved {
                record,
                origin: Origin::Fetched,
            }
        }
        Err(error) => Outcome::Failed { error },
    };
    tracing::debug!(key = %request.key, state = ?outcome.state(), "fetch finished");

    Resolution {
        outcome,
        cache_errors,
    }
}
