/*
 * cache.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Local and global bibliographic caches.
 */

//! Tiered bibliographic cache.
//!
//! Two scopes exist: a global cache shared across documents and a local cache
//! next to the document. Each scope is a [`CacheStore`] behind its own
//! `tokio::sync::Mutex`. Lookups read local first. The local entry is
//! authoritative when both scopes hold the key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::CacheError;

/// Default age at which undated entries are refetched.
pub const DEFAULT_STALENESS_DAYS: i64 = 90;

/// A cached bibliographic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    /// The record as XML text.
    pub record: String,
    pub fetched: NaiveDate,
    /// Whether the lookup named a concrete year. Dated entries never expire.
    pub dated: bool,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, record: impl Into<String>, fetched: NaiveDate, dated: bool) -> Self {
        Self {
            key: key.into(),
            record: record.into(),
            fetched,
            dated,
        }
    }

    pub fn is_fresh(&self, today: NaiveDate, staleness_days: i64) -> bool {
        self.dated || (today - self.fetched).num_days() < staleness_days
    }
}

/// Storage behind one cache scope.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    async fn put(&mut self, key: &str, entry: CacheEntry) -> Result<(), CacheError>;

    async fn clear(&mut self) -> Result<(), CacheError>;
}

/// In-memory store for tests and throwaway runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryCacheStore {
    entries: HashMap<String, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, entry: CacheEntry) -> Self {
        self.entries.insert(entry.key.clone(), entry);
        self
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.get(key).cloned())
    }

    async fn put(&mut self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }
}

/// A directory holding one JSON file per key.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }
}

/// Encode a key as a portable file stem. ASCII alphanumerics, `-` and `.`
/// pass through, everything else becomes `_XX` per UTF-8 byte.
pub(crate) fn file_stem(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{:02X}", byte));
        }
    }
    out
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(key);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| CacheError::Corrupt { path, source })
    }

    async fn put(&mut self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CacheError::Io {
                path: self.dir.clone(),
                source,
            })?;
        let path = self.entry_path(key);
        let json = serde_json::to_string_pretty(&entry).map_err(|source| CacheError::Corrupt {
            path: path.clone(),
            source,
        })?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| CacheError::Io { path, source })
    }

    async fn clear(&mut self) -> Result<(), CacheError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };
        loop {
            let next = entries.next_entry().await.map_err(|source| CacheError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let Some(entry) = next else { break };
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|source| CacheError::Io { path, source })?;
            }
        }
        Ok(())
    }
}

/// What [`TieredCache::lookup`] found, and the scope errors met on the way.
#[derive(Debug, Default)]
pub struct CacheLookup {
    pub hit: Option<(CacheEntry, Scope)>,
    pub errors: Vec<CacheError>,
}

/// Which cache scopes are active for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScopes {
    LocalOnly,
    GlobalOnly,
    Both,
    None,
}

impl CacheScopes {
    /// Derive the scopes from the user-facing options.
    ///
    /// `no_cache` wins over everything. `local_cache_only` drops the global
    /// scope; `local_cache` adds a local scope next to the global one.
    pub fn from_options(no_cache: bool, local_cache: bool, local_cache_only: bool) -> Self {
        match (no_cache, local_cache, local_cache_only) {
            (true, _, _) => CacheScopes::None,
            (false, _, true) => CacheScopes::LocalOnly,
            (false, true, false) => CacheScopes::Both,
            (false, false, false) => CacheScopes::GlobalOnly,
        }
    }

    pub fn has_local(self) -> bool {
        match self {
            CacheScopes::LocalOnly | CacheScopes::Both => true,
            CacheScopes::GlobalOnly | CacheScopes::None => false,
        }
    }

    pub fn has_global(self) -> bool {
        match self {
            CacheScopes::GlobalOnly | CacheScopes::Both => true,
            CacheScopes::LocalOnly | CacheScopes::None => false,
        }
    }
}

/// The scope a hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    Global,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Global => "global",
        }
    }
}

type SharedStore = Arc<Mutex<Box<dyn CacheStore>>>;

/// The active scopes, shared between resolution tasks.
#[derive(Clone)]
pub struct TieredCache {
    local: Option<SharedStore>,
    global: Option<SharedStore>,
    staleness_days: i64,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("local", &self.local.is_some())
            .field("global", &self.global.is_some())
            .field("staleness_days", &self.staleness_days)
            .finish()
    }
}

impl TieredCache {
    /// A cache with no active scope: every lookup misses.
    pub fn disabled() -> Self {
        Self {
            local: None,
            global: None,
            staleness_days: DEFAULT_STALENESS_DAYS,
        }
    }

    /// Build from the scopes that should be active. Stores for inactive
    /// scopes are dropped.
    pub fn new(
        scopes: CacheScopes,
        local: Option<Box<dyn CacheStore>>,
        global: Option<Box<dyn CacheStore>>,
    ) -> Self {
        let wrap = |store: Box<dyn CacheStore>| Arc::new(Mutex::new(store));
        Self {
            local: local.filter(|_| scopes.has_local()).map(wrap),
            global: global.filter(|_| scopes.has_global()).map(wrap),
            staleness_days: DEFAULT_STALENESS_DAYS,
        }
    }

    pub fn with_staleness_days(mut self, days: i64) -> Self {
        self.staleness_days = days;
        self
    }

    pub fn staleness_days(&self) -> i64 {
        self.staleness_days
    }

    pub fn scopes(&self) -> CacheScopes {
        match (self.local.is_some(), self.global.is_some()) {
            (true, true) => CacheScopes::Both,
            (true, false) => CacheScopes::LocalOnly,
            (false, true) => CacheScopes::GlobalOnly,
            (false, false) => CacheScopes::None,
        }
    }

    /// Find a fresh entry, local first.
    ///
    /// A global hit is copied into the local scope when one is active. The
    /// global scope is never written here. A failing scope is skipped and
    /// its error reported alongside whatever the other scope returned.
    pub async fn lookup(&self, key: &str, today: NaiveDate) -> CacheLookup {
        let mut errors = Vec::new();

        if let Some(local) = &self.local {
            match local.lock().await.get(key).await {
                Ok(Some(entry)) if entry.is_fresh(today, self.staleness_days) => {
                    tracing::trace!(key, scope = "local", "cache hit");
                    return CacheLookup {
                        hit: Some((entry, Scope::Local)),
                        errors,
                    };
                }
                Ok(Some(entry)) => {
                    tracing::debug!(key, scope = "local", fetched = %entry.fetched, "stale cache entry");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(key, scope = "local", error = %e, "cache read failed");
                    errors.push(e);
                }
            }
        }

        if let Some(global) = &self.global {
            match global.lock().await.get(key).await {
                Ok(Some(entry)) if entry.is_fresh(today, self.staleness_days) => {
                    tracing::trace!(key, scope = "global", "cache hit");
                    if let Some(local) = &self.local {
                        if let Err(e) = local.lock().await.put(key, entry.clone()).await {
                            tracing::warn!(key, scope = "local", error = %e, "cache write failed");
                            errors.push(e);
                        }
                    }
                    return CacheLookup {
                        hit: Some((entry, Scope::Global)),
                        errors,
                    };
                }
                Ok(Some(entry)) => {
                    tracing::debug!(key, scope = "global", fetched = %entry.fetched, "stale cache entry");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(key, scope = "global", error = %e, "cache read failed");
                    errors.push(e);
                }
            }
        }

        tracing::trace!(key, "cache miss");
        CacheLookup { hit: None, errors }
    }

    /// Write `entry` to every active scope, returning the errors of the
    /// scopes that failed.
    pub async fn store(&self, entry: CacheEntry) -> Vec<CacheError> {
        let mut errors = Vec::new();
        for store in [&self.local, &self.global].into_iter().flatten() {
            if let Err(e) = store.lock().await.put(&entry.key, entry.clone()).await {
                tracing::warn!(key = %entry.key, error = %e, "cache write failed");
                errors.push(e);
            }
        }
        errors
    }

    /// Clear every active scope.
    pub async fn flush(&self) -> Result<(), CacheError> {
        for store in [&self.local, &self.global].into_iter().flatten() {
            store.lock().await.clear().await?;
        }
        tracing::debug!(scopes = ?self.scopes(), "flushed bibliographic caches");
        Ok(())
    }

    /// Read one scope directly, bypassing freshness.
    pub async fn peek(&self, scope: Scope, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let store = match scope {
            Scope::Local => &self.local,
            Scope::Global => &self.global,
        };
        match store {
            Some(store) => store.lock().await.get(key).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_freshness() {
        let today = day(2024, 4, 1);
        let undated = CacheEntry::new("ISO(ISO 1)", "<bibitem/>", today - chrono::Days::new(90), false);
        assert!(!undated.is_fresh(today, 90));
        let undated = CacheEntry::new("ISO(ISO 1)", "<bibitem/>", today - chrono::Days::new(89), false);
        assert!(undated.is_fresh(today, 90));
        let dated = CacheEntry::new("ISO(ISO 1:2001)", "<bibitem/>", day(2001, 1, 1), true);
        assert!(dated.is_fresh(today, 90));
    }

    #[test]
    fn test_scopes_from_options() {
        assert_eq!(CacheScopes::from_options(true, true, true), CacheScopes::None);
        assert_eq!(CacheScopes::from_options(false, false, true), CacheScopes::LocalOnly);
        assert_eq!(CacheScopes::from_options(false, true, false), CacheScopes::Both);
        assert_eq!(CacheScopes::from_options(false, false, false), CacheScopes::GlobalOnly);
    }

    #[test]
    fn test_file_stem_is_portable() {
        assert_eq!(file_stem("ISO(ISO 1:2001)"), "ISO_28ISO_201_3A2001_29");
        assert_ne!(file_stem("a b"), file_stem("a_b"));
    }

    #[tokio::test]
    async fn test_local_wins_and_global_untouched() {
        let today = day(2024, 4, 1);
        let local = MemoryCacheStore::new().with_entry(CacheEntry::new("K", "A", today, true));
        let global = MemoryCacheStore::new().with_entry(CacheEntry::new("K", "B", today, true));
        let cache = TieredCache::new(CacheScopes::Both, Some(Box::new(local)), Some(Box::new(global)));

        let (entry, scope) = cache.lookup("K", today).await.hit.unwrap();
        assert_eq!(entry.record, "A");
        assert_eq!(scope, Scope::Local);
        assert_eq!(cache.peek(Scope::Global, "K").await.unwrap().unwrap().record, "B");
    }

    #[tokio::test]
    async fn test_global_hit_copied_to_local() {
        let today = day(2024, 4, 1);
        let global = MemoryCacheStore::new().with_entry(CacheEntry::new("K", "B", today, true));
        let cache = TieredCache::new(
            CacheScopes::Both,
            Some(Box::new(MemoryCacheStore::new())),
            Some(Box::new(global)),
        );

        let (_, scope) = cache.lookup("K", today).await.hit.unwrap();
        assert_eq!(scope, Scope::Global);
        assert_eq!(cache.peek(Scope::Local, "K").await.unwrap().unwrap().record, "B");
    }

    #[tokio::test]
    async fn test_inactive_scope_is_dropped() {
        let cache = TieredCache::new(
            CacheScopes::LocalOnly,
            Some(Box::new(MemoryCacheStore::new())),
            Some(Box::new(MemoryCacheStore::new())),
        );
        assert_eq!(cache.scopes(), CacheScopes::LocalOnly);
        let errors = cache
            .store(CacheEntry::new("K", "X", day(2024, 1, 1), true))
            .await;
        assert!(errors.is_empty());
        assert!(cache.peek(Scope::Global, "K").await.unwrap().is_none());
    }

    /// A store whose every operation fails with an I/O error.
    struct BrokenStore;

    fn broken() -> CacheError {
        CacheError::Io {
            path: PathBuf::from("/ro"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        }
    }

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<CacheEntry>, CacheError> {
            Err(broken())
        }

        async fn put(&mut self, _key: &str, _entry: CacheEntry) -> Result<(), CacheError> {
            Err(broken())
        }

        async fn clear(&mut self) -> Result<(), CacheError> {
            Err(broken())
        }
    }

    #[tokio::test]
    async fn test_broken_local_scope_keeps_global_hit() {
        let today = day(2024, 4, 1);
        let global = MemoryCacheStore::new().with_entry(CacheEntry::new("K", "B", today, true));
        let cache = TieredCache::new(CacheScopes::Both, Some(Box::new(BrokenStore)), Some(Box::new(global)));

        let lookup = cache.lookup("K", today).await;
        let (entry, scope) = lookup.hit.unwrap();
        assert_eq!(entry.record, "B");
        assert_eq!(scope, Scope::Global);
        // one failed read, one failed copy
        assert_eq!(lookup.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_broken_scope_does_not_block_the_other_write() {
        let cache = TieredCache::new(
            CacheScopes::Both,
            Some(Box::new(BrokenStore)),
            Some(Box::new(MemoryCacheStore::new())),
        );
        let errors = cache
            .store(CacheEntry::new("K", "X", day(2024, 1, 1), true))
            .await;
        assert_eq!(errors.len(), 1);
        assert_eq!(cache.peek(Scope::Global, "K").await.unwrap().unwrap().record, "X");
    }

    #[tokio::test]
    async fn test_file_store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileCacheStore::new(dir.path().join("cache"));
        let entry = CacheEntry::new("IETF(RFC 7231)", "<bibitem id=\"x\"/>", day(2024, 2, 3), false);

        assert!(store.get("IETF(RFC 7231)").await.unwrap().is_none());
        store.put("IETF(RFC 7231)", entry.clone()).await.unwrap();
        assert_eq!(store.get("IETF(RFC 7231)").await.unwrap(), Some(entry));

        store.clear().await.unwrap();
        assert!(store.get("IETF(RFC 7231)").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());
        std::fs::write(store.entry_path("K"), "not json").unwrap();
        assert!(matches!(store.get("K").await, Err(CacheError::Corrupt { .. })));
    }
}
