/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Citation parsing and bibliographic resolution for standoc.
 */

//! Bibliographic resolution for standoc.
//!
//! A citation list (`references` element) is parsed into
//! [`ReferenceDescriptor`]s, each tagged with the grammar it matched. The
//! [`Resolver`] looks every fetchable descriptor up concurrently, through a
//! [`TieredCache`] of local and global scopes, and the [`Reassembler`] puts
//! the results back in citation order. The [`render`] functions then turn each
//! descriptor and its outcome into a `bibitem` element.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use standoc_bib::{
//!     CacheScopes, MemoryCacheStore, Resolver, ResolverOptions, StaticSource, TieredCache,
//!     parse_citation_list,
//! };
//!
//! # async fn example() {
//! let doc = standoc_xml::parse(
//!     r#"<references><ul><li><ref id="iso1">[ISO 1:2002]</ref> Tolerances</li></ul></references>"#,
//! ).unwrap();
//! let descriptors = parse_citation_list(&doc, doc.root());
//!
//! let source = StaticSource::new().with_record("ISO 1", Some("2002"), "<bibitem/>");
//! let cache = TieredCache::new(CacheScopes::GlobalOnly, None, Some(Box::new(MemoryCacheStore::new())));
//! let resolver = Resolver::new(Some(Arc::new(source)), cache, ResolverOptions::default());
//! let resolutions = resolver.resolve(&descriptors).await;
//! assert_eq!(resolutions.len(), 1);
//! # }
//! ```

pub mod cache;
pub mod descriptor;
pub mod error;
pub mod reassembler;
pub mod render;
pub mod resolver;
pub mod source;

pub use cache::{
    CacheEntry, CacheLookup, CacheScopes, CacheStore, DEFAULT_STALENESS_DAYS, FileCacheStore, MemoryCacheStore,
    Scope, TieredCache,
};
pub use descriptor::{
    AllPartsRef, CitationItem, CodeKind, DatedRef, GenericRef, Grammar, MalformedRef, RefCode,
    ReferenceDescriptor, UNDATED, UndatedRef, citation_items, parse_citation_list,
};
pub use error::{CacheError, FetchError, ReassemblyError};
pub use reassembler::{Reassembler, merge_citation_list};
pub use render::render_resolution;
pub use resolver::{
    DEFAULT_FETCH_TIMEOUT, Origin, Outcome, PrefixTable, Resolution, ResolutionState, Resolver,
    ResolverOptions, cache_key,
};
pub use source::{BibliographicSource, DirectorySource, Record, StaticSource};
