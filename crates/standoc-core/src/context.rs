/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Per-run state passed to every pass.
 */

//! Run context.
//!
//! Passes share nothing but the tree and a [`RunContext`]: the diagnostics
//! sink, the correlation-id generator, the configuration, the bibliographic
//! resolver and the snippet renderer.

use std::sync::Arc;

use standoc_bib::Resolver;
use standoc_error_reporting::DiagnosticCollector;
use thiserror::Error;

use crate::config::StandocConfig;

/// Generator for correlation ids such as callout/annotation pairs.
#[derive(Debug, Clone, Default)]
pub enum IdGenerator {
    /// `_` followed by a random UUID.
    #[default]
    Uuid,
    /// `_1`, `_2`, ... for reproducible output.
    Sequential { next: u64 },
}

impl IdGenerator {
    pub fn sequential() -> Self {
        IdGenerator::Sequential { next: 1 }
    }

    pub fn next_id(&mut self) -> String {
        match self {
            IdGenerator::Uuid => format!("_{}", uuid::Uuid::new_v4()),
            IdGenerator::Sequential { next } => {
                let id = format!("_{}", next);
                *next += 1;
                id
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SnippetError(pub String);

/// Renders raw snippet markup embedded in source code blocks.
pub trait SnippetRenderer: Send + Sync {
    /// Render `markup`, returning the markup of the replacement fragment.
    fn render(&self, markup: &str) -> Result<String, SnippetError>;
}

/// Treats the snippet as already-converted markup: it must be a well-formed
/// XML fragment and is passed through.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkupSnippetRenderer;

impl SnippetRenderer for MarkupSnippetRenderer {
    fn render(&self, markup: &str) -> Result<String, SnippetError> {
        let mut scratch = standoc_xml::Document::new("snippet");
        let nodes = scratch
            .parse_fragment(markup)
            .map_err(|e| SnippetError(e.to_string()))?;
        Ok(nodes.iter().map(|n| scratch.to_xml(*n)).collect())
    }
}

/// Mutable state for one normalization run.
pub struct RunContext {
    pub sink: DiagnosticCollector,
    pub ids: IdGenerator,
    pub config: StandocConfig,
    pub resolver: Arc<Resolver>,
    pub snippets: Box<dyn SnippetRenderer>,
}

impl RunContext {
    /// A context with an offline resolver and the markup snippet renderer.
    pub fn new(config: StandocConfig) -> Self {
        Self {
            sink: DiagnosticCollector::new(),
            ids: IdGenerator::default(),
            config,
            resolver: Arc::new(Resolver::offline()),
            snippets: Box::new(MarkupSnippetRenderer),
        }
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_ids(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_snippet_renderer(mut self, renderer: Box<dyn SnippetRenderer>) -> Self {
        self.snippets = renderer;
        self
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("diagnostics", &self.sink.len())
            .field("ids", &self.ids)
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let mut ids = IdGenerator::sequential();
        assert_eq!(ids.next_id(), "_1");
        assert_eq!(ids.next_id(), "_2");
    }

    #[test]
    fn test_uuid_ids_are_ncnames() {
        let mut ids = IdGenerator::Uuid;
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert!(a.starts_with('_'));
        assert_eq!(a.len(), 37);
    }

    #[test]
    fn test_markup_renderer() {
        let out = MarkupSnippetRenderer.render("<em>x</em> y").unwrap();
        assert_eq!(out, "<em>x</em> y");
        assert!(MarkupSnippetRenderer.render("<em>x").is_err());
    }
}
