/*
 * orchestrator.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Whole-document normalization.
 */

//! Whole-document normalization.
//!
//! ## Stages
//!
//! 1. **Structure and terms**: the passes of [`default_pipeline`]
//! 2. **Bibliography**: every `references` list is parsed, resolved through
//!    the context's resolver and merged back as `bibitem`s
//! 3. **Identifiers**: ids and references are canonicalized and made unique
//!
//! Identifiers run last because retrieved bibliographic records bring their
//! own anchors.
//!
//! ```rust
//! use standoc_core::{Orchestrator, RunContext, StandocConfig};
//!
//! # async fn example() -> standoc_core::Result<()> {
//! let mut doc = standoc_xml::parse(r#"<clause id="a:b"/>"#)?;
//! let mut ctx = RunContext::new(StandocConfig::default());
//! Orchestrator::default().normalize(&mut doc, &mut ctx).await?;
//! assert_eq!(doc.to_string(), r#"<clause id="a_b"/>"#);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use standoc_bib::{Resolver, merge_citation_list, parse_citation_list, render_resolution};
use standoc_xml::Document;

use crate::Result;
use crate::context::RunContext;
use crate::transform::{TransformPipeline, TreeTransform};
use crate::transforms::anchors::identifier_pipeline;
use crate::transforms::{
    BookmarkTransform, CalloutTransform, HeaderRowsTransform, KeyListTransform, NoteTransform,
    SnippetTransform, SubfigureTransform, SymbolCollatorTransform, TermTransform,
};

/// The structural and term passes, in execution order.
///
/// Snippets render before callouts so rendered markup takes part in callout
/// pairing.
pub fn default_pipeline() -> TransformPipeline {
    let passes: [Box<dyn TreeTransform>; 9] = [
        Box::new(SnippetTransform::new()),
        Box::new(CalloutTransform::new()),
        Box::new(KeyListTransform::new()),
        Box::new(NoteTransform::new()),
        Box::new(HeaderRowsTransform::new()),
        Box::new(SubfigureTransform::new()),
        Box::new(BookmarkTransform::new()),
        Box::new(TermTransform::new()),
        Box::new(SymbolCollatorTransform::new()),
    ];
    let mut pipeline = TransformPipeline::new();
    pipeline.extend(passes);
    pipeline
}

/// Runs every normalization stage over one document.
pub struct Orchestrator {
    pipeline: TransformPipeline,
    identifiers: TransformPipeline,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(default_pipeline())
    }
}

impl Orchestrator {
    /// Use `pipeline` for the structural stage. The identifier stage is fixed.
    pub fn new(pipeline: TransformPipeline) -> Self {
        Self {
            pipeline,
            identifiers: identifier_pipeline(),
        }
    }

    pub fn pipeline(&self) -> &TransformPipeline {
        &self.pipeline
    }

    /// Normalize `doc` in place, resolving citations with `ctx.resolver`.
    ///
    /// # Errors
    ///
    /// Only fatal conditions (a broken pass) are errors. Everything the
    /// document itself gets wrong ends up in `ctx.sink`.
    pub async fn normalize(&self, doc: &mut Document, ctx: &mut RunContext) -> Result<()> {
        let resolver = Arc::clone(&ctx.resolver);
        self.run(doc, ctx, resolver).await
    }

    /// Normalize `doc` without fetching: every citation renders from its own
    /// text.
    pub async fn normalize_offline(&self, doc: &mut Document, ctx: &mut RunContext) -> Result<()> {
        self.run(doc, ctx, Arc::new(Resolver::offline())).await
    }

    async fn run(&self, doc: &mut Document, ctx: &mut RunContext, resolver: Arc<Resolver>) -> Result<()> {
        self.pipeline.execute(doc, ctx)?;
        resolve_bibliography(doc, ctx, &resolver).await?;
        self.identifiers.execute(doc, ctx)?;
        tracing::debug!(diagnostics = ctx.sink.len(), "Normalization finished");
        Ok(())
    }
}

async fn resolve_bibliography(
    doc: &mut Document,
    ctx: &mut RunContext,
    resolver: &Resolver,
) -> Result<()> {
    let root = doc.root();
    for references in doc.select_str(root, "//references")? {
        let descriptors = parse_citation_list(doc, references);
        if descriptors.is_empty() {
            continue;
        }
        tracing::info!(
            citations = descriptors.len(),
            offline = resolver.is_offline(),
            "Resolving citations"
        );

        let resolutions = resolver.resolve(&descriptors).await;
        let bibitems: Vec<_> = descriptors
            .iter()
            .zip(&resolutions)
            .map(|(descriptor, resolution)| {
                render_resolution(doc, descriptor, resolution, &mut ctx.sink)
            })
            .collect();
        merge_citation_list(doc, references, &bibitems);
    }
    Ok(())
}
