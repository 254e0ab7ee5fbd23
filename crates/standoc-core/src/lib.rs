/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Tree normalization for standoc.
 */

//! Tree normalization for standoc
//!
//! This crate takes the raw element tree a markup parser produced for a
//! standards document and rewrites it into canonical form: structural
//! cleanup, term designations, symbol lists, resolved citations and valid,
//! unique identifiers.
//!
//! # Architecture
//!
//! - [`TreeTransform`] - One normalization pass over a [`Document`](standoc_xml::Document)
//! - [`TransformPipeline`] - An ordered list of passes
//! - [`RunContext`] - Diagnostics, id generator, configuration and resolver
//!   shared by the passes of one run
//! - [`Orchestrator`] - Runs the structural passes, bibliographic resolution
//!   and the identifier passes in order
//! - [`StandocConfig`] - Settings read from `_standoc.yml`
//!
//! # Example
//!
//! ```ignore
//! use standoc_core::{Orchestrator, RunContext, StandocConfig};
//!
//! let (_, config) = StandocConfig::discover(input_dir)?.unwrap_or_default();
//! let resolver = config.bibliography.build_resolver(input_dir);
//! let mut ctx = RunContext::new(config).with_resolver(resolver);
//!
//! let mut doc = standoc_xml::parse(&source)?;
//! Orchestrator::default().normalize(&mut doc, &mut ctx).await?;
//! for line in ctx.sink.to_text() {
//!     eprintln!("{line}");
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod transform;
pub mod transforms;

// Re-export commonly used types
pub use config::{AnchorsConfig, BibliographyConfig, StandocConfig, TermsConfig};
pub use context::{IdGenerator, MarkupSnippetRenderer, RunContext, SnippetError, SnippetRenderer};
pub use error::{Result, StandocError};
pub use orchestrator::{Orchestrator, default_pipeline};
pub use transform::{TransformPipeline, TreeTransform};
