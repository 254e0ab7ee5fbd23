//! Error reporting and diagnostic messages for standoc.
//!
//! Every recoverable condition found while normalizing a document is recorded
//! as a [`DiagnosticMessage`] in a [`DiagnosticCollector`] rather than raised.
//! Messages follow a tidyverse-style structure:
//!
//! - a short title and an optional catalog code (`S-<subsystem>-<number>`)
//! - a problem statement
//! - bulleted details (error, info, note)
//! - hints
//!
//! Each message may carry the [`Category`] it was filed under and the
//! serialized node it concerns.
//!
//! # Example
//!
//! ```
//! use standoc_error_reporting::{Category, DiagnosticCollector, DiagnosticMessageBuilder};
//!
//! let mut sink = DiagnosticCollector::new();
//! sink.add(
//!     Category::Anchors,
//!     Some("<clause id=\"a_b\"/>".to_string()),
//!     DiagnosticMessageBuilder::warning("Identifier Normalised")
//!         .with_code("S-1-1")
//!         .problem("normalised identifier in <clause id=\"a_b\"/> from a:b")
//!         .build(),
//! );
//!
//! assert_eq!(sink.len(), 1);
//! assert!(!sink.has_errors());
//! ```

pub mod diagnostic;

// Error code catalog
pub mod catalog;

pub mod builder;

// Macros for convenient error creation
pub mod macros;

pub mod collector;

pub use builder::DiagnosticMessageBuilder;
pub use catalog::{ERROR_CATALOG, ErrorCodeInfo, get_docs_url, get_error_info, get_subsystem};
pub use collector::DiagnosticCollector;
pub use diagnostic::{
    Category, DetailItem, DetailKind, DiagnosticKind, DiagnosticMessage, MessageContent,
};
