//! Mutable XML document trees for standoc.
//!
//! This crate wraps [`quick-xml`] to build an arena-backed [`Document`]: every
//! node lives in one vector and is addressed by a copyable [`NodeId`], so that
//! transforms can hold handles to many nodes while restructuring the tree.
//!
//! # Overview
//!
//! The main types are:
//! - [`Document`]: the node arena, with navigation and mutation methods
//! - [`NodeId`]: a handle to a node in a document
//! - [`NodeKind`]: an element or a text run
//! - [`Query`]: a parsed XPath-like selection expression
//!
//! # Example
//!
//! ```rust
//! use standoc_xml::parse;
//!
//! let mut doc = parse(r#"<clause id="a b"><note>N</note></clause>"#).unwrap();
//! let notes = doc.select_str(doc.root(), ".//note").unwrap();
//! assert_eq!(notes.len(), 1);
//!
//! let root = doc.root();
//! doc.set_attr(root, "id", "a_b");
//! assert_eq!(doc.to_string(), r#"<clause id="a_b"><note>N</note></clause>"#);
//! ```
//!
//! Markup produced elsewhere, such as a retrieved bibliographic record, can be
//! grafted in with [`Document::parse_fragment`] or [`Document::import`].

pub mod error;
pub mod parser;
pub mod query;
pub mod tree;
pub mod writer;

// Re-export main types
pub use error::{Error, QueryError, Result};
pub use parser::parse;
pub use query::Query;
pub use tree::{Ancestors, Document, Element, NodeId, NodeKind};
