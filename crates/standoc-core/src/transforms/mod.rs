/*
 * transforms/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Normalization passes.
 */

//! Normalization passes.
//!
//! - [`blocks`] - key and where lists, notes, subfigures, bookmarks, table header rows
//! - [`sourcecode`] - embedded snippets and callout/annotation pairing
//! - [`terms`] - term designations, metadata lists and definitions
//! - [`symbols`] - collation of symbol lists
//! - [`anchors`] - identifier canonicalization and uniqueness
//!
//! Every pass implements [`TreeTransform`](crate::transform::TreeTransform)
//! and leaves already-normalized input unchanged.

pub mod anchors;
pub mod blocks;
pub mod sourcecode;
pub mod symbols;
pub mod terms;

pub use anchors::{IdentifierTransform, UniqueIdTransform, XrefTargetTransform, to_ncname};
pub use blocks::{
    BookmarkTransform, HeaderRowsTransform, KeyListTransform, NoteTransform, SubfigureTransform,
};
pub use sourcecode::{CalloutTransform, SnippetTransform};
pub use symbols::{SymbolCollatorTransform, collation_key};
pub use terms::TermTransform;

use standoc_xml::{Document, NodeId};

use crate::Result;

/// Run `step` until it reports that nothing changed.
pub(crate) fn until_fixed_point(mut step: impl FnMut() -> Result<bool>) -> Result<()> {
    while step()? {}
    Ok(())
}

/// Stable-sort the children of `parent` in groups.
///
/// A group starts at each element accepted by `starts_group` and runs up to
/// the next one. Children before the first group stay in front. Nothing is
/// touched when the groups are already in order.
pub(crate) fn sort_groups<K: Ord>(
    doc: &mut Document,
    parent: NodeId,
    starts_group: impl Fn(&Document, NodeId) -> bool,
    key: impl Fn(&Document, NodeId) -> K,
) {
    let mut head = Vec::new();
    let mut groups: Vec<(K, Vec<NodeId>)> = Vec::new();
    for child in doc.children(parent) {
        if doc.is_element(*child) && starts_group(doc, *child) {
            groups.push((key(doc, *child), vec![*child]));
        } else if let Some((_, group)) = groups.last_mut() {
            group.push(*child);
        } else {
            head.push(*child);
        }
    }

    if groups.windows(2).all(|w| w[0].0 <= w[1].0) {
        return;
    }
    groups.sort_by(|a, b| a.0.cmp(&b.0));
    let ordered: Vec<NodeId> = head
        .into_iter()
        .chain(groups.into_iter().flat_map(|(_, nodes)| nodes))
        .collect();
    doc.set_children(parent, &ordered);
}

#[cfg(test)]
pub(crate) mod testing {
    use standoc_xml::Document;

    use crate::config::StandocConfig;
    use crate::context::{IdGenerator, RunContext};
    use crate::transform::TreeTransform;

    pub fn ctx() -> RunContext {
        RunContext::new(StandocConfig::default()).with_ids(IdGenerator::sequential())
    }

    /// Run one transform over `xml`, returning the serialized result.
    pub fn run_with(transform: &dyn TreeTransform, xml: &str, ctx: &mut RunContext) -> String {
        let mut doc: Document = standoc_xml::parse(xml).unwrap();
        transform.transform(&mut doc, ctx).unwrap();
        doc.to_string()
    }

    pub fn run(transform: &dyn TreeTransform, xml: &str) -> String {
        run_with(transform, xml, &mut ctx())
    }

    /// Running the transform on its own output changes nothing.
    pub fn assert_idempotent(transform: &dyn TreeTransform, xml: &str) {
        let once = run(transform, xml);
        let twice = run(transform, &once);
        assert_eq!(once, twice, "{} is not idempotent", transform.name());
    }
}
