/*
 * blocks.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Structural cleanup of block elements.
 */

//! Structural cleanup of block elements.
//!
//! Each rule is a tree-shape predicate applied until nothing matches:
//!
//! - [`KeyListTransform`] - key lists into tables and figures, where-lists into formulas
//! - [`NoteTransform`] - notes into tables and into the block they annotate
//! - [`SubfigureTransform`] - examples holding only figures become figures
//! - [`BookmarkTransform`] - leading bookmarks become list item ids
//! - [`HeaderRowsTransform`] - `headerrows` into a `thead`

use once_cell::sync::Lazy;
use regex::Regex;
use standoc_xml::{Document, NodeId};

use crate::Result;
use crate::context::RunContext;
use crate::transform::TreeTransform;
use crate::transforms::until_fixed_point;

static KEY_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*key\W*$").expect("key marker pattern"));
static WHERE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*where\W*$").expect("where marker pattern"));

/// Blocks a following note is moved into.
const ELEMS_ALLOW_NOTES: &[&str] = &["p", "formula", "ol", "ul", "dl", "figure"];

/// Moves explanatory definition lists into the block they explain.
///
/// A `dl key="true"` right after a table or figure goes inside it. So does a
/// `dl` introduced by a "Key" paragraph, which is dropped. Formulas take
/// lists introduced by "where" in the same way.
pub struct KeyListTransform;

impl KeyListTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KeyListTransform {
    fn default() -> Self {
        Self::new()
    }
}

fn absorb_key_list(doc: &mut Document, host: NodeId, marker: &Regex) -> bool {
    let Some(next) = doc.next_element_sibling(host) else {
        return false;
    };
    if doc.is_named(next, "dl") && doc.attr_is_true(next, "key") {
        doc.append_child(host, next);
        return true;
    }
    if doc.is_named(next, "p") && marker.is_match(&doc.text_content(next)) {
        if let Some(dl) = doc.next_element_sibling(next).filter(|n| doc.is_named(*n, "dl")) {
            doc.set_attr(dl, "key", "true");
            doc.append_child(host, dl);
            doc.detach(next);
            return true;
        }
    }
    false
}

impl TreeTransform for KeyListTransform {
    fn name(&self) -> &str {
        "key-lists"
    }

    fn transform(&self, doc: &mut Document, _ctx: &mut RunContext) -> Result<()> {
        let root = doc.root();
        until_fixed_point(|| {
            let mut changed = false;
            for host in doc.select_str(root, "//table | //figure")? {
                changed |= absorb_key_list(doc, host, &KEY_MARKER);
            }
            for host in doc.select_str(root, "//formula")? {
                changed |= absorb_key_list(doc, host, &WHERE_MARKER);
            }
            Ok(changed)
        })
    }
}

/// Attaches notes to the block they annotate.
///
/// A note right after a table moves to the end of the table. Otherwise a note
/// with a later non-note sibling moves into its preceding block when that is
/// a paragraph, list, formula or figure. Notes marked `keep-separate="true"`
/// stay where they are and keep the marker. Any other `keep-separate` value
/// is dropped.
pub struct NoteTransform;

impl NoteTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoteTransform {
    fn default() -> Self {
        Self::new()
    }
}

fn has_later_non_note(doc: &Document, note: NodeId) -> bool {
    let mut next = doc.next_element_sibling(note);
    while let Some(sibling) = next {
        if !doc.is_named(sibling, "note") {
            return true;
        }
        next = doc.next_element_sibling(sibling);
    }
    false
}

impl TreeTransform for NoteTransform {
    fn name(&self) -> &str {
        "notes"
    }

    fn transform(&self, doc: &mut Document, _ctx: &mut RunContext) -> Result<()> {
        let root = doc.root();

        until_fixed_point(|| {
            let mut changed = false;
            for table in doc.select_str(root, "//table")? {
                let Some(next) = doc.next_element_sibling(table) else {
                    continue;
                };
                if doc.is_named(next, "note") && !doc.attr_is_true(next, "keep-separate") {
                    doc.remove_attr(next, "keep-separate");
                    doc.append_child(table, next);
                    changed = true;
                }
            }
            Ok(changed)
        })?;

        until_fixed_point(|| {
            let mut changed = false;
            for note in doc.select_str(root, "//note")? {
                if doc.attr_is_true(note, "keep-separate")
                    || doc.has_ancestor_named(note, "table")
                    || !has_later_non_note(doc, note)
                {
                    continue;
                }
                let Some(prev) = doc.previous_element_sibling(note) else {
                    continue;
                };
                if doc.is_named_any(prev, ELEMS_ALLOW_NOTES) {
                    doc.append_child(prev, note);
                    changed = true;
                }
            }
            Ok(changed)
        })?;

        // A separate note keeps its marker so the next run leaves it alone.
        for note in doc.select_str(root, "//note[@keep-separate] | //termnote[@keep-separate]")? {
            if !doc.attr_is_true(note, "keep-separate") {
                doc.remove_attr(note, "keep-separate");
            }
        }
        Ok(())
    }
}

/// Renames an `example` holding only figures (and optionally a `name`) to
/// `figure`, making its figures subfigures.
pub struct SubfigureTransform;

impl SubfigureTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SubfigureTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeTransform for SubfigureTransform {
    fn name(&self) -> &str {
        "subfigures"
    }

    fn transform(&self, doc: &mut Document, _ctx: &mut RunContext) -> Result<()> {
        let root = doc.root();
        for example in doc.select_str(root, "//example[figure]")? {
            let only_figures = doc
                .element_children(example)
                .into_iter()
                .all(|c| doc.is_named_any(c, &["figure", "name"]));
            if only_figures {
                doc.rename(example, "figure");
            }
        }
        Ok(())
    }
}

/// Moves the id of a leading empty `bookmark` onto its list item.
///
/// Applies to `li` and to `dt` without an id, when the bookmark is the first
/// element child (or the first element child of a leading `p`) and nothing
/// but whitespace precedes it.
pub struct BookmarkTransform;

impl BookmarkTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BookmarkTransform {
    fn default() -> Self {
        Self::new()
    }
}

/// The first element child of `id`, provided only whitespace precedes it.
fn leading_element(doc: &Document, id: NodeId) -> Option<NodeId> {
    for child in doc.children(id) {
        if doc.is_element(*child) {
            return Some(*child);
        }
        if doc.text(*child).is_some_and(|t| !t.trim().is_empty()) {
            return None;
        }
    }
    None
}

fn leading_bookmark(doc: &Document, item: NodeId) -> Option<NodeId> {
    let first = leading_element(doc, item)?;
    let candidate = if doc.is_named(first, "p") {
        leading_element(doc, first)?
    } else {
        first
    };
    (doc.is_named(candidate, "bookmark") && doc.is_blank(candidate) && doc.has_attr(candidate, "id"))
        .then_some(candidate)
}

/// Drop whitespace left at the start of `id` by a removed bookmark.
fn strip_initial_space(doc: &mut Document, id: NodeId) {
    let Some(first) = doc.children(id).first().copied() else {
        return;
    };
    let Some(text) = doc.text(first).map(str::to_string) else {
        return;
    };
    if text.trim().is_empty() {
        doc.detach(first);
    } else if let Some(rest) = text.strip_prefix(' ') {
        doc.set_text(first, rest);
    }
}

impl TreeTransform for BookmarkTransform {
    fn name(&self) -> &str {
        "bookmarks"
    }

    fn transform(&self, doc: &mut Document, _ctx: &mut RunContext) -> Result<()> {
        let root = doc.root();
        for item in doc.select_str(root, "//li | //dt[not(@id)]")? {
            let Some(bookmark) = leading_bookmark(doc, item) else {
                continue;
            };
            let Some(id) = doc.remove_attr(bookmark, "id") else {
                continue;
            };
            let parent = doc.parent(bookmark);
            doc.detach(bookmark);
            if let Some(parent) = parent {
                strip_initial_space(doc, parent);
            }
            doc.set_attr(item, "id", id);
        }
        Ok(())
    }
}

/// Moves the first `headerrows` rows of a table body into a `thead`, turning
/// their cells into header cells.
pub struct HeaderRowsTransform;

impl HeaderRowsTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HeaderRowsTransform {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_thead(doc: &mut Document, table: NodeId) -> NodeId {
    if let Some(thead) = doc.first_child_named(table, "thead") {
        return thead;
    }
    let thead = doc.create_element("thead");
    match doc.first_child_named(table, "name") {
        Some(name) => doc.insert_after(name, thead),
        None => doc.prepend_child(table, thead),
    }
    thead
}

impl TreeTransform for HeaderRowsTransform {
    fn name(&self) -> &str {
        "header-rows"
    }

    fn transform(&self, doc: &mut Document, _ctx: &mut RunContext) -> Result<()> {
        let root = doc.root();
        for table in doc.select_str(root, "//table[@headerrows]")? {
            let wanted = doc
                .remove_attr(table, "headerrows")
                .and_then(|n| n.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if wanted == 0 {
                continue;
            }
            let thead = insert_thead(doc, table);
            let have = doc.children_named(thead, "tr").len();
            let body_rows = doc
                .first_child_named(table, "tbody")
                .map(|tbody| doc.children_named(tbody, "tr"))
                .unwrap_or_default();
            for row in body_rows.into_iter().take(wanted.saturating_sub(have)) {
                doc.append_child(thead, row);
            }
            for cell in doc.select_str(thead, ".//td")? {
                doc.rename(cell, "th");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::testing::{assert_idempotent, run};

    #[test]
    fn test_key_dl_moves_into_table() {
        let out = run(
            &KeyListTransform::new(),
            r#"<clause><table id="t"><tbody/></table><dl key="true"><dt>a</dt></dl><p>after</p></clause>"#,
        );
        assert_eq!(
            out,
            r#"<clause><table id="t"><tbody/><dl key="true"><dt>a</dt></dl></table><p>after</p></clause>"#
        );
    }

    #[test]
    fn test_key_paragraph_marks_the_list() {
        let out = run(
            &KeyListTransform::new(),
            "<clause><figure><image/></figure><p>Key:</p><dl><dt>a</dt></dl></clause>",
        );
        assert_eq!(
            out,
            r#"<clause><figure><image/><dl key="true"><dt>a</dt></dl></figure></clause>"#
        );
    }

    #[test]
    fn test_where_list_moves_into_formula() {
        let xml = "<clause><formula><stem>r = 1</stem></formula>\n<p>where</p>\n<dl><dt>r</dt></dl></clause>";
        let out = run(&KeyListTransform::new(), xml);
        assert_eq!(
            out,
            "<clause><formula><stem>r = 1</stem><dl key=\"true\"><dt>r</dt></dl></formula>\n\n</clause>"
        );
        assert_idempotent(&KeyListTransform::new(), xml);
    }

    #[test]
    fn test_key_marker_must_be_alone() {
        let xml = "<clause><table/><p>Key points are these</p><dl/></clause>";
        assert_eq!(run(&KeyListTransform::new(), xml), xml);
        // "where" only introduces lists after formulas
        let xml = "<clause><table/><p>where</p><dl/></clause>";
        assert_eq!(run(&KeyListTransform::new(), xml), xml);
    }

    #[test]
    fn test_note_moves_into_preceding_paragraph() {
        let out = run(
            &NoteTransform::new(),
            "<clause><p>text</p><note><p>n</p></note><p>next</p></clause>",
        );
        assert_eq!(
            out,
            "<clause><p>text<note><p>n</p></note></p><p>next</p></clause>"
        );
    }

    #[test]
    fn test_trailing_and_separate_notes_stay() {
        let out = run(
            &NoteTransform::new(),
            r#"<clause><p>a</p><note keep-separate="true">x</note><p>b</p><note>y</note></clause>"#,
        );
        assert_eq!(
            out,
            r#"<clause><p>a</p><note keep-separate="true">x</note><p>b</p><note>y</note></clause>"#
        );
    }

    #[test]
    fn test_separate_note_stays_separate_on_rerun() {
        assert_idempotent(
            &NoteTransform::new(),
            r#"<clause><p>a</p><note keep-separate="true"><p>x</p></note><p>b</p></clause>"#,
        );
        assert_idempotent(
            &NoteTransform::new(),
            r#"<clause><p>a</p><note keep-separate="false"><p>x</p></note><p>b</p></clause>"#,
        );
    }

    #[test]
    fn test_consecutive_notes_follow_each_other_in() {
        let out = run(
            &NoteTransform::new(),
            "<clause><ul><li>i</li></ul><note>1</note><note>2</note><p>next</p></clause>",
        );
        assert_eq!(
            out,
            "<clause><ul><li>i</li><note>1</note><note>2</note></ul><p>next</p></clause>"
        );
    }

    #[test]
    fn test_note_after_table_moves_into_table() {
        let xml = r#"<clause><table><tbody/></table><note>a</note><note keep-separate="false">b</note><p/></clause>"#;
        let out = run(&NoteTransform::new(), xml);
        assert_eq!(
            out,
            "<clause><table><tbody/><note>a</note><note>b</note></table><p/></clause>"
        );
        assert_idempotent(&NoteTransform::new(), xml);
    }

    #[test]
    fn test_example_of_figures_becomes_figure() {
        let out = run(
            &SubfigureTransform::new(),
            "<clause><example><name>N</name><figure id=\"a\"/><figure id=\"b\"/></example><example><figure/><p/></example></clause>",
        );
        assert_eq!(
            out,
            "<clause><figure><name>N</name><figure id=\"a\"/><figure id=\"b\"/></figure><example><figure/><p/></example></clause>"
        );
    }

    #[test]
    fn test_bookmark_id_moves_to_list_item() {
        let xml = r#"<ul><li><p><bookmark id="b1"/> First</p></li><li><p>x <bookmark id="b2"/></p></li></ul>"#;
        let out = run(&BookmarkTransform::new(), xml);
        assert_eq!(
            out,
            r#"<ul><li id="b1"><p>First</p></li><li><p>x <bookmark id="b2"/></p></li></ul>"#
        );
        assert_idempotent(&BookmarkTransform::new(), xml);
    }

    #[test]
    fn test_bookmark_on_dt_only_without_id() {
        let out = run(
            &BookmarkTransform::new(),
            r#"<dl><dt><bookmark id="a"/>A</dt><dt id="keep"><bookmark id="b"/>B</dt></dl>"#,
        );
        assert_eq!(
            out,
            r#"<dl><dt id="a">A</dt><dt id="keep"><bookmark id="b"/>B</dt></dl>"#
        );
    }

    #[test]
    fn test_header_rows() {
        let xml = r#"<table headerrows="1"><name>T</name><tbody><tr><td>h</td></tr><tr><td>b</td></tr></tbody></table>"#;
        let out = run(&HeaderRowsTransform::new(), xml);
        insta::assert_snapshot!(out, @r#"<table><name>T</name><thead><tr><th>h</th></tr></thead><tbody><tr><td>b</td></tr></tbody></table>"#);
        assert_idempotent(&HeaderRowsTransform::new(), xml);
    }
}
