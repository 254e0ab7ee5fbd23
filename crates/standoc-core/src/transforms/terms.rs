/*
 * terms.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Term designation normalization.
 */

//! Term designation normalization.
//!
//! The parser leaves a `term` as a loose mix of paragraphs, designation
//! markers (`preferred`, `admitted`, `deprecates`, `related`), `domain`
//! markers, an optional metadata list (`dl metadata="true"`) and prose. This
//! pass rebuilds it in canonical order:
//!
//! 1. designations, `preferred` first, then `admitted`, `deprecates`, `related`
//! 2. term-level metadata such as `domain`
//! 3. `definition`s, each holding a `verbal-definition`, a
//!    `non-verbal-representation` or both
//! 4. other content
//! 5. `termnote`, `termexample`, `termsource`
//!
//! Within each kind, elements keep their relative order.

use standoc_error_reporting::{Category, DiagnosticCollector};
use standoc_xml::{Document, NodeId};

use crate::Result;
use crate::config::TermsConfig;
use crate::context::RunContext;
use crate::transform::TreeTransform;
use crate::transforms::{sort_groups, until_fixed_point};

/// Designation kinds, in canonical order.
const DESIGNATIONS: &[&str] = &["preferred", "admitted", "deprecates", "related"];

/// Term-level metadata markers the parser may leave inside paragraphs.
const TERM_MARKERS: &[&str] = &["domain", "subject", "usageinfo"];

/// Blocks collected into definitions.
const VERBAL_BLOCKS: &[&str] = &["p", "ul", "ol", "dl", "table"];
const NON_VERBAL_BLOCKS: &[&str] = &["figure", "formula"];

/// Normalizes every `term` in the document.
pub struct TermTransform;

impl TermTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TermTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeTransform for TermTransform {
    fn name(&self) -> &str {
        "terms"
    }

    fn transform(&self, doc: &mut Document, ctx: &mut RunContext) -> Result<()> {
        let root = doc.root();
        let config = ctx.config.terms.clone();

        unnest_designations(doc)?;
        unnest_term_markers(doc)?;

        for term in doc.select_str(root, "//term")? {
            nonverbal_designations(doc, term);
            metadata_lists(doc, term, &config, &mut ctx.sink);
            termsource_to_designation(doc, term);
            sort_groups(doc, term, |_, _| true, |doc, child| {
                designation_rank(doc, child).unwrap_or(DESIGNATIONS.len())
            });
            stem_paragraphs(doc, term)?;
            definitions(doc, term);
            sort_groups(doc, term, |_, _| true, |doc, child| {
                canonical_rank(doc, child, &config)
            });
        }

        for note in doc.select_str(root, "//termnote | //termexample")? {
            if !doc.has_ancestor_named(note, "term") {
                let demoted = if doc.is_named(note, "termnote") { "note" } else { "example" };
                doc.rename(note, demoted);
            }
        }

        for terms in doc.select_str(root, "//terms[terms]")? {
            doc.rename(terms, "clause");
        }
        Ok(())
    }
}

fn is_designation(doc: &Document, id: NodeId) -> bool {
    doc.is_named_any(id, DESIGNATIONS)
}

fn designation_rank(doc: &Document, id: NodeId) -> Option<usize> {
    let name = doc.name(id)?;
    DESIGNATIONS.iter().position(|d| *d == name)
}

/// The element expressions and symbols hang off: the inner `preferred` of a
/// `related`, the designation itself otherwise.
fn designation_body(doc: &mut Document, designation: NodeId) -> NodeId {
    if !doc.is_named(designation, "related") {
        return designation;
    }
    match doc.first_child_named(designation, "preferred") {
        Some(preferred) => preferred,
        None => {
            let preferred = doc.create_element("preferred");
            doc.append_child(designation, preferred);
            preferred
        }
    }
}

/// Release designations from the paragraphs the parser wrapped them in.
fn unnest_designations(doc: &mut Document) -> Result<()> {
    let root = doc.root();
    until_fixed_point(|| {
        let found = doc.find_first(
            root,
            "//p/preferred | //p/admitted | //p/deprecates | //p/related",
        )?;
        let Some(paragraph) = found.and_then(|d| doc.parent(d)) else {
            return Ok(false);
        };
        doc.unwrap(paragraph);
        Ok(true)
    })
}

/// Move `domain`-like markers out of their paragraph, to just before it.
fn unnest_term_markers(doc: &mut Document) -> Result<()> {
    let root = doc.root();
    for marker in doc.select_str(root, "//p/domain | //p/subject | //p/usageinfo")? {
        if let Some(paragraph) = doc.parent(marker) {
            doc.insert_before(paragraph, marker);
        }
    }
    Ok(())
}

/// Give designations with no text a symbol or an empty expression.
///
/// A following formula supplies a stem expression, a following figure a
/// graphical symbol; both are consumed.
fn nonverbal_designations(doc: &mut Document, term: NodeId) {
    for designation in doc.element_children(term) {
        if !is_designation(doc, designation) || !doc.text_content(designation).trim().is_empty() {
            continue;
        }
        let body = designation_body(doc, designation);
        let has_symbol = doc
            .element_children(body)
            .into_iter()
            .any(|c| doc.is_named_any(c, &["expression", "graphical-symbol", "letter-symbol"]));
        if has_symbol {
            continue;
        }

        let next = doc.next_element_sibling(designation);
        let formula_stem = next
            .filter(|n| doc.is_named(*n, "formula"))
            .and_then(|f| doc.first_child_named(f, "stem"));

        if let (Some(formula), Some(stem)) = (next, formula_stem) {
            let name = empty_expression(doc, body);
            doc.append_child(name, stem);
            doc.detach(formula);
        } else if let Some(figure) = next.filter(|n| doc.is_named(*n, "figure")) {
            if let Some(caption) = doc.first_child_named(figure, "name") {
                doc.detach(caption);
            }
            doc.clear_children(body);
            let symbol = doc.create_element("graphical-symbol");
            doc.append_child(body, symbol);
            doc.append_child(symbol, figure);
        } else {
            empty_expression(doc, body);
        }
    }
}

/// Replace the content of `body` with `expression/name`, returning the name.
fn empty_expression(doc: &mut Document, body: NodeId) -> NodeId {
    doc.clear_children(body);
    let expression = doc.create_element("expression");
    let name = doc.create_element("name");
    doc.append_child(body, expression);
    doc.append_child(expression, name);
    name
}

/// `(dt text, dd)` pairs of a definition list, direct children only.
fn dl_entries(doc: &Document, dl: NodeId) -> Vec<(String, NodeId)> {
    let mut entries = Vec::new();
    let mut key: Option<String> = None;
    for child in doc.element_children(dl) {
        if doc.is_named(child, "dt") {
            key = Some(doc.text_content(child).trim().to_string());
        } else if doc.is_named(child, "dd") {
            if let Some(k) = key.take() {
                entries.push((k, child));
            }
        }
    }
    entries
}

fn values_for<'a>(
    doc: &'a Document,
    entries: &'a [(String, NodeId)],
    key: &'a str,
) -> impl Iterator<Item = String> + 'a {
    entries
        .iter()
        .filter(move |(k, _)| k == key)
        .map(move |(_, dd)| doc.text_content(*dd).trim().to_string())
}

fn metadata_lists(
    doc: &mut Document,
    term: NodeId,
    config: &TermsConfig,
    sink: &mut DiagnosticCollector,
) {
    for dl in doc.children_named(term, "dl") {
        if !doc.attr_is_true(dl, "metadata") {
            continue;
        }
        let Some(designation) = doc
            .previous_element_sibling(dl)
            .filter(|p| is_designation(doc, *p))
        else {
            sink.warn(
                Category::Input,
                Some(doc.to_xml(dl)),
                "S-2-2",
                "Misplaced Metadata List",
                "Metadata definition list does not follow a term designation",
            );
            continue;
        };

        let entries = dl_entries(doc, dl);
        for key in &config.designation_attributes {
            if let Some(value) = values_for(doc, &entries, key).last() {
                doc.set_attr(designation, key.as_str(), value);
            }
        }

        let body = designation_body(doc, designation);
        expression_metadata(doc, body, &entries, config);

        let first_preferred = doc.is_named(designation, "preferred")
            && doc.children_named(term, "preferred").first() == Some(&designation);
        if first_preferred {
            term_metadata(doc, designation, &entries, config);
        }
        doc.detach(dl);
    }
}

fn expression_metadata(
    doc: &mut Document,
    body: NodeId,
    entries: &[(String, NodeId)],
    config: &TermsConfig,
) {
    let expression = doc.first_child_named(body, "expression");

    if let Some(name) = expression.and_then(|e| doc.first_child_named(e, "name")) {
        let mut insert_point = name;
        for key in &config.expression_elements {
            let values: Vec<String> = values_for(doc, entries, key).collect();
            for value in values {
                let element = doc.create_text_element(key.as_str(), value);
                doc.insert_after(insert_point, element);
                insert_point = element;
            }
        }
    }

    let grammar_list = entries
        .iter()
        .find(|(k, _)| k == "grammar")
        .and_then(|(_, dd)| doc.descendants_named(*dd, "dl").first().copied());
    if let (Some(expression), Some(list)) = (expression, grammar_list) {
        let grammar_entries = dl_entries(doc, list);
        let grammar = doc.create_element("grammar");
        for key in &config.grammar_elements {
            let values: Vec<String> = values_for(doc, &grammar_entries, key).collect();
            for value in values {
                let parts: Vec<String> = if key == "gender" {
                    value.split(',').map(|g| g.trim().to_string()).filter(|g| !g.is_empty()).collect()
                } else {
                    vec![value]
                };
                for part in parts {
                    let element = doc.create_text_element(key.as_str(), part);
                    doc.append_child(grammar, element);
                }
            }
        }
        if !doc.children(grammar).is_empty() {
            doc.append_child(expression, grammar);
        }
    }

    let letter_symbol = values_for(doc, entries, "letter-symbol").any(|v| v == "true");
    if let (true, Some(expression)) = (letter_symbol, expression) {
        doc.rename(expression, "letter-symbol");
    }
}

/// Insert term-level elements once, after the first `preferred` and the
/// designations and term-level elements that follow it.
fn term_metadata(
    doc: &mut Document,
    preferred: NodeId,
    entries: &[(String, NodeId)],
    config: &TermsConfig,
) {
    let mut insert_point = preferred;
    while let Some(next) = doc.next_element_sibling(insert_point) {
        let follows = is_designation(doc, next)
            || config.term_elements.iter().any(|t| doc.is_named(next, t))
            || (doc.is_named(next, "dl") && doc.attr_is_true(next, "metadata"));
        if !follows {
            break;
        }
        insert_point = next;
    }
    for key in &config.term_elements {
        let values: Vec<String> = values_for(doc, entries, key).collect();
        for value in values {
            let element = doc.create_text_element(key.as_str(), value);
            doc.insert_after(insert_point, element);
            insert_point = element;
        }
    }
}

/// Move a `termsource` that directly follows a designation into it.
fn termsource_to_designation(doc: &mut Document, term: NodeId) {
    for source in doc.children_named(term, "termsource") {
        let mut prev = doc.previous_element_sibling(source);
        while let Some(p) = prev.filter(|p| doc.is_named_any(*p, TERM_MARKERS)) {
            prev = doc.previous_element_sibling(p);
        }
        let Some(designation) = prev.filter(|p| is_designation(doc, *p)) else {
            continue;
        };
        let body = designation_body(doc, designation);
        doc.append_child(body, source);
    }
}

/// A paragraph holding only a stem is an admitted symbol. Expressions whose
/// name is a stem are letter symbols.
fn stem_paragraphs(doc: &mut Document, term: NodeId) -> Result<()> {
    for paragraph in doc.children_named(term, "p") {
        let elements = doc.element_children(paragraph);
        if elements.len() != 1 || !doc.is_named(elements[0], "stem") {
            continue;
        }
        let admitted = doc.create_element("admitted");
        let name = empty_expression(doc, admitted);
        doc.append_child(name, elements[0]);
        doc.replace(paragraph, admitted);
    }
    for expression in doc.select_str(term, ".//expression[name]")? {
        let stem_name = doc
            .first_child_named(expression, "name")
            .is_some_and(|name| doc.first_child_named(name, "stem").is_some());
        if stem_name {
            doc.rename(expression, "letter-symbol");
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BlockClass {
    Verbal,
    NonVerbal,
}

fn block_class(doc: &Document, id: NodeId) -> Option<BlockClass> {
    if doc.is_named(id, "dl") && doc.attr_is_true(id, "metadata") {
        return None;
    }
    if doc.is_named_any(id, VERBAL_BLOCKS) {
        Some(BlockClass::Verbal)
    } else if doc.is_named_any(id, NON_VERBAL_BLOCKS) {
        Some(BlockClass::NonVerbal)
    } else {
        None
    }
}

fn definitions(doc: &mut Document, term: NodeId) {
    if doc.first_child_named(term, "definition").is_none() {
        let mut runs: Vec<(BlockClass, Vec<NodeId>)> = Vec::new();
        let mut in_run = false;
        for child in doc.element_children(term) {
            let Some(class) = block_class(doc, child) else {
                in_run = false;
                continue;
            };
            match runs.last_mut() {
                Some((last, blocks)) if in_run && *last == class => blocks.push(child),
                _ => runs.push((class, vec![child])),
            }
            in_run = true;
        }

        for (class, blocks) in runs {
            let definition = doc.create_element("definition");
            let part = doc.create_element(match class {
                BlockClass::Verbal => "verbal-definition",
                BlockClass::NonVerbal => "non-verbal-representation",
            });
            doc.insert_before(blocks[0], definition);
            doc.append_child(definition, part);
            for block in blocks {
                doc.append_child(part, block);
            }
        }
    }

    merge_complementary_definitions(doc, term);

    if let Some(first) = doc.first_child_named(term, "definition") {
        for marker in doc.element_children(term) {
            if doc.is_named_any(marker, TERM_MARKERS) {
                doc.insert_before(first, marker);
            }
        }
    }
}

fn only_child_named(doc: &Document, id: NodeId, name: &str) -> bool {
    let children = doc.element_children(id);
    children.len() == 1 && doc.is_named(children[0], name)
}

/// A verbal-only definition directly followed by a non-verbal-only one
/// becomes a single definition.
fn merge_complementary_definitions(doc: &mut Document, term: NodeId) {
    for definition in doc.children_named(term, "definition") {
        if !doc.is_attached(definition) || !only_child_named(doc, definition, "verbal-definition") {
            continue;
        }
        let Some(next) = doc
            .next_element_sibling(definition)
            .filter(|n| doc.is_named(*n, "definition"))
        else {
            continue;
        };
        if only_child_named(doc, next, "non-verbal-representation") {
            for part in doc.element_children(next) {
                doc.append_child(definition, part);
            }
            doc.detach(next);
        }
    }
}

fn canonical_rank(doc: &Document, id: NodeId, config: &TermsConfig) -> usize {
    if let Some(rank) = designation_rank(doc, id) {
        return rank;
    }
    match doc.name(id) {
        Some(name) if config.term_elements.iter().any(|t| t == name) => 4,
        Some("definition") => 5,
        Some("termnote") => 7,
        Some("termexample") => 8,
        Some("termsource") => 9,
        _ => 6,
    }
}
