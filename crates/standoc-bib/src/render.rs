/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Rendering of resolved descriptors as bibitem elements.
 */

//! `bibitem` renderers.
//!
//! One renderer per grammar, used when nothing was retrieved, plus the stub
//! renderers for failed and malformed items and the re-anchoring of retrieved
//! records. Every renderer returns a detached `bibitem` element.

use once_cell::sync::Lazy;
use regex::Regex;
use standoc_error_reporting::{Category, DiagnosticCollector};
use standoc_xml::{Document, NodeId};

use crate::descriptor::{CodeKind, GenericRef, Grammar, ReferenceDescriptor, UNDATED};
use crate::resolver::{Outcome, Resolution};

static LEADING_EM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^<em>(.*)</em>").expect("emphasis pattern"));

static YEAR_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<from>[0-9]{4})-(?P<to>[0-9]{4})$").expect("year range pattern"));

static FILE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.[a-zA-Z0-9]+$").expect("extension pattern"));

static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\(.+\)$").expect("paren pattern"));

static REF_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?ref(?:\s[^>]*)?>").expect("ref tag pattern"));

const PLAIN_TEXT: &str = "text/plain";

/// Render one descriptor given its resolution, recording diagnostics.
pub fn render_resolution(
    doc: &mut Document,
    descriptor: &ReferenceDescriptor,
    resolution: &Resolution,
    sink: &mut DiagnosticCollector,
) -> NodeId {
    for error in &resolution.cache_errors {
        sink.warn(
            Category::Bibliography,
            None,
            "S-4-3",
            "Cache Unavailable",
            error.clone(),
        );
    }

    if let Grammar::Malformed(_) = descriptor.grammar {
        sink.warn(
            Category::Input,
            Some(descriptor.raw.clone()),
            "S-2-1",
            "Malformed Citation",
            format!(
                "no anchor on reference, markup may be malformed: {}",
                descriptor.raw
            ),
        );
        return render_malformed_stub(doc, descriptor);
    }

    match &resolution.outcome {
        Outcome::Retrieved { record, .. } => match render_record(doc, descriptor, record) {
            Ok(bibitem) => bibitem,
            Err(e) => {
                sink.warn(
                    Category::Bibliography,
                    None,
                    "S-4-2",
                    "Unreadable Bibliographic Record",
                    format!(
                        "record for `{}` could not be parsed: {}",
                        descriptor.code().unwrap_or_default(),
                        e
                    ),
                );
                render_descriptor(doc, descriptor)
            }
        },
        Outcome::NoFetch => render_descriptor(doc, descriptor),
        Outcome::Failed { error } => {
            sink.warn(
                Category::Bibliography,
                None,
                "S-4-1",
                "Reference Not Retrieved",
                format!(
                    "Could not retrieve `{}`: {}",
                    descriptor.lookup_code().unwrap_or_default(),
                    error
                ),
            );
            render_failed_stub(doc, descriptor)
        }
    }
}

/// Render from the citation text with the grammar's renderer.
pub fn render_descriptor(doc: &mut Document, descriptor: &ReferenceDescriptor) -> NodeId {
    match &descriptor.grammar {
        Grammar::Dated(r) => {
            let bib = standard_bibitem(doc, &r.anchor);
            standard_head(doc, bib, descriptor, "");
            if let Some(year) = &r.year {
                published_date(doc, bib, year);
            }
            publishers(doc, bib, &r.code);
            bib
        }
        Grammar::UndatedWithFootnote(r) => {
            let bib = standard_bibitem(doc, &r.anchor);
            standard_head(doc, bib, descriptor, "");
            published_date(doc, bib, UNDATED);
            publishers(doc, bib, &r.code);
            if let Some(footnote) = &r.footnote {
                unpublished_note(doc, bib, footnote);
            }
            bib
        }
        Grammar::AllParts(r) => {
            let bib = standard_bibitem(doc, &r.anchor);
            standard_head(doc, bib, descriptor, " (all parts)");
            if let Some(year) = &r.year {
                published_date(doc, bib, year);
            }
            publishers(doc, bib, &r.code);
            if let Some(footnote) = &r.footnote {
                unpublished_note(doc, bib, footnote);
            }
            ensure_all_parts_extent(doc, bib);
            bib
        }
        Grammar::Generic(r) => render_generic(doc, r),
        Grammar::Malformed(_) => render_malformed_stub(doc, descriptor),
    }
}

/// The placeholder for a descriptor whose fetch failed.
pub fn render_failed_stub(doc: &mut Document, descriptor: &ReferenceDescriptor) -> NodeId {
    let Some(code) = descriptor.code() else {
        return render_malformed_stub(doc, descriptor);
    };
    let anchor = descriptor.anchor().unwrap_or_default();
    let bib = standard_bibitem(doc, anchor);
    text_child(doc, bib, "title", &[("format", PLAIN_TEXT)], UNDATED);
    if let Some(label) = descriptor.label() {
        text_child(doc, bib, "docidentifier", &[("type", "metanorma")], label);
    }
    let suffix = if descriptor.all_parts() { " (all parts)" } else { "" };
    let id = format!("{}{}", id_and_year(code, descriptor.year()), suffix);
    text_child(doc, bib, "docidentifier", &[], &id);
    docnumber(doc, bib, code);
    publishers(doc, bib, code);
    bib
}

/// The best-effort item for a citation that matched no grammar.
pub fn render_malformed_stub(doc: &mut Document, descriptor: &ReferenceDescriptor) -> NodeId {
    let bib = doc.create_element("bibitem");
    if let Some(anchor) = descriptor.anchor() {
        doc.set_attr(bib, "id", anchor);
    }
    let formatted = doc.create_element_with("formattedref", &[("format", "application/x-isodoc+xml")]);
    // The anchor already sits on the bibitem.
    let text = REF_TAG.replace_all(&descriptor.raw, "");
    append_markup(doc, formatted, text.trim());
    doc.append_child(bib, formatted);
    if let Some(label) = descriptor.label() {
        text_child(doc, bib, "docidentifier", &[("type", "metanorma")], label);
    }
    bib
}

/// Graft a retrieved record into `doc`, re-anchored to the descriptor.
///
/// The root is renamed `bibitem` and given the anchor as id. A label becomes
/// a `metanorma` docidentifier ahead of the others. All-parts citations get
/// the part extent when the record lacks one.
pub fn render_record(
    doc: &mut Document,
    descriptor: &ReferenceDescriptor,
    record: &str,
) -> standoc_xml::Result<NodeId> {
    let parsed = standoc_xml::parse(record)?;
    let bib = doc.import(&parsed, parsed.root());
    doc.rename(bib, "bibitem");
    if let Some(anchor) = descriptor.anchor() {
        doc.set_attr(bib, "id", anchor);
    }

    if let Some(label) = descriptor.label() {
        let docid = doc.create_text_element("docidentifier", label);
        doc.set_attr(docid, "type", "metanorma");
        match doc.first_child_named(bib, "docidentifier") {
            Some(first) => doc.insert_before(first, docid),
            None => doc.append_child(bib, docid),
        }
    }

    if descriptor.all_parts() {
        ensure_all_parts_extent(doc, bib);
    }
    Ok(bib)
}

fn render_generic(doc: &mut Document, r: &GenericRef) -> NodeId {
    let bib = doc.create_element_with("bibitem", &[("id", r.anchor.as_str())]);
    let formatted = doc.create_element_with("formattedref", &[("format", "application/x-isodoc+xml")]);
    append_markup(doc, formatted, &r.text.replace("&amp;amp;", "&amp;"));
    doc.append_child(bib, formatted);

    if let CodeKind::Path { key } = &r.code.kind {
        let target = FILE_EXTENSION.replace(key, "").into_owned();
        text_child(doc, bib, "uri", &[("type", "URI")], &target);
        text_child(doc, bib, "uri", &[("type", "citation")], &target);
    }
    if let Some(label) = &r.label {
        text_child(doc, bib, "docidentifier", &[("type", "metanorma")], label);
    }
    match r.code.kind {
        CodeKind::Numeric => {
            let id = format!("[{}]", r.code.id);
            text_child(doc, bib, "docidentifier", &[("type", "metanorma")], &id);
        }
        _ => text_child(doc, bib, "docidentifier", &[], &r.code.id),
    }
    if let CodeKind::Repository { key } = &r.code.kind {
        text_child(doc, bib, "docidentifier", &[("type", "repository")], key);
    }
    if r.code.kind != CodeKind::Numeric && !PARENTHESIZED.is_match(&r.code.id) {
        docnumber(doc, bib, &r.code.id);
    }
    bib
}

fn standard_bibitem(doc: &mut Document, anchor: &str) -> NodeId {
    doc.create_element_with("bibitem", &[("id", anchor), ("type", "standard")])
}

/// Title, label and code docidentifiers, docnumber.
fn standard_head(doc: &mut Document, bib: NodeId, descriptor: &ReferenceDescriptor, suffix: &str) {
    let title = doc.create_element_with("title", &[("format", PLAIN_TEXT)]);
    append_markup(doc, title, &normalise_title(descriptor.text()));
    doc.append_child(bib, title);

    if let Some(label) = descriptor.label() {
        text_child(doc, bib, "docidentifier", &[("type", "metanorma")], label);
    }
    let code = descriptor.code().unwrap_or_default();
    let id = format!("{}{}", id_and_year(code, descriptor.year()), suffix);
    text_child(doc, bib, "docidentifier", &[], &id);
    docnumber(doc, bib, code);
}

fn normalise_title(text: &str) -> String {
    let text = text.replace("&amp;amp;", "&amp;");
    LEADING_EM.replace(&text, "$1").into_owned()
}

fn id_and_year(code: &str, year: Option<&str>) -> String {
    match year {
        Some(year) => format!("{}:{}", code, year),
        None => code.to_string(),
    }
}

/// The code with its leading non-digits stripped, when anything is left.
fn docnumber(doc: &mut Document, bib: NodeId, code: &str) {
    let number = code.trim_start_matches(|c: char| !c.is_ascii_digit());
    if !number.is_empty() {
        text_child(doc, bib, "docnumber", &[], number);
    }
}

fn published_date(doc: &mut Document, bib: NodeId, year: &str) {
    let date = doc.create_element_with("date", &[("type", "published")]);
    match YEAR_RANGE.captures(year) {
        Some(caps) => {
            text_child(doc, date, "from", &[], &caps["from"]);
            text_child(doc, date, "to", &[], &caps["to"]);
        }
        None => text_child(doc, date, "on", &[], year),
    }
    doc.append_child(bib, date);
}

/// One publisher contributor per `/`-separated prefix of the code.
fn publishers(doc: &mut Document, bib: NodeId, code: &str) {
    let prefix = code.split(' ').next().unwrap_or_default();
    for abbrev in prefix.split('/').filter(|a| !a.is_empty()) {
        let contributor = doc.create_element("contributor");
        let role = doc.create_element_with("role", &[("type", "publisher")]);
        let organization = doc.create_element("organization");
        text_child(doc, organization, "name", &[], abbrev);
        doc.append_child(contributor, role);
        doc.append_child(contributor, organization);
        doc.append_child(bib, contributor);
    }
}

fn unpublished_note(doc: &mut Document, bib: NodeId, footnote: &str) {
    let note = doc.create_element_with("note", &[("format", PLAIN_TEXT), ("type", "Unpublished-Status")]);
    append_markup(doc, note, footnote);
    doc.append_child(bib, note);
}

fn ensure_all_parts_extent(doc: &mut Document, bib: NodeId) {
    if doc.first_child_named(bib, "extent").is_some() {
        return;
    }
    let extent = doc.create_element_with("extent", &[("type", "part")]);
    text_child(doc, extent, "referenceFrom", &[], "all");
    doc.append_child(bib, extent);
}

fn text_child(doc: &mut Document, parent: NodeId, name: &str, attrs: &[(&str, &str)], text: &str) {
    let element = doc.create_element_with(name, attrs);
    let text = doc.create_text(text);
    doc.append_child(element, text);
    doc.append_child(parent, element);
}

/// Append markup as parsed nodes, or as plain text if it does not parse.
fn append_markup(doc: &mut Document, parent: NodeId, markup: &str) {
    let nodes = match doc.parse_fragment(markup) {
        Ok(nodes) => nodes,
        Err(_) => vec![doc.create_text(markup)],
    };
    for node in nodes {
        doc.append_child(parent, node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    fn render(raw: &str) -> String {
        let mut doc = Document::new("references");
        let d = ReferenceDescriptor::parse(0, raw);
        let bib = render_descriptor(&mut doc, &d);
        doc.to_xml(bib)
    }

    #[test]
    fn test_dated() {
        insta::assert_snapshot!(
            render(r#"<ref id="iso216">[ISO 216:2001]</ref>, <em>Reference</em>"#),
            @r#"<bibitem id="iso216" type="standard"><title format="text/plain">Reference</title><docidentifier>ISO 216:2001</docidentifier><docnumber>216</docnumber><date type="published"><on>2001</on></date><contributor><role type="publisher"/><organization><name>ISO</name></organization></contributor></bibitem>"#
        );
    }

    #[test]
    fn test_undated_with_footnote() {
        insta::assert_snapshot!(
            render(r#"<ref id="iso123">[ISO 123:--]</ref><fn><p>Under preparation.</p></fn>, Standard"#),
            @r#"<bibitem id="iso123" type="standard"><title format="text/plain">Standard</title><docidentifier>ISO 123:--</docidentifier><docnumber>123</docnumber><date type="published"><on>--</on></date><contributor><role type="publisher"/><organization><name>ISO</name></organization></contributor><note format="text/plain" type="Unpublished-Status">Under preparation.</note></bibitem>"#
        );
    }

    #[test]
    fn test_all_parts_with_joint_publishers() {
        insta::assert_snapshot!(
            render(r#"<ref id="x">[ISO/IEC 27001 (all parts)]</ref> Security"#),
            @r#"<bibitem id="x" type="standard"><title format="text/plain">Security</title><docidentifier>ISO/IEC 27001 (all parts)</docidentifier><docnumber>27001</docnumber><contributor><role type="publisher"/><organization><name>ISO</name></organization></contributor><contributor><role type="publisher"/><organization><name>IEC</name></organization></contributor><extent type="part"><referenceFrom>all</referenceFrom></extent></bibitem>"#
        );
    }

    #[test]
    fn test_generic_numeric() {
        insta::assert_snapshot!(
            render(r#"<ref id="iso123">[2]</ref> <em>Standard 123</em>"#),
            @r#"<bibitem id="iso123"><formattedref format="application/x-isodoc+xml"><em>Standard 123</em></formattedref><docidentifier type="metanorma">[2]</docidentifier></bibitem>"#
        );
    }

    #[test]
    fn test_generic_path_and_repo() {
        let path = render(r#"<ref id="p">[path:(spec/a.adoc,A)]</ref> Spec A"#);
        assert!(path.contains(r#"<uri type="URI">spec/a</uri><uri type="citation">spec/a</uri>"#));
        assert!(path.contains("<docidentifier>A</docidentifier>"));

        let repo = render(r#"<ref id="r">[repo:(org/repo,R1)]</ref> Repo"#);
        assert!(repo.contains(r#"<docidentifier type="repository">org/repo</docidentifier>"#));
        assert!(repo.contains("<docnumber>1</docnumber>"));
    }

    #[test]
    fn test_failed_stub() {
        let mut doc = Document::new("references");
        let mut sink = DiagnosticCollector::new();
        let d = ReferenceDescriptor::parse(1, r#"<ref id="b">[(2)ISO 2:2010]</ref> B"#);
        let resolution = Resolution::new(Outcome::Failed {
            error: FetchError::Unavailable("online site".into()),
        });
        let bib = render_resolution(&mut doc, &d, &resolution, &mut sink);
        insta::assert_snapshot!(
            doc.to_xml(bib),
            @r#"<bibitem id="b" type="standard"><title format="text/plain">--</title><docidentifier type="metanorma">(2)</docidentifier><docidentifier>ISO 2:2010</docidentifier><docnumber>2</docnumber><contributor><role type="publisher"/><organization><name>ISO</name></organization></contributor></bibitem>"#
        );
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.diagnostics()[0].code.as_deref(), Some("S-4-1"));
        assert_eq!(
            sink.diagnostics()[0].problem.as_ref().map(|p| p.as_str()),
            Some("Could not retrieve `ISO 2`: no access to online site")
        );
    }

    #[test]
    fn test_malformed_stub_is_never_dropped() {
        let mut doc = Document::new("references");
        let mut sink = DiagnosticCollector::new();
        let d = ReferenceDescriptor::parse(0, r#"<ref id="m">Some book</ref>"#);
        let bib = render_resolution(&mut doc, &d, &Resolution::no_fetch(), &mut sink);
        assert_eq!(
            doc.to_xml(bib),
            r#"<bibitem id="m"><formattedref format="application/x-isodoc+xml">Some book</formattedref></bibitem>"#
        );
        assert_eq!(sink.diagnostics()[0].code.as_deref(), Some("S-2-1"));
    }

    #[test]
    fn test_retrieved_record_is_reanchored() {
        let mut doc = Document::new("references");
        let mut sink = DiagnosticCollector::new();
        let d = ReferenceDescriptor::parse(0, r#"<ref id="local">[(A)ISO 5 (all parts)]</ref>"#);
        let resolution = Resolution::new(Outcome::Retrieved {
            record: r#"<bibdata id="remote" type="standard"><title>Five</title><docidentifier type="ISO">ISO 5</docidentifier></bibdata>"#.into(),
            origin: crate::resolver::Origin::Fetched,
        });
        let bib = render_resolution(&mut doc, &d, &resolution, &mut sink);
        assert_eq!(
            doc.to_xml(bib),
            r#"<bibitem id="local" type="standard"><title>Five</title><docidentifier type="metanorma">(A)</docidentifier><docidentifier type="ISO">ISO 5</docidentifier><extent type="part"><referenceFrom>all</referenceFrom></extent></bibitem>"#
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_unparseable_record_degrades() {
        let mut doc = Document::new("references");
        let mut sink = DiagnosticCollector::new();
        let d = ReferenceDescriptor::parse(0, r#"<ref id="a">[ISO 1:2000]</ref> One"#);
        let resolution = Resolution::new(Outcome::Retrieved {
            record: "<bibitem>".into(),
            origin: crate::resolver::Origin::Fetched,
        });
        let bib = render_resolution(&mut doc, &d, &resolution, &mut sink);
        assert_eq!(doc.attr(bib, "type"), Some("standard"));
        assert_eq!(sink.diagnostics()[0].code.as_deref(), Some("S-4-2"));
    }
}
