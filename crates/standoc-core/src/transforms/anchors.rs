/*
 * anchors.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Identifier canonicalization and uniqueness.
 */

//! Identifier canonicalization and uniqueness.
//!
//! Identifiers must start with an ASCII letter or `_` and continue with
//! ASCII letters, digits, `_`, `-` or `.`. Anything else coming out of the
//! parser or the bibliography is rewritten, and every rewrite is reported
//! under [`Category::Anchors`].

use std::collections::HashSet;

use standoc_error_reporting::Category;
use standoc_xml::Document;

use crate::Result;
use crate::context::RunContext;
use crate::transform::{TransformPipeline, TreeTransform};

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Encode non-ASCII characters as hex character references and XML
/// specials as named entities.
fn encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_ascii() => out.push(c),
            c => out.push_str(&format!("&#x{:x};", c as u32)),
        }
    }
    out
}

fn replace_invalid(value: &str) -> String {
    value
        .chars()
        .map(|c| if is_name_char(c) { c } else { '_' })
        .collect()
}

/// Rewrite `value` into a valid identifier.
///
/// ```rust
/// use standoc_core::transforms::to_ncname;
///
/// assert_eq!(to_ncname("a:b"), "a_b");
/// assert_eq!(to_ncname("1"), "_1");
/// assert_eq!(to_ncname("Löwe"), "L__xf6_we");
/// ```
pub fn to_ncname(value: &str) -> String {
    let encoded = encode(value);
    let mut chars = encoded.chars();
    let Some(first) = chars.next() else {
        return encoded;
    };

    let mut out = String::with_capacity(encoded.len() + 1);
    if is_name_start(first) {
        out.push(first);
    } else if first.is_ascii_digit() || first == '-' || first == '.' {
        out.push('_');
        out.push(first);
    } else {
        out.push('_');
    }
    out.push_str(&replace_invalid(chars.as_str()));
    out
}

/// Canonical form of a cross-reference target.
///
/// `prefix#suffix` targets point into another document, so each half only
/// has its invalid characters replaced.
pub fn to_xref_target(value: &str) -> String {
    match value.split_once('#') {
        Some((prefix, suffix)) if !prefix.is_empty() && !suffix.is_empty() => format!(
            "{}#{}",
            replace_invalid(&encode(prefix)),
            replace_invalid(&encode(suffix))
        ),
        _ => to_ncname(value),
    }
}

/// Rewrites every `id` and every configured id reference.
pub struct IdentifierTransform;

impl IdentifierTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IdentifierTransform {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrite `attr` on every element matched by `query` with `canonical`,
/// reporting each change.
fn canonicalize_attribute(
    doc: &mut Document,
    ctx: &mut RunContext,
    query: &str,
    attr: &str,
    canonical: fn(&str) -> String,
) -> Result<()> {
    let root = doc.root();
    for element in doc.select_str(root, query)? {
        let Some(original) = doc.attr(element, attr).map(str::to_string) else {
            continue;
        };
        let rewritten = canonical(&original);
        if rewritten == original {
            continue;
        }
        doc.set_attr(element, attr, rewritten);
        let node = doc.describe(element);
        ctx.sink.warn(
            Category::Anchors,
            Some(node.clone()),
            "S-1-1",
            "Identifier Normalised",
            format!("normalised identifier in {} from {}", node, original),
        );
    }
    Ok(())
}

impl TreeTransform for IdentifierTransform {
    fn name(&self) -> &str {
        "identifiers"
    }

    fn transform(&self, doc: &mut Document, ctx: &mut RunContext) -> Result<()> {
        canonicalize_attribute(doc, ctx, "//*[@id]", "id", to_ncname)?;

        let references: Vec<(String, String)> = ctx
            .config
            .anchors
            .idref_pairs()
            .into_iter()
            .map(|(element, attr)| (element.to_string(), attr.to_string()))
            .collect();
        for (element, attr) in references {
            let query = format!("//{}[@{}]", element, attr);
            canonicalize_attribute(doc, ctx, &query, &attr, to_ncname)?;
        }
        Ok(())
    }
}

/// Rewrites `xref/@target`, keeping `prefix#suffix` targets in two parts.
pub struct XrefTargetTransform;

impl XrefTargetTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for XrefTargetTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeTransform for XrefTargetTransform {
    fn name(&self) -> &str {
        "xref-targets"
    }

    fn transform(&self, doc: &mut Document, ctx: &mut RunContext) -> Result<()> {
        canonicalize_attribute(doc, ctx, "//xref[@target]", "target", to_xref_target)
    }
}

/// Suffixes repeated ids with `_2`, `_3`, ... in document order.
///
/// The first occurrence keeps its id. References are not retargeted.
pub struct UniqueIdTransform;

impl UniqueIdTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UniqueIdTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeTransform for UniqueIdTransform {
    fn name(&self) -> &str {
        "unique-ids"
    }

    fn transform(&self, doc: &mut Document, ctx: &mut RunContext) -> Result<()> {
        let root = doc.root();
        let elements = doc.select_str(root, "//*[@id]")?;
        let mut in_use: HashSet<String> = elements
            .iter()
            .filter_map(|e| doc.attr(*e, "id"))
            .map(str::to_string)
            .collect();
        let mut seen = HashSet::new();

        for element in elements {
            let Some(id) = doc.attr(element, "id").map(str::to_string) else {
                continue;
            };
            if seen.insert(id.clone()) {
                continue;
            }
            let renamed = (2..)
                .map(|n| format!("{}_{}", id, n))
                .find(|candidate| !in_use.contains(candidate))
                .unwrap_or_default();
            in_use.insert(renamed.clone());
            seen.insert(renamed.clone());
            doc.set_attr(element, "id", renamed.clone());
            ctx.sink.warn(
                Category::Anchors,
                Some(doc.describe(element)),
                "S-1-2",
                "Duplicate Identifier",
                format!("duplicate identifier {} renamed to {}", id, renamed),
            );
        }
        Ok(())
    }
}

/// The identifier passes in the order they run after bibliographic merge.
pub fn identifier_pipeline() -> TransformPipeline {
    let mut pipeline = TransformPipeline::new();
    pipeline.push(Box::new(IdentifierTransform::new()));
    pipeline.push(Box::new(XrefTargetTransform::new()));
    pipeline.push(Box::new(UniqueIdTransform::new()));
    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::testing::{assert_idempotent, ctx, run, run_with};

    #[test]
    fn test_to_ncname() {
        for (input, expected) in [
            ("a:b", "a_b"),
            (":", "_"),
            ("1", "_1"),
            ("1:", "_1_"),
            ("/%ab", "__ab"),
            ("1!", "_1_"),
            ("Löwe", "L__xf6_we"),
            ("-x", "_-x"),
            ("#x", "_x"),
            ("a&b", "a_amp_b"),
            ("already_ok-1.2", "already_ok-1.2"),
            ("", ""),
        ] {
            assert_eq!(to_ncname(input), expected, "{input}");
        }
    }

    #[test]
    fn test_xref_targets() {
        assert_eq!(to_xref_target("1#b"), "1#b");
        assert_eq!(to_xref_target(":a#b:"), "_a#b_");
        assert_eq!(to_xref_target("doc#a#b"), "doc#a_b");
        assert_eq!(to_xref_target("#a"), "_a");
        assert_eq!(to_xref_target("1"), "_1");
    }

    #[test]
    fn test_identifiers_are_rewritten_and_reported() {
        let mut ctx = ctx();
        let xml = r#"<clause id="a:b" obligation="normative"><title>A</title><eref bibitemid="/_ab" citeas=""/><review from="1" to="ok"/></clause>"#;
        let out = run_with(&IdentifierTransform::new(), xml, &mut ctx);
        assert_eq!(
            out,
            r#"<clause id="a_b" obligation="normative"><title>A</title><eref bibitemid="__ab" citeas=""/><review from="_1" to="ok"/></clause>"#
        );

        let messages: Vec<&str> = ctx
            .sink
            .with_code("S-1-1")
            .filter_map(|d| d.problem.as_ref().map(|p| p.as_str()))
            .collect();
        assert_eq!(
            messages,
            vec![
                r#"normalised identifier in <clause id="a_b" obligation="normative"/> from a:b"#,
                r#"normalised identifier in <review from="_1" to="ok"/> from 1"#,
                r#"normalised identifier in <eref bibitemid="__ab" citeas=""/> from /_ab"#,
            ]
        );
        assert_eq!(ctx.sink.in_category(Category::Anchors).count(), 3);
    }

    #[test]
    fn test_xref_transform() {
        let xml = r#"<p><xref target=":a#b:"/><xref target="1:"/><xref target="ok"/></p>"#;
        let out = run(&XrefTargetTransform::new(), xml);
        assert_eq!(
            out,
            r#"<p><xref target="_a#b_"/><xref target="_1_"/><xref target="ok"/></p>"#
        );
        assert_idempotent(&XrefTargetTransform::new(), xml);
    }

    #[test]
    fn test_duplicate_ids_are_suffixed() {
        let mut ctx = ctx();
        let xml = r#"<doc><a id="x"/><b id="x"/><c id="x_2"/><d id="x"/></doc>"#;
        let out = run_with(&UniqueIdTransform::new(), xml, &mut ctx);
        assert_eq!(
            out,
            r#"<doc><a id="x"/><b id="x_3"/><c id="x_2"/><d id="x_4"/></doc>"#
        );
        assert_eq!(ctx.sink.with_code("S-1-2").count(), 2);
        assert_idempotent(&UniqueIdTransform::new(), xml);
    }

    #[test]
    fn test_identifier_pipeline_order() {
        assert_eq!(
            identifier_pipeline().transform_names(),
            vec!["identifiers", "xref-targets", "unique-ids"]
        );
    }
}
