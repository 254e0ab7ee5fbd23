/*
 * sourcecode.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Source code block cleanup.
 */

//! Source code block cleanup.
//!
//! ## Callouts
//!
//! The parser emits callout annotations as siblings after the block:
//!
//! ```xml
//! <sourcecode>puts x <callout>1</callout></sourcecode>
//! <annotation><p>prints x</p></annotation>
//! ```
//!
//! [`CalloutTransform`] moves them inside and links the n-th callout to the
//! n-th annotation through a fresh correlation id:
//!
//! ```xml
//! <sourcecode>puts x <callout target="_1">1</callout><annotation id="_1"><p>prints x</p></annotation></sourcecode>
//! ```
//!
//! ## Embedded snippets
//!
//! A `pre-render` element inside a block holds markup that still has to go
//! through the upstream converter. [`SnippetTransform`] hands it to the
//! context's [`SnippetRenderer`](crate::context::SnippetRenderer).

use standoc_error_reporting::Category;
use standoc_xml::{Document, NodeId};

use crate::Result;
use crate::context::RunContext;
use crate::transform::TreeTransform;

/// Pairs callouts with their annotations.
pub struct CalloutTransform;

impl CalloutTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CalloutTransform {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_annotations(doc: &mut Document, sourcecode: NodeId) {
    while let Some(next) = doc
        .next_element_sibling(sourcecode)
        .filter(|n| doc.is_named(*n, "annotation"))
    {
        doc.append_child(sourcecode, next);
    }
}

impl TreeTransform for CalloutTransform {
    fn name(&self) -> &str {
        "callouts"
    }

    fn transform(&self, doc: &mut Document, ctx: &mut RunContext) -> Result<()> {
        let root = doc.root();
        for sourcecode in doc.select_str(root, "//sourcecode")? {
            merge_annotations(doc, sourcecode);

            let callouts = doc.children_named(sourcecode, "callout");
            let annotations = doc.children_named(sourcecode, "annotation");
            if callouts.is_empty() && annotations.is_empty() {
                continue;
            }
            if !callouts.is_empty() && callouts.iter().all(|c| doc.has_attr(*c, "target")) {
                continue;
            }
            if callouts.len() != annotations.len() {
                ctx.sink.warn(
                    Category::Structure,
                    Some(doc.describe(sourcecode)),
                    "S-3-1",
                    "Callout Count Mismatch",
                    format!(
                        "{} callouts but {} annotations; leaving them unlinked",
                        callouts.len(),
                        annotations.len()
                    ),
                );
                continue;
            }
            for (callout, annotation) in callouts.into_iter().zip(annotations) {
                let id = ctx.ids.next_id();
                doc.set_attr(callout, "target", id.clone());
                doc.set_attr(annotation, "id", id);
            }
        }
        Ok(())
    }
}

/// Renders `pre-render` snippet markup inside source code blocks.
///
/// On failure the raw snippet text is kept in place of the element.
pub struct SnippetTransform;

impl SnippetTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SnippetTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeTransform for SnippetTransform {
    fn name(&self) -> &str {
        "snippets"
    }

    fn transform(&self, doc: &mut Document, ctx: &mut RunContext) -> Result<()> {
        let root = doc.root();
        for snippet in doc.select_str(root, "//sourcecode//pre-render")? {
            let raw = doc.text_content(snippet);
            let rendered = ctx
                .snippets
                .render(&raw)
                .map_err(|e| e.to_string())
                .and_then(|markup| doc.parse_fragment(&markup).map_err(|e| e.to_string()));
            match rendered {
                Ok(nodes) => doc.replace_with_many(snippet, &nodes),
                Err(message) => {
                    ctx.sink.warn(
                        Category::Input,
                        Some(doc.to_xml(snippet)),
                        "S-2-3",
                        "Snippet Rendering Failed",
                        format!("could not render embedded markup: {}", message),
                    );
                    let text = doc.create_text(raw);
                    doc.replace(snippet, text);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{SnippetError, SnippetRenderer};
    use crate::transforms::testing::{assert_idempotent, ctx, run, run_with};

    #[test]
    fn test_callouts_pair_with_annotations() {
        let xml = "<clause><sourcecode>a <callout>1</callout> b <callout>2</callout></sourcecode><annotation>one</annotation><annotation>two</annotation><p/></clause>";
        let out = run(&CalloutTransform::new(), xml);
        insta::assert_snapshot!(out, @r#"<clause><sourcecode>a <callout target="_1">1</callout> b <callout target="_2">2</callout><annotation id="_1">one</annotation><annotation id="_2">two</annotation></sourcecode><p/></clause>"#);
        assert_idempotent(&CalloutTransform::new(), xml);
    }

    #[test]
    fn test_count_mismatch_is_reported() {
        let mut ctx = ctx();
        let xml = "<clause><sourcecode>a <callout>1</callout> b <callout>2</callout></sourcecode><annotation>one</annotation></clause>";
        let out = run_with(&CalloutTransform::new(), xml, &mut ctx);
        assert_eq!(
            out,
            "<clause><sourcecode>a <callout>1</callout> b <callout>2</callout><annotation>one</annotation></sourcecode></clause>"
        );
        let warning = ctx.sink.with_code("S-3-1").next().unwrap();
        assert_eq!(warning.node.as_deref(), Some("<sourcecode/>"));
        assert_eq!(ctx.sink.len(), 1);
    }

    #[test]
    fn test_snippet_is_rendered() {
        let xml = "<sourcecode><pre-render>&lt;em&gt;x&lt;/em&gt; y</pre-render></sourcecode>";
        let out = run(&SnippetTransform::new(), xml);
        assert_eq!(out, "<sourcecode><em>x</em> y</sourcecode>");
    }

    struct Failing;

    impl SnippetRenderer for Failing {
        fn render(&self, _markup: &str) -> std::result::Result<String, SnippetError> {
            Err(SnippetError("converter unavailable".to_string()))
        }
    }

    #[test]
    fn test_snippet_failure_keeps_raw_text() {
        let mut ctx = ctx().with_snippet_renderer(Box::new(Failing));
        let xml = "<sourcecode><pre-render>*x*</pre-render></sourcecode>";
        let out = run_with(&SnippetTransform::new(), xml, &mut ctx);
        assert_eq!(out, "<sourcecode>*x*</sourcecode>");
        let warning = ctx.sink.with_code("S-2-3").next().unwrap();
        assert!(
            warning
                .problem
                .as_ref()
                .unwrap()
                .as_str()
                .contains("converter unavailable")
        );
    }
}
