/*
 * symbols.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Collation of symbol lists.
 */

//! Collation of symbol lists.
//!
//! The `dl` of a `definitions` section is sorted by a collation key derived
//! from each `dt`: embedded math is flattened to ASCII, punctuation sorts
//! before letters and digits sort after them.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use standoc_xml::{Document, NodeId};

use crate::Result;
use crate::context::RunContext;
use crate::transform::TreeTransform;
use crate::transforms::anchors::to_ncname;
use crate::transforms::sort_groups;

static LETTER_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]+").expect("letter run pattern"));

const GREEK: &[(&str, char, char)] = &[
    ("alpha", 'α', 'Α'),
    ("beta", 'β', 'Β'),
    ("gamma", 'γ', 'Γ'),
    ("delta", 'δ', 'Δ'),
    ("epsilon", 'ε', 'Ε'),
    ("zeta", 'ζ', 'Ζ'),
    ("eta", 'η', 'Η'),
    ("theta", 'θ', 'Θ'),
    ("iota", 'ι', 'Ι'),
    ("kappa", 'κ', 'Κ'),
    ("lambda", 'λ', 'Λ'),
    ("mu", 'μ', 'Μ'),
    ("nu", 'ν', 'Ν'),
    ("xi", 'ξ', 'Ξ'),
    ("omicron", 'ο', 'Ο'),
    ("pi", 'π', 'Π'),
    ("rho", 'ρ', 'Ρ'),
    ("sigma", 'σ', 'Σ'),
    ("tau", 'τ', 'Τ'),
    ("upsilon", 'υ', 'Υ'),
    ("phi", 'φ', 'Φ'),
    ("chi", 'χ', 'Χ'),
    ("psi", 'ψ', 'Ψ'),
    ("omega", 'ω', 'Ω'),
];

/// Sorts symbol lists and gives their entries stable ids.
pub struct SymbolCollatorTransform;

impl SymbolCollatorTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SymbolCollatorTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeTransform for SymbolCollatorTransform {
    fn name(&self) -> &str {
        "symbols"
    }

    fn transform(&self, doc: &mut Document, _ctx: &mut RunContext) -> Result<()> {
        let root = doc.root();
        for dl in doc.select_str(root, "//definitions/dl")? {
            for dt in doc.children_named(dl, "dt") {
                if !doc.has_attr(dt, "id") {
                    let id = format!("symbol-{}", to_ncname(&symbol_id_text(doc, dt)));
                    doc.set_attr(dt, "id", id);
                }
            }
            sort_groups(
                doc,
                dl,
                |doc, child| doc.is_named(child, "dt"),
                |doc, dt| (collation_key(&flatten(doc, dt)), doc.to_xml(dt)),
            );
        }
        Ok(())
    }
}

/// Collation key of flattened symbol text.
///
/// Lower-cases, drops brackets and whitespace, prefixes punctuation with `:`
/// and digit runs with `þ`.
///
/// ```rust
/// use standoc_core::transforms::collation_key;
///
/// assert_eq!(collation_key("x_1_"), "x:_þ1:_");
/// assert_eq!(collation_key("f(x) = 10"), "fx:=þ10");
/// ```
pub fn collation_key(text: &str) -> String {
    let mut key = String::with_capacity(text.len());
    let mut in_digits = false;
    for c in text.to_lowercase().chars() {
        if c.is_whitespace() || "[]{}<>()".contains(c) {
            continue;
        }
        if c.is_ascii_digit() {
            if !in_digits {
                key.push('þ');
            }
            in_digits = true;
            key.push(c);
            continue;
        }
        in_digits = false;
        if !c.is_alphanumeric() {
            key.push(':');
        }
        key.push(c);
    }
    key
}

/// Replace spelled-out Greek letter names with the letters.
fn expand_greek(text: &str) -> String {
    LETTER_RUN
        .replace_all(text, |caps: &Captures| {
            let word = &caps[0];
            for (name, lower, upper) in GREEK {
                if word == *name {
                    return lower.to_string();
                }
                let capitalized = format!("{}{}", name[..1].to_ascii_uppercase(), &name[1..]);
                if word == capitalized {
                    return upper.to_string();
                }
            }
            word.to_string()
        })
        .into_owned()
}

/// The text a `dt` collates by, with math flattened.
fn flatten(doc: &Document, id: NodeId) -> String {
    if let Some(text) = doc.text(id) {
        return text.to_string();
    }
    if doc.is_named(id, "stem") {
        let math = if doc.attr(id, "type") == Some("MathML") {
            doc.element_children(id)
                .into_iter()
                .map(|c| flatten_mathml(doc, c))
                .collect()
        } else {
            doc.text_content(id)
        };
        return expand_greek(&math);
    }
    doc.children(id).iter().map(|c| flatten(doc, *c)).collect()
}

fn flatten_mathml(doc: &Document, id: NodeId) -> String {
    if let Some(text) = doc.text(id) {
        return text.trim().to_string();
    }
    let parts: Vec<String> = doc
        .element_children(id)
        .into_iter()
        .map(|c| flatten_mathml(doc, c))
        .collect();
    let part = |i: usize| parts.get(i).map(String::as_str).unwrap_or("");
    match doc.name(id) {
        Some("mi" | "mn" | "mo" | "mtext" | "ms") => doc.text_content(id).trim().to_string(),
        Some("msub") => format!("{}_{}", part(0), part(1)),
        Some("msup") => format!("{}^{}", part(0), part(1)),
        Some("msubsup") => format!("{}_{}^{}", part(0), part(1), part(2)),
        Some("mfrac") => format!("{}/{}", part(0), part(1)),
        Some("msqrt") => format!("sqrt({})", parts.concat()),
        Some("mroot") => format!("root({})({})", part(1), part(0)),
        _ => parts.concat(),
    }
}

/// Text a `dt` id is derived from: math contributes `_-<text>-`.
fn symbol_id_text(doc: &Document, dt: NodeId) -> String {
    fn collect(doc: &Document, id: NodeId, out: &mut String) {
        if let Some(text) = doc.text(id) {
            out.push_str(text);
        } else if doc.is_named(id, "stem") {
            let math: String = doc
                .text_content(id)
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            out.push_str("_-");
            out.push_str(&math);
            out.push('-');
        } else {
            for child in doc.children(id) {
                collect(doc, *child, out);
            }
        }
    }
    let mut out = String::new();
    collect(doc, dt, &mut out);
    out.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::testing::{assert_idempotent, run};

    #[test]
    fn test_collation_key() {
        assert_eq!(collation_key("Xa"), "xa");
        assert_eq!(collation_key("x_m_"), "x:_m:_");
        assert_eq!(collation_key("a^{2}"), "a:^þ2");
        assert_eq!(collation_key("H2O 12"), "hþ2oþ12");
        assert_eq!(collation_key("α"), "α");
    }

    #[test]
    fn test_expand_greek() {
        assert_eq!(expand_greek("alpha"), "α");
        assert_eq!(expand_greek("x_Omega"), "x_Ω");
        assert_eq!(expand_greek("alphabet beta"), "alphabet β");
    }

    fn entry(dt: &str, n: usize) -> String {
        format!("<dt>{dt}</dt><dd><p>Definition {n}</p></dd>")
    }

    #[test]
    fn test_symbols_are_collated() {
        let math_n = r#"<stem type="MathML"><math><mi>n</mi></math></stem>"#;
        let xml = format!(
            "<definitions><dl>{}{}{}{}{}{}{}</dl></definitions>",
            entry("α", 1),
            entry("Xa", 2),
            entry("x_1_", 3),
            entry("x_m_", 4),
            entry("x", 5),
            entry(math_n, 6),
            entry("m", 7),
        );
        let out = run(&SymbolCollatorTransform::new(), &xml);
        let math_dt = format!(r#"<dt id="symbol-_-n-">{math_n}</dt><dd><p>Definition 6</p></dd>"#);
        let expected = [
            "<definitions><dl>",
            r#"<dt id="symbol-m">m</dt><dd><p>Definition 7</p></dd>"#,
            &math_dt,
            r#"<dt id="symbol-x">x</dt><dd><p>Definition 5</p></dd>"#,
            r#"<dt id="symbol-x_m_">x_m_</dt><dd><p>Definition 4</p></dd>"#,
            r#"<dt id="symbol-x_1_">x_1_</dt><dd><p>Definition 3</p></dd>"#,
            r#"<dt id="symbol-xa">Xa</dt><dd><p>Definition 2</p></dd>"#,
            r#"<dt id="symbol-__x3b1_">α</dt><dd><p>Definition 1</p></dd>"#,
            "</dl></definitions>",
        ]
        .concat();
        assert_eq!(out, expected);
        assert_idempotent(&SymbolCollatorTransform::new(), &xml);
    }

    #[test]
    fn test_mathml_symbols_flatten() {
        let sub = |b: &str| {
            format!(
                r#"<stem type="MathML"><math><msub><mrow><mi>x</mi></mrow><mrow>{b}</mrow></msub></math></stem>"#
            )
        };
        let alpha = r#"<stem type="AsciiMath">alpha</stem>"#;
        let xml = format!(
            "<definitions><dl>{}{}{}{}{}</dl></definitions>",
            entry(alpha, 1),
            entry("xa", 2),
            entry(&sub("<mn>1</mn>"), 3),
            entry(&sub("<mi>m</mi>"), 4),
            entry("x", 5),
        );
        let out = run(&SymbolCollatorTransform::new(), &xml);
        let ids: Vec<&str> = out
            .split(r#"<dt id=""#)
            .skip(1)
            .filter_map(|s| s.split('"').next())
            .collect();
        assert_eq!(
            ids,
            vec!["symbol-x", "symbol-_-xm-", "symbol-_-x1-", "symbol-xa", "symbol-_-alpha-"]
        );
    }

    #[test]
    fn test_existing_ids_are_kept_and_other_lists_ignored() {
        let xml = r#"<doc><definitions><dl><dt id="b1">b</dt><dd/><dt id="a1">a</dt><dd/></dl></definitions><clause><dl><dt>z</dt><dd/><dt>a</dt><dd/></dl></clause></doc>"#;
        let out = run(&SymbolCollatorTransform::new(), xml);
        assert_eq!(
            out,
            r#"<doc><definitions><dl><dt id="a1">a</dt><dd/><dt id="b1">b</dt><dd/></dl></definitions><clause><dl><dt>z</dt><dd/><dt>a</dt><dd/></dl></clause></doc>"#
        );
    }
}
