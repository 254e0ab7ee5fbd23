/*
 * descriptor.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Citation list items parsed into typed reference descriptors.
 */

//! Reference descriptors.
//!
//! Each item of a citation list is matched against four grammars in priority
//! order. The first grammar that matches decides the descriptor variant and,
//! downstream, the renderer. Items that match nothing become
//! [`Grammar::Malformed`] and are still rendered, as a stub.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use standoc_xml::{Document, NodeId};

/// The year sentinel for "undated, to be determined".
pub const UNDATED: &str = "--";

static DATED_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?xs)
        ^<ref\ id="(?P<anchor>[^"]+)">
        \[(?P<label>\([^)]+\))?
        (?P<code>(?:ISO|IEC)[^0-9]*\s[0-9-]+|IEV)
        (?::(?P<year>[0-9][0-9-]+))?
        \]</ref>,?\s*(?P<text>.*)$"#,
    )
    .expect("dated reference pattern")
});

static UNDATED_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?xs)
        ^<ref\ id="(?P<anchor>[^"]+)">
        \[(?P<label>\([^)]+\))?
        (?P<code>(?:ISO|IEC)[^0-9]*\s[0-9-]+):
        (?:--|&\#821[12];|–|—)
        \]</ref>,?\s*
        (?:<fn[^>]*>\s*<p>(?P<fn>[^\]]+)</p>\s*</fn>)?,?\s?(?P<text>.*)$"#,
    )
    .expect("undated reference pattern")
});

static ALL_PARTS_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?xs)
        ^<ref\ id="(?P<anchor>[^"]+)">
        \[(?P<label>\([^)]+\))?
        (?P<code>(?:ISO|IEC)[^0-9]*\s[0-9]+)
        (?::(?P<year>--|&\#821[12];|–|—|[0-9][0-9-]+))?
        \s\(all\ parts\)\]</ref>,?\s*
        (?:<fn[^>]*>\s*<p>(?P<fn>[^\]]+)</p>\s*</fn>,?\s?)?(?P<text>.*)$"#,
    )
    .expect("all-parts reference pattern")
});

static GENERIC_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?xs)
        ^<ref\ id="(?P<anchor>[^"]+)">
        \[(?P<label>\([^)]+\))?
        (?P<code>[^\]]+?)
        (?:[:-](?P<year>(?:19|20)[0-9][0-9][0-9-]*))?
        \]</ref>,?\s*(?P<text>.*)$"#,
    )
    .expect("generic reference pattern")
});

static SCRAPE_ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<ref\s+id="([^"]+)""#).expect("anchor pattern"));

static SCRAPE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\([^)]+\))").expect("label pattern"));

static NOFETCH_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^nofetch\((?P<id>.+)\)$").expect("nofetch pattern"));

static REPO_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<kind>repo|path):\((?P<key>[^,)]+),?(?P<id>[^)]*)\)$").expect("repo pattern")
});

/// A dated standard, e.g. `[ISO 123:2001]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedRef {
    pub anchor: String,
    pub label: Option<String>,
    pub code: String,
    pub year: Option<String>,
    pub text: String,
}

/// A standard in preparation, e.g. `[ISO 123:--]` with a footnote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndatedRef {
    pub anchor: String,
    pub label: Option<String>,
    pub code: String,
    pub footnote: Option<String>,
    pub text: String,
}

/// A multi-part standard cited as a whole, e.g. `[ISO 123 (all parts)]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllPartsRef {
    pub anchor: String,
    pub label: Option<String>,
    pub code: String,
    /// A concrete year, [`UNDATED`], or `None`.
    pub year: Option<String>,
    pub footnote: Option<String>,
    pub text: String,
}

/// Anything else with a bracketed code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericRef {
    pub anchor: String,
    pub label: Option<String>,
    pub code: RefCode,
    pub year: Option<String>,
    pub text: String,
}

/// An item that matched no grammar. The anchor and label are scraped
/// best-effort from the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRef {
    pub anchor: Option<String>,
    pub label: Option<String>,
}

/// How a generic code is to be treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeKind {
    /// An identifier to look up.
    Plain,
    /// A bare number, rendered `[N]`.
    Numeric,
    /// `nofetch(X)`.
    NoFetch,
    /// `repo:(KEY,ID)`.
    Repository { key: String },
    /// `path:(KEY,ID)`.
    Path { key: String },
}

/// A generic reference code after analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefCode {
    pub id: String,
    pub kind: CodeKind,
}

impl RefCode {
    pub fn analyse(code: &str) -> Self {
        if let Some(caps) = NOFETCH_CODE.captures(code) {
            return Self {
                id: caps["id"].to_string(),
                kind: CodeKind::NoFetch,
            };
        }
        if let Some(caps) = REPO_CODE.captures(code) {
            let key = caps["key"].trim().to_string();
            let id = match caps["id"].trim() {
                "" => key.clone(),
                id => id.to_string(),
            };
            let kind = if &caps["kind"] == "repo" {
                CodeKind::Repository { key }
            } else {
                CodeKind::Path { key }
            };
            return Self { id, kind };
        }
        if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) {
            return Self {
                id: code.to_string(),
                kind: CodeKind::Numeric,
            };
        }
        Self {
            id: code.to_string(),
            kind: CodeKind::Plain,
        }
    }

    pub fn is_fetchable(&self) -> bool {
        matches!(self.kind, CodeKind::Plain)
    }
}

/// The grammar an item matched, carrying the extracted fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grammar {
    Dated(DatedRef),
    UndatedWithFootnote(UndatedRef),
    AllParts(AllPartsRef),
    Generic(GenericRef),
    Malformed(MalformedRef),
}

impl Grammar {
    pub fn name(&self) -> &'static str {
        match self {
            Grammar::Dated(_) => "dated",
            Grammar::UndatedWithFootnote(_) => "undated",
            Grammar::AllParts(_) => "all-parts",
            Grammar::Generic(_) => "generic",
            Grammar::Malformed(_) => "malformed",
        }
    }
}

/// One parsed citation list item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDescriptor {
    /// Position in the citation list. Assigned once, never changed.
    pub ordinal: usize,
    /// The item's rendered markup.
    pub raw: String,
    pub grammar: Grammar,
}

impl ReferenceDescriptor {
    /// Match `raw` against the grammars in priority order.
    pub fn parse(ordinal: usize, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let grammar = match_grammar(raw.trim());
        Self {
            ordinal,
            raw,
            grammar,
        }
    }

    pub fn anchor(&self) -> Option<&str> {
        match &self.grammar {
            Grammar::Dated(r) => Some(&r.anchor),
            Grammar::UndatedWithFootnote(r) => Some(&r.anchor),
            Grammar::AllParts(r) => Some(&r.anchor),
            Grammar::Generic(r) => Some(&r.anchor),
            Grammar::Malformed(r) => r.anchor.as_deref(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        match &self.grammar {
            Grammar::Dated(r) => r.label.as_deref(),
            Grammar::UndatedWithFootnote(r) => r.label.as_deref(),
            Grammar::AllParts(r) => r.label.as_deref(),
            Grammar::Generic(r) => r.label.as_deref(),
            Grammar::Malformed(r) => r.label.as_deref(),
        }
    }

    /// The code as written, or the analysed id for generic references.
    pub fn code(&self) -> Option<&str> {
        match &self.grammar {
            Grammar::Dated(r) => Some(&r.code),
            Grammar::UndatedWithFootnote(r) => Some(&r.code),
            Grammar::AllParts(r) => Some(&r.code),
            Grammar::Generic(r) => Some(&r.code.id),
            Grammar::Malformed(_) => None,
        }
    }

    /// The year: a concrete year, [`UNDATED`], or `None`.
    pub fn year(&self) -> Option<&str> {
        match &self.grammar {
            Grammar::Dated(r) => r.year.as_deref(),
            Grammar::UndatedWithFootnote(_) => Some(UNDATED),
            Grammar::AllParts(r) => r.year.as_deref(),
            Grammar::Generic(r) => r.year.as_deref(),
            Grammar::Malformed(_) => None,
        }
    }

    /// The year to request from a source: never the sentinel.
    pub fn concrete_year(&self) -> Option<&str> {
        self.year().filter(|y| *y != UNDATED)
    }

    pub fn text(&self) -> &str {
        match &self.grammar {
            Grammar::Dated(r) => &r.text,
            Grammar::UndatedWithFootnote(r) => &r.text,
            Grammar::AllParts(r) => &r.text,
            Grammar::Generic(r) => &r.text,
            Grammar::Malformed(_) => &self.raw,
        }
    }

    pub fn footnote(&self) -> Option<&str> {
        match &self.grammar {
            Grammar::UndatedWithFootnote(r) => r.footnote.as_deref(),
            Grammar::AllParts(r) => r.footnote.as_deref(),
            _ => None,
        }
    }

    pub fn all_parts(&self) -> bool {
        matches!(self.grammar, Grammar::AllParts(_))
    }

    /// Whether the resolver should try the bibliographic source at all.
    ///
    /// Standards in preparation, numeric and explicitly local codes and
    /// malformed items are rendered directly.
    pub fn is_fetchable(&self) -> bool {
        match &self.grammar {
            Grammar::Dated(_) => true,
            Grammar::AllParts(r) => r.year.as_deref() != Some(UNDATED),
            Grammar::Generic(r) => r.code.is_fetchable(),
            Grammar::UndatedWithFootnote(_) | Grammar::Malformed(_) => false,
        }
    }

    /// The code sent to the source and used in the cache key.
    pub fn lookup_code(&self) -> Option<String> {
        let code = self.code()?;
        Some(if self.all_parts() {
            format!("{} (all parts)", code)
        } else {
            code.to_string()
        })
    }
}

fn match_grammar(item: &str) -> Grammar {
    if let Some(caps) = DATED_REF.captures(item) {
        return Grammar::Dated(DatedRef {
            anchor: caps["anchor"].to_string(),
            label: opt(&caps, "label"),
            code: caps["code"].to_string(),
            year: opt(&caps, "year").map(|y| normalise_year(&y)),
            text: caps["text"].to_string(),
        });
    }
    if let Some(caps) = UNDATED_REF.captures(item) {
        return Grammar::UndatedWithFootnote(UndatedRef {
            anchor: caps["anchor"].to_string(),
            label: opt(&caps, "label"),
            code: caps["code"].to_string(),
            footnote: opt(&caps, "fn"),
            text: caps["text"].to_string(),
        });
    }
    if let Some(caps) = ALL_PARTS_REF.captures(item) {
        return Grammar::AllParts(AllPartsRef {
            anchor: caps["anchor"].to_string(),
            label: opt(&caps, "label"),
            code: caps["code"].to_string(),
            year: opt(&caps, "year").map(|y| normalise_year(&y)),
            footnote: opt(&caps, "fn"),
            text: caps["text"].to_string(),
        });
    }
    if let Some(caps) = GENERIC_REF.captures(item) {
        return Grammar::Generic(GenericRef {
            anchor: caps["anchor"].to_string(),
            label: opt(&caps, "label"),
            code: RefCode::analyse(&caps["code"]),
            year: opt(&caps, "year"),
            text: caps["text"].to_string(),
        });
    }
    Grammar::Malformed(MalformedRef {
        anchor: SCRAPE_ANCHOR
            .captures(item)
            .map(|c| c[1].to_string()),
        label: SCRAPE_LABEL.captures(item).map(|c| c[1].to_string()),
    })
}

fn opt(caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Dash variants all mean "undated".
fn normalise_year(year: &str) -> String {
    match year {
        "--" | "&#8211;" | "&#8212;" | "–" | "—" => UNDATED.to_string(),
        other => other.to_string(),
    }
}

/// An item of a citation list: the list item node and its markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationItem {
    pub node: NodeId,
    pub markup: String,
}

/// Collect the items of a `references` element.
///
/// Items are the `li` children of its direct `ul` children. A `li` holding a
/// single `p` is looked through.
pub fn citation_items(doc: &Document, references: NodeId) -> Vec<CitationItem> {
    let mut items = Vec::new();
    for list in doc.children_named(references, "ul") {
        for li in doc.children_named(list, "li") {
            let elements = doc.element_children(li);
            let content = match elements.as_slice() {
                [p] if doc.is_named(*p, "p")
                    && doc.children(li).iter().all(|c| *c == *p || doc.is_blank(*c)) =>
                {
                    *p
                }
                _ => li,
            };
            items.push(CitationItem {
                node: li,
                markup: doc.inner_xml(content).trim().to_string(),
            });
        }
    }
    items
}

/// Parse every item of a `references` element, assigning dense ordinals.
pub fn parse_citation_list(doc: &Document, references: NodeId) -> Vec<ReferenceDescriptor> {
    citation_items(doc, references)
        .into_iter()
        .enumerate()
        .map(|(ordinal, item)| ReferenceDescriptor::parse(ordinal, item.markup))
        .collect()
}
