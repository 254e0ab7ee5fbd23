//! A small XPath-like selection language.
//!
//! Supported syntax:
//!
//! | Form | Meaning |
//! |---|---|
//! | `//term` | every `term` element in the document |
//! | `/standard-document/sections` | absolute child path from the root |
//! | `./p`, `p` | child elements of the context node |
//! | `.//stem` | descendants of the context node |
//! | `..` | parent of the context node |
//! | `*` | any element |
//! | `[@a]`, `[not(@a)]` | attribute present / absent |
//! | `[@a='v']`, `[@a!='v']` | attribute equal / not equal |
//! | `[name]`, `[not(name)]` | has / lacks a child element `name` |
//! | `a | b` | union |
//!
//! Results are deduplicated and returned in document order.

use crate::{Document, NodeId, QueryError};
use std::collections::HashSet;

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    source: String,
    branches: Vec<Path>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Path {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    SelfNode,
    Parent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    HasAttr(String),
    NoAttr(String),
    AttrEq(String, String),
    AttrNe(String, String),
    HasChild(String),
    NoChild(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NameTest,
    predicates: Vec<Predicate>,
}

impl Query {
    /// Parse a path expression.
    ///
    /// # Example
    ///
    /// ```rust
    /// use standoc_xml::{Query, parse};
    ///
    /// let doc = parse("<d><table/><dl key='true'/><dl/></d>").unwrap();
    /// let query = Query::parse("//dl[@key='true'] | //table").unwrap();
    /// let found = doc.select(doc.root(), &query);
    /// assert_eq!(found.len(), 2);
    /// assert_eq!(doc.name(found[0]), Some("table"));
    /// ```
    pub fn parse(source: &str) -> Result<Self, QueryError> {
        let branches = split_top_level(source, '|')
            .into_iter()
            .map(|branch| parse_path(source, branch.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: source.to_string(),
            branches,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Split on `sep` outside brackets, parentheses and quotes.
fn split_top_level(source: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in source.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, c) if c == sep && depth == 0 => {
                parts.push(&source[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&source[start..]);
    parts
}

fn parse_path(query: &str, branch: &str) -> Result<Path, QueryError> {
    if branch.is_empty() {
        return Err(QueryError::new(query, "empty path"));
    }

    let (absolute, first_axis, rest) = if let Some(rest) = branch.strip_prefix("//") {
        (true, Axis::Descendant, rest)
    } else if let Some(rest) = branch.strip_prefix('/') {
        (true, Axis::Child, rest)
    } else if let Some(rest) = branch.strip_prefix(".//") {
        (false, Axis::Descendant, rest)
    } else if let Some(rest) = branch.strip_prefix("./") {
        (false, Axis::Child, rest)
    } else {
        (false, Axis::Child, branch)
    };

    let mut steps = Vec::new();
    let mut axis = first_axis;
    let segments = split_top_level(rest, '/');
    let mut iter = segments.into_iter().peekable();
    while let Some(segment) = iter.next() {
        if segment.is_empty() {
            // `a//b` splits into "a", "", "b"
            if iter.peek().is_none() {
                return Err(QueryError::new(query, "path ends with `/`"));
            }
            axis = Axis::Descendant;
            continue;
        }
        steps.push(parse_step(query, segment.trim(), axis)?);
        axis = Axis::Child;
    }

    if steps.is_empty() {
        return Err(QueryError::new(query, "path has no steps"));
    }

    Ok(Path { absolute, steps })
}

fn parse_step(query: &str, segment: &str, axis: Axis) -> Result<Step, QueryError> {
    match segment {
        "." => {
            return Ok(Step {
                axis: Axis::SelfNode,
                test: NameTest::Any,
                predicates: Vec::new(),
            });
        }
        ".." => {
            return Ok(Step {
                axis: Axis::Parent,
                test: NameTest::Any,
                predicates: Vec::new(),
            });
        }
        _ => {}
    }

    let name_end = segment.find('[').unwrap_or(segment.len());
    let name = segment[..name_end].trim();
    let test = match name {
        "*" => NameTest::Any,
        "" => return Err(QueryError::new(query, "missing name test")),
        n if n.chars().all(is_name_char) => NameTest::Name(n.to_string()),
        n => return Err(QueryError::new(query, format!("invalid name `{}`", n))),
    };

    let mut predicates = Vec::new();
    let mut rest = &segment[name_end..];
    while !rest.is_empty() {
        let inner_end = rest
            .find(']')
            .ok_or_else(|| QueryError::new(query, "unclosed `[`"))?;
        if !rest.starts_with('[') {
            return Err(QueryError::new(query, format!("unexpected `{}`", rest)));
        }
        predicates.push(parse_predicate(query, rest[1..inner_end].trim())?);
        rest = &rest[inner_end + 1..];
    }

    Ok(Step {
        axis,
        test,
        predicates,
    })
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn parse_predicate(query: &str, text: &str) -> Result<Predicate, QueryError> {
    if let Some(inner) = text.strip_prefix("not(").and_then(|t| t.strip_suffix(')')) {
        let inner = inner.trim();
        return match inner.strip_prefix('@') {
            Some(attr) => Ok(Predicate::NoAttr(attr.to_string())),
            None if inner.chars().all(is_name_char) && !inner.is_empty() => {
                Ok(Predicate::NoChild(inner.to_string()))
            }
            None => Err(QueryError::new(query, format!("unsupported `not({})`", inner))),
        };
    }

    if let Some(attr) = text.strip_prefix('@') {
        if let Some((name, value)) = attr.split_once("!=") {
            return Ok(Predicate::AttrNe(
                name.trim().to_string(),
                unquote(query, value.trim())?,
            ));
        }
        if let Some((name, value)) = attr.split_once('=') {
            return Ok(Predicate::AttrEq(
                name.trim().to_string(),
                unquote(query, value.trim())?,
            ));
        }
        return Ok(Predicate::HasAttr(attr.trim().to_string()));
    }

    if !text.is_empty() && text.chars().all(is_name_char) {
        return Ok(Predicate::HasChild(text.to_string()));
    }

    Err(QueryError::new(query, format!("unsupported predicate `[{}]`", text)))
}

fn unquote(query: &str, value: &str) -> Result<String, QueryError> {
    let quoted = (value.starts_with('\'') && value.ends_with('\''))
        || (value.starts_with('"') && value.ends_with('"'));
    if value.len() >= 2 && quoted {
        Ok(value[1..value.len() - 1].to_string())
    } else {
        Err(QueryError::new(query, format!("expected quoted value, found `{}`", value)))
    }
}

impl Document {
    /// Evaluate `query` with `context` as the context node.
    pub fn select(&self, context: NodeId, query: &Query) -> Vec<NodeId> {
        let mut results = Vec::new();
        for path in &query.branches {
            results.extend(self.select_path(context, path));
        }
        if query.branches.len() > 1 {
            self.sort_unique(&mut results);
        }
        results
    }

    /// Parse and evaluate a path expression.
    ///
    /// # Example
    ///
    /// ```rust
    /// use standoc_xml::parse;
    ///
    /// let doc = parse("<term><p><preferred/></p><p/></term>").unwrap();
    /// let found = doc.select_str(doc.root(), "//p[preferred]").unwrap();
    /// assert_eq!(found.len(), 1);
    /// ```
    pub fn select_str(&self, context: NodeId, query: &str) -> Result<Vec<NodeId>, QueryError> {
        Ok(self.select(context, &Query::parse(query)?))
    }

    /// Evaluate from the root and return the first hit.
    pub fn find_first(&self, context: NodeId, query: &str) -> Result<Option<NodeId>, QueryError> {
        Ok(self.select_str(context, query)?.into_iter().next())
    }

    fn select_path(&self, context: NodeId, path: &Path) -> Vec<NodeId> {
        let mut steps = path.steps.iter();
        let mut current: Vec<NodeId> = match steps.next() {
            None => return Vec::new(),
            Some(first) if path.absolute => {
                let root = self.root();
                let candidates: Vec<NodeId> = match first.axis {
                    Axis::Descendant => std::iter::once(root)
                        .chain(self.descendants(root))
                        .collect(),
                    _ => vec![root],
                };
                candidates
                    .into_iter()
                    .filter(|n| self.step_matches(*n, first))
                    .collect()
            }
            Some(first) => self.apply_step(&[context], first),
        };

        for step in steps {
            current = self.apply_step(&current, step);
        }
        current
    }

    fn apply_step(&self, contexts: &[NodeId], step: &Step) -> Vec<NodeId> {
        let mut out = Vec::new();
        for context in contexts {
            let candidates: Vec<NodeId> = match step.axis {
                Axis::Child => self.children(*context).to_vec(),
                Axis::Descendant => self.descendants(*context),
                Axis::SelfNode => vec![*context],
                Axis::Parent => self.parent(*context).into_iter().collect(),
            };
            out.extend(
                candidates
                    .into_iter()
                    .filter(|n| self.step_matches(*n, step)),
            );
        }
        if contexts.len() > 1 {
            self.sort_unique(&mut out);
        }
        out
    }

    fn step_matches(&self, node: NodeId, step: &Step) -> bool {
        let Some(name) = self.name(node) else {
            return false;
        };
        if let NameTest::Name(expected) = &step.test {
            if name != expected {
                return false;
            }
        }
        step.predicates.iter().all(|p| match p {
            Predicate::HasAttr(a) => self.has_attr(node, a),
            Predicate::NoAttr(a) => !self.has_attr(node, a),
            Predicate::AttrEq(a, v) => self.attr(node, a) == Some(v.as_str()),
            Predicate::AttrNe(a, v) => self.attr(node, a).is_some_and(|x| x != v),
            Predicate::HasChild(c) => self.first_child_named(node, c).is_some(),
            Predicate::NoChild(c) => self.first_child_named(node, c).is_none(),
        })
    }

    fn sort_unique(&self, nodes: &mut Vec<NodeId>) {
        let order = self.document_order();
        let mut seen = HashSet::new();
        nodes.retain(|n| seen.insert(*n));
        // Detached nodes sort last, in arena order.
        nodes.sort_by_key(|n| (order.get(n).copied().unwrap_or(usize::MAX), n.index()));
    }
}
