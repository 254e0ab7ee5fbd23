//! Core diagnostic message types.
//!
//! This module defines the structures for representing diagnostic messages
//! (errors, warnings, info) following tidyverse-style guidelines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// An error that prevents completion
    Error,
    /// A warning that doesn't prevent completion but indicates a problem
    Warning,
    /// Informational message
    Info,
    /// A note providing additional context
    Note,
}

impl DiagnosticKind {
    fn label(self) -> &'static str {
        match self {
            DiagnosticKind::Error => "Error",
            DiagnosticKind::Warning => "Warning",
            DiagnosticKind::Info => "Info",
            DiagnosticKind::Note => "Note",
        }
    }
}

/// How detail items should be presented (tidyverse x/i bullet style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetailKind {
    /// Error detail (✖ bullet in tidyverse style)
    Error,
    /// Info detail (i bullet in tidyverse style)
    Info,
    /// Note detail (plain bullet)
    Note,
}

impl DetailKind {
    fn bullet(self) -> &'static str {
        match self {
            DetailKind::Error => "✖",
            DetailKind::Info => "ℹ",
            DetailKind::Note => "•",
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            DetailKind::Error => "error",
            DetailKind::Info => "info",
            DetailKind::Note => "note",
        }
    }
}

/// The area of the document model a diagnostic was filed under.
///
/// Reporting collaborators group and filter on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Identifier canonicalization and uniqueness
    Anchors,
    /// Citation resolution and the bibliographic caches
    Bibliography,
    /// Malformed input from the upstream parser
    Input,
    /// Structural rewrites (callouts, notes, key lists)
    Structure,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Anchors => "Anchors",
            Category::Bibliography => "Bibliography",
            Category::Input => "Input",
            Category::Structure => "Structure",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The content of a message or detail item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageContent {
    /// Plain text content
    Plain(String),
    /// Markdown content
    Markdown(String),
}

impl MessageContent {
    /// Get the raw string content for display
    pub fn as_str(&self) -> &str {
        match self {
            MessageContent::Plain(s) => s,
            MessageContent::Markdown(s) => s,
        }
    }

    /// Convert to JSON value with type information
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            MessageContent::Plain(s) => json!({
                "type": "plain",
                "content": s
            }),
            MessageContent::Markdown(s) => json!({
                "type": "markdown",
                "content": s
            }),
        }
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Markdown(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Markdown(s.to_string())
    }
}

/// A detail item in a diagnostic message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailItem {
    /// The kind of detail (error, info, note)
    pub kind: DetailKind,
    /// The content of the detail
    pub content: MessageContent,
}

/// A diagnostic message following tidyverse-style structure.
///
/// Structure:
/// 1. **Code**: Optional catalog code (e.g., "S-1-1") for searchability
/// 2. **Title**: Brief message
/// 3. **Kind**: Error, Warning, Info
/// 4. **Problem**: What went wrong
/// 5. **Details**: Specific information (bulleted)
/// 6. **Hints**: Optional guidance for fixing (ends with ?)
///
/// The tree has no source positions, so a diagnostic points at the offending
/// node through its serialized form (an empty element carrying the node's
/// attributes, e.g. `<clause id="a_b"/>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticMessage {
    /// Optional catalog code (e.g., "S-1-1")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Brief title for the message
    pub title: String,

    /// The kind of diagnostic (Error, Warning, Info)
    pub kind: DiagnosticKind,

    /// The problem statement
    pub problem: Option<MessageContent>,

    /// Specific details
    pub details: Vec<DetailItem>,

    /// Optional hints for fixing (ends with ?)
    pub hints: Vec<MessageContent>,

    /// Category this diagnostic was filed under, set by the collector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,

    /// Serialized form of the node the diagnostic concerns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

impl DiagnosticMessage {
    /// Create a new diagnostic message with just a title and kind.
    ///
    /// Note: Consider using [`crate::DiagnosticMessageBuilder`] instead for better structure.
    pub fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            code: None,
            title: title.into(),
            kind,
            problem: None,
            details: Vec::new(),
            hints: Vec::new(),
            category: None,
            node: None,
        }
    }

    /// Create an error diagnostic.
    pub fn error(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, title)
    }

    /// Create a warning diagnostic.
    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, title)
    }

    /// Create an info diagnostic.
    pub fn info(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Info, title)
    }

    /// Set the catalog code.
    ///
    /// # Example
    ///
    /// ```
    /// use standoc_error_reporting::DiagnosticMessage;
    ///
    /// let msg = DiagnosticMessage::error("XML Syntax Error").with_code("S-9-1");
    /// assert_eq!(msg.code.as_deref(), Some("S-9-1"));
    /// ```
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Get the documentation URL for this message, if its code has one.
    ///
    /// # Example
    ///
    /// ```
    /// use standoc_error_reporting::DiagnosticMessage;
    ///
    /// let msg = DiagnosticMessage::error("Internal Error").with_code("S-0-1");
    /// assert!(msg.docs_url().is_some());
    /// ```
    pub fn docs_url(&self) -> Option<&str> {
        self.code
            .as_ref()
            .and_then(|code| crate::catalog::get_docs_url(code))
    }

    /// The problem statement if present, otherwise the title.
    ///
    /// This is the one-line human-readable message handed to logging.
    pub fn message(&self) -> &str {
        self.problem
            .as_ref()
            .map_or(self.title.as_str(), |p| p.as_str())
    }

    /// Render this diagnostic message as text following tidyverse style.
    ///
    /// Format:
    /// ```text
    /// Warning [S-1-1] (Anchors): title
    /// Problem statement here
    ///   at <clause id="a_b"/>
    /// ✖ Error detail
    /// ℹ Info detail
    /// • Note detail
    /// ? Hint
    /// ```
    ///
    /// # Example
    ///
    /// ```
    /// use standoc_error_reporting::DiagnosticMessageBuilder;
    ///
    /// let msg = DiagnosticMessageBuilder::error("Invalid input")
    ///     .problem("Values must be numeric")
    ///     .add_detail("Found text in column 3")
    ///     .add_hint("Convert to numbers first?")
    ///     .build();
    /// let text = msg.to_text();
    /// assert!(text.contains("Error: Invalid input"));
    /// assert!(text.contains("Values must be numeric"));
    /// ```
    pub fn to_text(&self) -> String {
        use std::fmt::Write;

        let mut result = String::new();

        result.push_str(self.kind.label());
        if let Some(code) = &self.code {
            let _ = write!(result, " [{}]", code);
        }
        if let Some(category) = &self.category {
            let _ = write!(result, " ({})", category);
        }
        let _ = writeln!(result, ": {}", self.title);

        if let Some(problem) = &self.problem {
            let _ = writeln!(result, "{}", problem.as_str());
        }

        if let Some(node) = &self.node {
            let _ = writeln!(result, "  at {}", node);
        }

        for detail in &self.details {
            let _ = writeln!(result, "{} {}", detail.kind.bullet(), detail.content.as_str());
        }

        for hint in &self.hints {
            let _ = writeln!(result, "? {}", hint.as_str());
        }

        result
    }

    /// Render this diagnostic message as a JSON value.
    ///
    /// # Example
    ///
    /// ```
    /// use standoc_error_reporting::DiagnosticMessage;
    ///
    /// let msg = DiagnosticMessage::error("Something went wrong");
    /// let json = msg.to_json();
    /// assert_eq!(json["kind"], "error");
    /// assert_eq!(json["title"], "Something went wrong");
    /// ```
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        let kind_str = match self.kind {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Info => "info",
            DiagnosticKind::Note => "note",
        };

        let mut obj = json!({
            "kind": kind_str,
            "title": self.title,
        });

        if let Some(code) = &self.code {
            obj["code"] = json!(code);
        }

        if let Some(category) = &self.category {
            obj["category"] = json!(category.as_str());
        }

        if let Some(problem) = &self.problem {
            obj["problem"] = problem.to_json();
        }

        if let Some(node) = &self.node {
            obj["node"] = json!(node);
        }

        if !self.details.is_empty() {
            let details: Vec<_> = self
                .details
                .iter()
                .map(|d| {
                    json!({
                        "kind": d.kind.as_str(),
                        "content": d.content.to_json()
                    })
                })
                .collect();
            obj["details"] = json!(details);
        }

        if !self.hints.is_empty() {
            let hints: Vec<_> = self.hints.iter().map(|h| h.to_json()).collect();
            obj["hints"] = json!(hints);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_kind() {
        assert_eq!(DiagnosticKind::Error, DiagnosticKind::Error);
        assert_ne!(DiagnosticKind::Error, DiagnosticKind::Warning);
    }

    #[test]
    fn test_message_content_from_str() {
        let content: MessageContent = "test".into();
        assert_eq!(content.as_str(), "test");
    }

    #[test]
    fn test_message_prefers_problem() {
        let mut msg = DiagnosticMessage::warning("Duplicate Identifier");
        assert_eq!(msg.message(), "Duplicate Identifier");

        msg.problem = Some("identifier `x` already in use".into());
        assert_eq!(msg.message(), "identifier `x` already in use");
    }

    #[test]
    fn test_to_text_with_category_and_node() {
        let mut msg = DiagnosticMessage::warning("Identifier Normalised").with_code("S-1-1");
        msg.category = Some(Category::Anchors);
        msg.node = Some("<clause id=\"a_b\"/>".to_string());
        msg.problem = Some("normalised identifier in <clause id=\"a_b\"/> from a:b".into());

        let text = msg.to_text();
        assert_eq!(
            text,
            "Warning [S-1-1] (Anchors): Identifier Normalised\n\
             normalised identifier in <clause id=\"a_b\"/> from a:b\n  \
             at <clause id=\"a_b\"/>\n"
        );
    }

    #[test]
    fn test_to_json_fields() {
        let mut msg = DiagnosticMessage::warning("Reference Not Retrieved").with_code("S-4-1");
        msg.category = Some(Category::Bibliography);
        msg.details.push(DetailItem {
            kind: DetailKind::Info,
            content: "cache key ISO(ISO 123:2001)".into(),
        });

        let json = msg.to_json();
        assert_eq!(json["kind"], "warning");
        assert_eq!(json["code"], "S-4-1");
        assert_eq!(json["category"], "Bibliography");
        assert_eq!(json["details"][0]["kind"], "info");
        assert!(json.get("node").is_none());
    }
}
