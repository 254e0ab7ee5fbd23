//! DiagnosticCollector - the diagnostics sink shared by every normalization pass.
//!
//! Passes never raise on recoverable problems; they call
//! [`DiagnosticCollector::add`] with a category, the serialized offending node
//! (if any) and a message, and carry on.

use crate::builder::DiagnosticMessageBuilder;
use crate::diagnostic::{Category, DiagnosticKind, DiagnosticMessage};

/// Collector for diagnostic messages.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticCollector {
    diagnostics: Vec<DiagnosticMessage>,
}

impl DiagnosticCollector {
    /// Create a new diagnostic collector
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
        }
    }

    /// Record a diagnostic under `category`, attached to `node` when one is given.
    ///
    /// Warnings and errors are mirrored to `tracing` so a subscriber sees them
    /// as they happen.
    pub fn add(
        &mut self,
        category: Category,
        node: Option<String>,
        mut diagnostic: DiagnosticMessage,
    ) {
        diagnostic.category = Some(category);
        if node.is_some() {
            diagnostic.node = node;
        }

        match diagnostic.kind {
            DiagnosticKind::Error => tracing::error!(
                category = category.as_str(),
                code = diagnostic.code.as_deref().unwrap_or(""),
                "{}",
                diagnostic.message()
            ),
            DiagnosticKind::Warning => tracing::warn!(
                category = category.as_str(),
                code = diagnostic.code.as_deref().unwrap_or(""),
                "{}",
                diagnostic.message()
            ),
            DiagnosticKind::Info | DiagnosticKind::Note => tracing::debug!(
                category = category.as_str(),
                "{}",
                diagnostic.message()
            ),
        }

        self.diagnostics.push(diagnostic);
    }

    /// Record a warning with a catalog code, title and problem statement.
    pub fn warn(
        &mut self,
        category: Category,
        node: Option<String>,
        code: &str,
        title: &str,
        problem: impl Into<String>,
    ) {
        let diagnostic = DiagnosticMessageBuilder::warning(title)
            .with_code(code)
            .problem(problem.into())
            .build();
        self.add(category, node, diagnostic);
    }

    /// Record an informational message with a catalog code.
    pub fn info(
        &mut self,
        category: Category,
        node: Option<String>,
        code: &str,
        title: &str,
        problem: impl Into<String>,
    ) {
        let diagnostic = DiagnosticMessageBuilder::info(title)
            .with_code(code)
            .problem(problem.into())
            .build();
        self.add(category, node, diagnostic);
    }

    /// Check if any errors were collected (warnings don't count)
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::Error)
    }

    /// Number of collected diagnostics
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Get a reference to the collected diagnostics
    pub fn diagnostics(&self) -> &[DiagnosticMessage] {
        &self.diagnostics
    }

    /// Diagnostics filed under `category`, in recording order.
    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &DiagnosticMessage> {
        self.diagnostics
            .iter()
            .filter(move |d| d.category == Some(category))
    }

    /// Diagnostics carrying `code`, in recording order.
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a DiagnosticMessage> {
        self.diagnostics
            .iter()
            .filter(move |d| d.code.as_deref() == Some(code))
    }

    /// Move every diagnostic of `other` into this collector, keeping order.
    pub fn absorb(&mut self, other: DiagnosticCollector) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// Render all diagnostics to text strings
    pub fn to_text(&self) -> Vec<String> {
        self.diagnostics.iter().map(|d| d.to_text()).collect()
    }

    /// Render all diagnostics to JSON strings
    pub fn to_json(&self) -> Vec<String> {
        self.diagnostics
            .iter()
            .map(|d| d.to_json().to_string())
            .collect()
    }

    /// Consume the collector and return the diagnostics in recording order
    pub fn into_diagnostics(self) -> Vec<DiagnosticMessage> {
        self.diagnostics
    }
}
