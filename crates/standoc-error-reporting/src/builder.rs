//! Builder API for diagnostic messages.
//!
//! The builder follows the tidyverse four-part structure: a title (via
//! `.error()`, `.warning()`, `.info()`), a problem statement (`.problem()`),
//! details (`.add_detail()`, `.add_info()`, `.add_note()`) and hints
//! (`.add_hint()`).

use crate::diagnostic::{
    Category, DetailItem, DetailKind, DiagnosticKind, DiagnosticMessage, MessageContent,
};

/// Code used for diagnostics created without a dedicated catalog entry.
pub const GENERIC_CODE: &str = "S-0-99";

/// Builder for creating diagnostic messages.
///
/// # Example
///
/// ```
/// use standoc_error_reporting::{Category, DiagnosticMessageBuilder};
///
/// let warning = DiagnosticMessageBuilder::warning("Callout Count Mismatch")
///     .with_code("S-3-1")
///     .with_category(Category::Structure)
///     .problem("Source code block has 2 callouts but 3 annotations")
///     .add_hint("Add an annotation for every callout?")
///     .build();
///
/// assert_eq!(warning.title, "Callout Count Mismatch");
/// assert_eq!(warning.code.as_deref(), Some("S-3-1"));
/// assert_eq!(warning.hints.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct DiagnosticMessageBuilder {
    kind: DiagnosticKind,
    title: String,
    code: Option<String>,
    problem: Option<MessageContent>,
    details: Vec<DetailItem>,
    hints: Vec<MessageContent>,
    category: Option<Category>,
    node: Option<String>,
}

impl DiagnosticMessageBuilder {
    /// Create a new builder with the specified kind and title.
    ///
    /// Most code should use `.error()`, `.warning()` or `.info()` instead.
    pub fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            code: None,
            problem: None,
            details: Vec::new(),
            hints: Vec::new(),
            category: None,
            node: None,
        }
    }

    /// Create an error diagnostic builder.
    pub fn error(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, title)
    }

    /// Create a warning diagnostic builder.
    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, title)
    }

    /// Create an info diagnostic builder.
    pub fn info(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Info, title)
    }

    /// Build a generic error carrying the source file and line that raised it.
    ///
    /// Used by the [`generic_error!`](crate::generic_error) macro.
    pub fn generic_error(message: impl Into<String>, file: &str, line: u32) -> DiagnosticMessage {
        Self::error(format!("{} ({}:{})", message.into(), file, line))
            .with_code(GENERIC_CODE)
            .build()
    }

    /// Build a generic warning carrying the source file and line that raised it.
    ///
    /// Used by the [`generic_warning!`](crate::generic_warning) macro.
    pub fn generic_warning(
        message: impl Into<String>,
        file: &str,
        line: u32,
    ) -> DiagnosticMessage {
        Self::warning(format!("{} ({}:{})", message.into(), file, line))
            .with_code(GENERIC_CODE)
            .build()
    }

    /// Set the catalog code (`S-<subsystem>-<number>`).
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the category. The collector overwrites this when one is given to `add`.
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Attach the serialized node the diagnostic concerns.
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Set the problem statement.
    ///
    /// The problem statement should use "must" for requirements or "can't"
    /// for impossibilities.
    pub fn problem(mut self, stmt: impl Into<MessageContent>) -> Self {
        self.problem = Some(stmt.into());
        self
    }

    /// Add an error detail (displayed with error/cross bullet).
    pub fn add_detail(mut self, detail: impl Into<MessageContent>) -> Self {
        self.details.push(DetailItem {
            kind: DetailKind::Error,
            content: detail.into(),
        });
        self
    }

    /// Add an info detail (displayed with info bullet).
    pub fn add_info(mut self, info: impl Into<MessageContent>) -> Self {
        self.details.push(DetailItem {
            kind: DetailKind::Info,
            content: info.into(),
        });
        self
    }

    /// Add a note detail (displayed with plain bullet).
    pub fn add_note(mut self, note: impl Into<MessageContent>) -> Self {
        self.details.push(DetailItem {
            kind: DetailKind::Note,
            content: note.into(),
        });
        self
    }

    /// Add a hint for fixing the problem. Hints that suggest an action end with `?`.
    pub fn add_hint(mut self, hint: impl Into<MessageContent>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// Build the diagnostic message.
    pub fn build(self) -> DiagnosticMessage {
        DiagnosticMessage {
            code: self.code,
            title: self.title,
            kind: self.kind,
            problem: self.problem,
            details: self.details,
            hints: self.hints,
            category: self.category,
            node: self.node,
        }
    }

    /// Build with validation.
    ///
    /// Returns warnings as a Vec of strings:
    /// - no problem statement (recommended but not required)
    /// - more than 5 details (overwhelming for users)
    ///
    /// An empty Vec means validation passed.
    pub fn build_with_validation(self) -> (DiagnosticMessage, Vec<String>) {
        let mut warnings = Vec::new();

        if self.problem.is_none() {
            warnings.push(
                "Diagnostic missing problem statement. \
                Consider adding .problem() to explain what went wrong."
                    .to_string(),
            );
        }

        if self.details.len() > 5 {
            warnings.push(format!(
                "Diagnostic has {} details. Tidyverse guidelines recommend max 5 to avoid \
                overwhelming users.",
                self.details.len()
            ));
        }

        (self.build(), warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_kinds() {
        assert_eq!(
            DiagnosticMessageBuilder::error("e").build().kind,
            DiagnosticKind::Error
        );
        assert_eq!(
            DiagnosticMessageBuilder::warning("w").build().kind,
            DiagnosticKind::Warning
        );
        assert_eq!(
            DiagnosticMessageBuilder::info("i").build().kind,
            DiagnosticKind::Info
        );
    }

    #[test]
    fn test_builder_details() {
        let msg = DiagnosticMessageBuilder::error("Test")
            .add_detail("Detail 1")
            .add_info("Info 1")
            .add_note("Note 1")
            .build();

        assert_eq!(msg.details.len(), 3);
        assert_eq!(msg.details[0].kind, DetailKind::Error);
        assert_eq!(msg.details[1].kind, DetailKind::Info);
        assert_eq!(msg.details[2].kind, DetailKind::Note);
    }

    #[test]
    fn test_builder_node_and_category() {
        let msg = DiagnosticMessageBuilder::warning("Misplaced Metadata List")
            .with_category(Category::Input)
            .with_node("<dl metadata=\"true\"/>")
            .build();

        assert_eq!(msg.category, Some(Category::Input));
        assert_eq!(msg.node.as_deref(), Some("<dl metadata=\"true\"/>"));
    }

    #[test]
    fn test_generic_warning_carries_location() {
        let msg = DiagnosticMessageBuilder::generic_warning("odd input", "src/x.rs", 12);
        assert_eq!(msg.code.as_deref(), Some(GENERIC_CODE));
        assert_eq!(msg.title, "odd input (src/x.rs:12)");
    }

    #[test]
    fn test_builder_validation_no_problem() {
        let (msg, warnings) = DiagnosticMessageBuilder::error("Test").build_with_validation();

        assert_eq!(msg.title, "Test");
        assert!(warnings[0].contains("missing problem statement"));
    }

    #[test]
    fn test_builder_validation_too_many_details() {
        let (_msg, warnings) = DiagnosticMessageBuilder::error("Test")
            .problem("Something wrong")
            .add_detail("1")
            .add_detail("2")
            .add_detail("3")
            .add_detail("4")
            .add_detail("5")
            .add_detail("6")
            .build_with_validation();

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("6 details"));
    }
}
