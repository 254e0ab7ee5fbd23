//! Error types for XML parsing and path queries.

use standoc_error_reporting::{DiagnosticMessage, DiagnosticMessageBuilder};
use std::fmt;

/// Result type alias for standoc-xml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during XML parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// XML syntax error from quick-xml.
    XmlSyntax {
        message: String,
        /// Byte offset where the error occurred.
        position: Option<u64>,
    },

    /// Unexpected end of input.
    UnexpectedEof {
        /// What was expected when EOF was encountered.
        expected: String,
    },

    /// Mismatched end tag.
    MismatchedEndTag {
        expected: String,
        found: String,
        position: Option<u64>,
    },

    /// Invalid XML structure.
    InvalidStructure { message: String },

    /// Empty document (no root element).
    EmptyDocument,

    /// Multiple root elements.
    MultipleRoots,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::XmlSyntax { message, position } => {
                write!(f, "XML syntax error: {}", message)?;
                if let Some(pos) = position {
                    write!(f, " at byte {}", pos)?;
                }
                Ok(())
            }
            Error::UnexpectedEof { expected } => {
                write!(f, "Unexpected end of input, expected {}", expected)
            }
            Error::MismatchedEndTag {
                expected, found, ..
            } => {
                write!(
                    f,
                    "Mismatched end tag: expected </{}>, found </{}>",
                    expected, found
                )
            }
            Error::InvalidStructure { message } => {
                write!(f, "Invalid XML structure: {}", message)
            }
            Error::EmptyDocument => {
                write!(f, "Empty XML document: no root element found")
            }
            Error::MultipleRoots => {
                write!(f, "Invalid XML: multiple root elements")
            }
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Convert this error to a DiagnosticMessage with the matching S-9-* code.
    pub fn to_diagnostic(&self) -> DiagnosticMessage {
        match self {
            Error::XmlSyntax { message, position } => {
                let mut builder = DiagnosticMessageBuilder::error("XML Syntax Error")
                    .with_code("S-9-1")
                    .problem(message.clone());

                if let Some(pos) = position {
                    builder = builder.add_detail(format!("Error at byte offset {}", pos));
                }

                builder.build()
            }

            Error::UnexpectedEof { expected } => {
                DiagnosticMessageBuilder::error("Unexpected End of XML Input")
                    .with_code("S-9-2")
                    .problem(format!(
                        "The XML document ended unexpectedly; expected {}",
                        expected
                    ))
                    .build()
            }

            Error::MismatchedEndTag {
                expected,
                found,
                position,
            } => {
                let mut builder = DiagnosticMessageBuilder::error("Mismatched XML End Tag")
                    .with_code("S-9-3")
                    .problem(format!(
                        "End tag </{}> does not match start tag <{}>",
                        found, expected
                    ))
                    .add_detail(format!("Expected: </{}>", expected))
                    .add_detail(format!("Found: </{}>", found))
                    .add_hint("Check that all opening tags have matching closing tags?");

                if let Some(pos) = position {
                    builder = builder.add_info(format!("At byte offset {}", pos));
                }

                builder.build()
            }

            Error::InvalidStructure { message } => {
                DiagnosticMessageBuilder::error("Invalid XML Structure")
                    .with_code("S-9-4")
                    .problem(message.clone())
                    .build()
            }

            Error::EmptyDocument => DiagnosticMessageBuilder::error("Empty XML Document")
                .with_code("S-9-5")
                .problem("The XML document contains no root element")
                .add_hint("Add a root element to the document?")
                .build(),

            Error::MultipleRoots => DiagnosticMessageBuilder::error("Multiple XML Root Elements")
                .with_code("S-9-6")
                .problem("The XML document contains multiple root elements")
                .add_detail("XML documents must have exactly one root element")
                .add_hint("Wrap multiple elements in a single container element?")
                .build(),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlSyntax {
            message: err.to_string(),
            position: None,
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlSyntax {
            message: format!("Attribute error: {}", err),
            position: None,
        }
    }
}

/// A path expression that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid query `{query}`: {message}")]
pub struct QueryError {
    pub query: String,
    pub message: String,
}

impl QueryError {
    pub(crate) fn new(query: &str, message: impl Into<String>) -> Self {
        Self {
            query: query.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let cases = [
            (
                Error::XmlSyntax {
                    message: "bad".into(),
                    position: Some(3),
                },
                "S-9-1",
            ),
            (
                Error::UnexpectedEof {
                    expected: "closing tag </a>".into(),
                },
                "S-9-2",
            ),
            (
                Error::MismatchedEndTag {
                    expected: "a".into(),
                    found: "b".into(),
                    position: None,
                },
                "S-9-3",
            ),
            (Error::EmptyDocument, "S-9-5"),
            (Error::MultipleRoots, "S-9-6"),
        ];
        for (err, code) in cases {
            assert_eq!(err.to_diagnostic().code.as_deref(), Some(code));
        }
    }

    #[test]
    fn test_display_mismatched() {
        let err = Error::MismatchedEndTag {
            expected: "p".into(),
            found: "note".into(),
            position: None,
        };
        assert_eq!(
            err.to_string(),
            "Mismatched end tag: expected </p>, found </note>"
        );
    }
}
