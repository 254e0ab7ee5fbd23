//! Error code catalog and lookup.
//!
//! Maps catalog codes (like "S-1-1") to their metadata: subsystem, title,
//! message template and documentation URL.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata for a catalog code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorCodeInfo {
    /// Subsystem name (e.g., "anchors", "bibliography", "xml")
    pub subsystem: String,

    /// Short title
    pub title: String,

    /// Default message
    pub message_template: String,

    /// URL to documentation (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,

    /// When this code was introduced (version)
    pub since_version: String,
}

/// Global error catalog, embedded at compile time from `error_catalog.json`.
///
/// # Panics
///
/// Panics if the embedded JSON is invalid, which the catalog tests catch.
pub static ERROR_CATALOG: Lazy<HashMap<String, ErrorCodeInfo>> = Lazy::new(|| {
    let json_data = include_str!("../error_catalog.json");
    serde_json::from_str(json_data).expect("Invalid error catalog JSON - this is a bug in standoc")
});

/// Look up catalog information for a code.
///
/// # Example
///
/// ```
/// use standoc_error_reporting::catalog::get_error_info;
///
/// let info = get_error_info("S-4-1").unwrap();
/// assert_eq!(info.subsystem, "bibliography");
/// ```
pub fn get_error_info(code: &str) -> Option<&ErrorCodeInfo> {
    ERROR_CATALOG.get(code)
}

/// Get documentation URL for a code.
pub fn get_docs_url(code: &str) -> Option<&str> {
    ERROR_CATALOG
        .get(code)
        .and_then(|info| info.docs_url.as_deref())
}

/// Get the subsystem name for a code.
pub fn get_subsystem(code: &str) -> Option<&str> {
    ERROR_CATALOG.get(code).map(|info| info.subsystem.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_loads() {
        assert!(!ERROR_CATALOG.is_empty());
    }

    #[test]
    fn test_internal_error_exists() {
        let info = get_error_info("S-0-1").unwrap();
        assert_eq!(info.subsystem, "internal");
        assert_eq!(info.title, "Internal Error");
        assert!(info.docs_url.is_some());
    }

    #[test]
    fn test_recoverable_codes_present() {
        for code in ["S-1-1", "S-1-2", "S-2-1", "S-2-2", "S-3-1", "S-4-1"] {
            assert!(get_error_info(code).is_some(), "missing {code}");
        }
    }

    #[test]
    fn test_get_subsystem() {
        assert_eq!(get_subsystem("S-9-1"), Some("xml"));
        assert_eq!(get_subsystem("S-999-999"), None);
    }

    #[test]
    fn test_codes_match_subsystem_numbering() {
        for (code, info) in ERROR_CATALOG.iter() {
            let subsystem_number = code.split('-').nth(1).unwrap();
            let expected = match info.subsystem.as_str() {
                "internal" => "0",
                "anchors" => "1",
                "input" => "2",
                "structure" => "3",
                "bibliography" => "4",
                "xml" => "9",
                other => panic!("unexpected subsystem {other}"),
            };
            assert_eq!(subsystem_number, expected, "{code}");
        }
    }
}
