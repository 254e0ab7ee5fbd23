//! Command implementations for the standoc CLI
//!
//! Each command module handles the CLI interface and delegates to
//! standoc-core for the actual work.

pub mod cache;
pub mod normalize;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use standoc_core::StandocConfig;

/// Load `explicit`, or else the nearest configuration file above `start`.
pub fn load_config(explicit: Option<&Path>, start: &Path) -> Result<StandocConfig> {
    if let Some(path) = explicit {
        return StandocConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()));
    }
    let found = StandocConfig::discover(start).context("Failed to search for configuration")?;
    Ok(match found {
        Some((path, config)) => {
            tracing::debug!(path = %path.display(), "Using configuration");
            config
        }
        None => StandocConfig::default(),
    })
}

/// Directory relative paths in the configuration are taken from.
pub fn base_dir(input: &Path) -> PathBuf {
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
