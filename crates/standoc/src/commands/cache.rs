//! Cache command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::load_config;

/// Empty every cache scope the configuration enables.
pub fn flush(dir: &Path, local_cache: Option<String>, config: Option<&Path>) -> Result<()> {
    let mut config = load_config(config, dir)?;
    if local_cache.is_some() {
        config.bibliography.local_cache = local_cache;
    }
    let cache = config.bibliography.build_cache(dir);
    let scopes = cache.scopes();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime
        .block_on(cache.flush())
        .context("Failed to flush bibliographic caches")?;
    info!(?scopes, "Flushed bibliographic caches");
    Ok(())
}
