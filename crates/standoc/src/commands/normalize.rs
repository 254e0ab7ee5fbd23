//! Normalize command implementation.
//!
//! Reads one XML document, runs every normalization stage and writes the
//! result. Diagnostics go to stderr; they never change the exit status.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::info;

use standoc_core::{Orchestrator, RunContext, StandocConfig};

use super::{base_dir, load_config};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiagnosticsFormat {
    Text,
    Json,
}

/// Arguments for the normalize command
#[derive(Debug)]
pub struct NormalizeArgs {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub diagnostics: DiagnosticsFormat,
    pub no_fetch: bool,
    pub no_cache: bool,
    pub local_cache: Option<String>,
    pub local_cache_only: bool,
    pub flush_caches: bool,
}

impl NormalizeArgs {
    /// Command-line flags win over the configuration file.
    fn apply_overrides(&self, config: &mut StandocConfig) {
        let bib = &mut config.bibliography;
        bib.no_fetch |= self.no_fetch;
        bib.no_cache |= self.no_cache;
        bib.local_cache_only |= self.local_cache_only;
        bib.flush_caches |= self.flush_caches;
        if let Some(name) = &self.local_cache {
            bib.local_cache = Some(name.clone());
        }
    }
}

/// Execute the normalize command
pub fn execute(args: NormalizeArgs) -> Result<()> {
    let source = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read input file {}", args.input.display()))?;
    let base = base_dir(&args.input);

    let mut config = load_config(args.config.as_deref(), &base)?;
    args.apply_overrides(&mut config);
    let resolver = config.bibliography.build_resolver(&base);
    let mut ctx = RunContext::new(config).with_resolver(resolver);

    let mut doc = standoc_xml::parse(&source)
        .with_context(|| format!("Failed to parse {}", args.input.display()))?;

    info!("Normalizing {}", args.input.display());
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime
        .block_on(Orchestrator::default().normalize(&mut doc, &mut ctx))
        .context("Normalization failed")?;

    let lines = match args.diagnostics {
        DiagnosticsFormat::Text => ctx.sink.to_text(),
        DiagnosticsFormat::Json => ctx.sink.to_json(),
    };
    for line in lines {
        eprintln!("{}", line);
    }

    let xml = doc.to_string();
    match &args.output {
        Some(path) => {
            std::fs::write(path, xml)
                .with_context(|| format!("Failed to write output file {}", path.display()))?;
            info!("Output written to {}", path.display());
        }
        None => println!("{}", xml),
    }
    Ok(())
}
