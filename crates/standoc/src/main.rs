//! standoc CLI - Main entry point

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::normalize::{DiagnosticsFormat, NormalizeArgs};

#[derive(Parser)]
#[command(name = "standoc")]
#[command(version)]
#[command(about = "Normalize standards document trees", long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a document tree and resolve its citations
    Normalize {
        /// Input XML file
        input: PathBuf,

        /// Write output to FILE instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Configuration file (defaults to the nearest _standoc.yml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// How diagnostics are printed on stderr
        #[arg(long, value_enum, default_value_t = DiagnosticsFormat::Text)]
        diagnostics: DiagnosticsFormat,

        /// Render every citation from its own text
        #[arg(long)]
        no_fetch: bool,

        /// Do not read or write bibliographic caches
        #[arg(long)]
        no_cache: bool,

        /// Use a local cache directory next to the input
        #[arg(long, value_name = "NAME")]
        local_cache: Option<String>,

        /// Use only the local cache
        #[arg(long)]
        local_cache_only: bool,

        /// Empty the active caches before resolving
        #[arg(long)]
        flush_caches: bool,
    },

    /// Manage the bibliographic caches
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove every cached record
    Flush {
        /// Directory the local cache is relative to
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Local cache directory name
        #[arg(long, value_name = "NAME")]
        local_cache: Option<String>,

        /// Configuration file (defaults to the nearest _standoc.yml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose { "standoc=debug" } else { "standoc=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Normalize {
            input,
            output,
            config,
            diagnostics,
            no_fetch,
            no_cache,
            local_cache,
            local_cache_only,
            flush_caches,
        } => commands::normalize::execute(NormalizeArgs {
            input,
            output,
            config,
            diagnostics,
            no_fetch,
            no_cache,
            local_cache,
            local_cache_only,
            flush_caches,
        }),
        Commands::Cache {
            action:
                CacheAction::Flush {
                    dir,
                    local_cache,
                    config,
                },
        } => commands::cache::flush(&dir, local_cache, config.as_deref()),
    }
}
