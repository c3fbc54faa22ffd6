//! CLI for the mdm model download manager.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mdm_core::config;
use mdm_core::registry::ModelRegistry;
use std::path::PathBuf;

use commands::{run_clear, run_get, run_remove, run_status, GetArgs};

/// Top-level CLI for the mdm model download manager.
#[derive(Debug, Parser)]
#[command(name = "mdm")]
#[command(about = "mdm: resumable model artifact downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more model artifacts and wait for them to finish.
    Get {
        /// Direct HTTP/HTTPS URL(s) of the primary weight file(s).
        #[arg(required = true)]
        urls: Vec<String>,

        /// URL of a companion file (e.g. an mmproj), single-URL downloads only.
        #[arg(long)]
        companion: Option<String>,

        /// Final filename of the primary file (default: last URL path segment).
        #[arg(long)]
        name: Option<String>,

        /// Artifact identifier (default: the primary filename).
        #[arg(long)]
        id: Option<String>,

        /// Bearer token sent as `Authorization: Bearer <token>`.
        #[arg(long)]
        token: Option<String>,

        /// Declared total size in bytes across all files, for progress display.
        #[arg(long)]
        size: Option<u64>,

        /// Base directory for model folders (default: configured download dir).
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Download up to N artifacts concurrently (default: from config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
    },

    /// Show all downloaded models in the registry.
    Status,

    /// Remove a downloaded model: delete its folder and registry row.
    Remove {
        /// Artifact identifier.
        id: String,
    },

    /// Empty the registry. Files on disk are left in place.
    Clear,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let registry = ModelRegistry::open_default().await?;

        match cli.command {
            CliCommand::Get {
                urls,
                companion,
                name,
                id,
                token,
                size,
                dir,
                jobs,
            } => {
                let args = GetArgs {
                    urls,
                    companion,
                    name,
                    id,
                    token,
                    size,
                    dir,
                    jobs,
                };
                run_get(&registry, &cfg, args).await?;
            }
            CliCommand::Status => run_status(&registry).await?,
            CliCommand::Remove { id } => run_remove(&registry, &id).await?,
            CliCommand::Clear => run_clear(&registry).await?,
        }

        Ok(())
    }
}
