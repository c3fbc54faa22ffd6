//! Logging init: file under XDG state dir, or graceful fallback to stderr.

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default when `RUST_LOG` is unset: library and CLI crates at debug,
/// everything else (curl, sqlx, ...) at info.
const DEFAULT_DIRECTIVES: &str = "info,mdm_core=debug,mdm_cli=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Initialize structured logging to `~/.local/state/mdm/mdm.log`.
/// Returns Err when the log file cannot be opened (state dir unwritable)
/// so the caller can fall back to [`init_logging_stderr`].
pub fn init_logging() -> Result<()> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdm")?;
    let log_dir = xdg_dirs.get_state_home().join("mdm");

    fs::create_dir_all(&log_dir)?;
    let log_file_path: PathBuf = log_dir.join("mdm.log");

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(file)
        .with_ansi(false)
        .init();

    tracing::info!("logging to {}", log_file_path.display());

    Ok(())
}

/// Initialize logging to stderr only (no file). Use when init_logging() fails so the CLI doesn't crash.
pub fn init_logging_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
