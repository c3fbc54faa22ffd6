//! File lifecycle for downloaded artifacts.
//!
//! Each file streams to a `.tmp` sibling and is atomically renamed to its
//! final name only after the stream completes, so a final-named file is
//! always fully intact. Partial `.tmp` files persist and seed resume.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Path for the temp file: appends `.tmp` to the final path
/// (e.g. `model.gguf` → `model.gguf.tmp`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Create the artifact folder if it does not exist yet.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create artifact folder {}", dir.display()))
}

/// Size of the file at `path`, or 0 if it does not exist. This is the resume
/// offset for a new transfer.
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Atomically rename a completed temp file to its final name.
pub fn finalize(temp: &Path, final_path: &Path) -> Result<()> {
    fs::rename(temp, final_path).with_context(|| {
        format!("rename {} to {}", temp.display(), final_path.display())
    })
}

/// Delete an artifact folder and everything in it. Missing folders are fine.
pub fn remove_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    fs::remove_dir_all(dir).with_context(|| format!("delete artifact folder {}", dir.display()))
}
