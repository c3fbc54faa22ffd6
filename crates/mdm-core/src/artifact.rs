//! Artifact descriptor: one logical downloadable model.
//!
//! A model is a primary weight file plus an optional companion file
//! (e.g. an mmproj or tokenizer) downloaded into one folder per artifact id.

use std::path::{Path, PathBuf};
use url::Url;

/// One downloadable unit. Read-only to the engine; callers build it from
/// their catalog and the engine derives all on-disk paths from it.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Stable identifier, unique across all concurrently known artifacts.
    pub id: String,
    /// Final filename of the primary weight file.
    pub name: String,
    /// URL of the primary file.
    pub url: String,
    /// URL of the optional companion file.
    pub companion_url: Option<String>,
    /// Final filename of the companion file (derived from its URL when None).
    pub companion_name: Option<String>,
    /// Declared total size of the artifact in bytes, covering both files.
    /// Zero means unknown; progress then falls back to server-reported sizes.
    pub total_bytes: u64,
    /// Optional static bearer token sent as `Authorization: Bearer <token>`.
    pub token: Option<String>,
    /// Destination folder for this artifact (one folder per artifact id).
    pub dir: PathBuf,
}

impl Artifact {
    /// Final on-disk path of the primary file.
    pub fn primary_path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    /// Final filename of the companion file: the explicit name, or the last
    /// path segment of the companion URL.
    pub fn companion_file_name(&self) -> Option<String> {
        if self.companion_url.is_none() {
            return None;
        }
        if let Some(name) = &self.companion_name {
            return Some(name.clone());
        }
        self.companion_url
            .as_deref()
            .and_then(file_name_from_url)
    }

    /// Final on-disk path of the companion file, if the artifact has one.
    pub fn companion_path(&self) -> Option<PathBuf> {
        self.companion_file_name().map(|n| self.dir.join(n))
    }

    /// True when every file of the artifact exists under its final name.
    /// Files are finalized atomically, so a final-named file is always fully
    /// intact; this is the signal the inference runtime uses.
    pub fn is_complete_on_disk(&self) -> bool {
        if !self.primary_path().is_file() {
            return false;
        }
        match self.companion_path() {
            Some(p) => p.is_file(),
            None => true,
        }
    }
}

/// Last path segment of a URL, for deriving filenames. None for URLs with an
/// empty or slash-terminated path.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(segment.to_string())
}

/// True when the path component is safe as a filename (no separators, no
/// traversal). Used before joining server-derived names under the artifact dir.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && Path::new(name).components().count() == 1
}
