//! SQLite-backed model registry: connection, migrations, timestamps.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the SQLite-backed registry of downloaded models.
///
/// The database file lives under the XDG state directory:
/// `~/.local/state/mdm/models.db`.
#[derive(Clone)]
pub struct ModelRegistry {
    pub(crate) pool: Pool<Sqlite>,
    /// Runtime handle captured at open time, used by the sync `ModelStore`
    /// bridge called from download worker threads.
    handle: tokio::runtime::Handle,
}

impl ModelRegistry {
    /// Open (or create) the default registry database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("mdm")?;
        let state_dir = xdg_dirs.get_state_home().join("mdm");
        let db_path = state_dir.join("models.db");

        tokio::fs::create_dir_all(&state_dir).await?;

        let uri = path_to_sqlite_uri(&db_path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;

        let registry = ModelRegistry {
            pool,
            handle: tokio::runtime::Handle::current(),
        };
        registry.migrate().await?;
        Ok(registry)
    }

    /// Open (or create) the registry at a specific path. Creates parent dirs
    /// if needed. Intended for tests.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;
        let registry = ModelRegistry {
            pool,
            handle: tokio::runtime::Handle::current(),
        };
        registry.migrate().await?;
        Ok(registry)
    }

    pub(crate) fn handle(&self) -> &tokio::runtime::Handle {
        &self.handle
    }

    async fn migrate(&self) -> Result<()> {
        // One row per successfully downloaded artifact, keyed by artifact id.
        // The bearer token is deliberately not persisted.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS models (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                companion_url TEXT,
                companion_name TEXT,
                total_bytes INTEGER NOT NULL,
                dir TEXT NOT NULL,
                downloaded_at INTEGER NOT NULL,
                last_used_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time as Unix seconds (for registry timestamps).
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
/// Open an in-memory registry for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<ModelRegistry> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let registry = ModelRegistry {
        pool,
        handle: tokio::runtime::Handle::current(),
    };
    registry.migrate().await?;
    Ok(registry)
}
