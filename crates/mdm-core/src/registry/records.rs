//! Registry rows and CRUD operations.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::path::PathBuf;

use super::db::{unix_timestamp, ModelRegistry};
use crate::artifact::Artifact;

/// One registry row: a model known to be fully downloaded.
#[derive(Debug, Clone)]
pub struct ModelRecord {
    pub id: String,
    pub name: String,
    pub url: String,
    pub companion_url: Option<String>,
    pub companion_name: Option<String>,
    pub total_bytes: u64,
    pub dir: PathBuf,
    pub downloaded_at: i64,
    pub last_used_at: i64,
}

impl ModelRecord {
    /// Rebuild the artifact descriptor from the stored row. Tokens are not
    /// persisted, so the descriptor carries none.
    pub fn artifact(&self) -> Artifact {
        Artifact {
            id: self.id.clone(),
            name: self.name.clone(),
            url: self.url.clone(),
            companion_url: self.companion_url.clone(),
            companion_name: self.companion_name.clone(),
            total_bytes: self.total_bytes,
            token: None,
            dir: self.dir.clone(),
        }
    }
}

fn record_from_row(row: &SqliteRow) -> ModelRecord {
    let total: i64 = row.get("total_bytes");
    let dir: String = row.get("dir");
    ModelRecord {
        id: row.get("id"),
        name: row.get("name"),
        url: row.get("url"),
        companion_url: row.get("companion_url"),
        companion_name: row.get("companion_name"),
        total_bytes: total.max(0) as u64,
        dir: PathBuf::from(dir),
        downloaded_at: row.get("downloaded_at"),
        last_used_at: row.get("last_used_at"),
    }
}

impl ModelRegistry {
    /// Record a completed download. Idempotent: re-inserting the same id
    /// replaces the row (fresh `downloaded_at`).
    pub async fn insert(&self, artifact: &Artifact) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO models (
                id, name, url, companion_url, companion_name,
                total_bytes, dir, downloaded_at, last_used_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&artifact.id)
        .bind(&artifact.name)
        .bind(&artifact.url)
        .bind(&artifact.companion_url)
        .bind(&artifact.companion_name)
        .bind(artifact.total_bytes as i64)
        .bind(artifact.dir.to_string_lossy().into_owned())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drop a model row. Absent rows are fine.
    pub async fn remove(&self, artifact_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM models WHERE id = ?1")
            .bind(artifact_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bump `last_used_at` for a model (e.g. when the inference runtime
    /// loads it). Absent rows are fine.
    pub async fn touch(&self, artifact_id: &str) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query("UPDATE models SET last_used_at = ?1 WHERE id = ?2")
            .bind(now)
            .bind(artifact_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove every row.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM models").execute(&self.pool).await?;
        Ok(())
    }

    /// All known models, most recently downloaded first.
    pub async fn list(&self) -> Result<Vec<ModelRecord>> {
        let rows = sqlx::query("SELECT * FROM models ORDER BY downloaded_at DESC, id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Look up one model by artifact id.
    pub async fn get(&self, artifact_id: &str) -> Result<Option<ModelRecord>> {
        let row = sqlx::query("SELECT * FROM models WHERE id = ?1")
            .bind(artifact_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(record_from_row))
    }

    /// True when the registry knows the artifact id.
    pub async fn contains(&self, artifact_id: &str) -> Result<bool> {
        Ok(self.get(artifact_id).await?.is_some())
    }
}
