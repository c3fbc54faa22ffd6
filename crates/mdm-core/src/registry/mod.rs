//! Persistent registry of successfully downloaded models (SQLite via sqlx).
//!
//! The scheduler consumes the narrow synchronous `ModelStore` seam; the
//! SQLite-backed `ModelRegistry` implements it by bridging onto the async
//! pool from the download worker threads (which never run on the runtime).

mod db;
mod records;

#[cfg(test)]
mod tests;

pub use db::ModelRegistry;
pub use records::ModelRecord;

use crate::artifact::Artifact;
use anyhow::Result;

/// Store of completed downloads, as the scheduler sees it. `insert` is called
/// exactly once per successful completion and `remove` on explicit removal;
/// implementations are expected to be idempotent and locally durable.
pub trait ModelStore: Send + Sync {
    fn insert(&self, artifact: &Artifact) -> Result<()>;
    fn remove(&self, artifact: &Artifact) -> Result<()>;
    fn update_last_use_time(&self, artifact: &Artifact) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

impl ModelStore for ModelRegistry {
    fn insert(&self, artifact: &Artifact) -> Result<()> {
        self.handle().block_on(ModelRegistry::insert(self, artifact))
    }

    fn remove(&self, artifact: &Artifact) -> Result<()> {
        self.handle().block_on(ModelRegistry::remove(self, &artifact.id))
    }

    fn update_last_use_time(&self, artifact: &Artifact) -> Result<()> {
        self.handle().block_on(ModelRegistry::touch(self, &artifact.id))
    }

    fn clear(&self) -> Result<()> {
        self.handle().block_on(ModelRegistry::clear(self))
    }
}
