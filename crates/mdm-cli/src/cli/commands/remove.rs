//! `mdm remove <id>` – delete a model's folder and registry row.

use anyhow::{bail, Result};
use mdm_core::registry::ModelRegistry;
use mdm_core::storage;

pub async fn run_remove(registry: &ModelRegistry, id: &str) -> Result<()> {
    let Some(record) = registry.get(id).await? else {
        bail!("no model with id {id}");
    };
    storage::remove_dir(&record.dir)?;
    registry.remove(id).await?;
    println!("Removed {id}");
    Ok(())
}
