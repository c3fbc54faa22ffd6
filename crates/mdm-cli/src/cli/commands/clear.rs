//! `mdm clear` – empty the registry. Files on disk are left in place;
//! deleting a model's folder is `remove`'s job.

use anyhow::Result;
use mdm_core::registry::ModelRegistry;

pub async fn run_clear(registry: &ModelRegistry) -> Result<()> {
    let count = registry.list().await?.len();
    registry.clear().await?;
    println!("Cleared {count} model(s) from the registry (files left in place)");
    Ok(())
}
