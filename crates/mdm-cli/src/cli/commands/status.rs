//! `mdm status` – list downloaded models from the registry.

use anyhow::Result;
use mdm_core::progress::format_bytes;
use mdm_core::registry::ModelRegistry;

pub async fn run_status(registry: &ModelRegistry) -> Result<()> {
    let models = registry.list().await?;
    if models.is_empty() {
        println!("No models in registry.");
        return Ok(());
    }
    println!("{:<28} {:<10} {:<9} {}", "ID", "SIZE", "ON-DISK", "DIR");
    for m in models {
        let size = if m.total_bytes > 0 {
            format_bytes(m.total_bytes)
        } else {
            "-".to_string()
        };
        let on_disk = if m.artifact().is_complete_on_disk() {
            "complete"
        } else {
            "missing"
        };
        println!("{:<28} {:<10} {:<9} {}", m.id, size, on_disk, m.dir.display());
    }
    Ok(())
}
