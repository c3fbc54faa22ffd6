//! `mdm get <url>...` – download artifacts and wait for them to finish.

use anyhow::{bail, Context, Result};
use mdm_core::artifact::{file_name_from_url, Artifact};
use mdm_core::config::{self, MdmConfig};
use mdm_core::download::{ArtifactDownload, DownloadStatus};
use mdm_core::host::HostState;
use mdm_core::progress::{format_bytes, format_eta, format_speed};
use mdm_core::registry::ModelRegistry;
use mdm_core::retry::RetryPolicy;
use mdm_core::scheduler::DownloadScheduler;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub struct GetArgs {
    pub urls: Vec<String>,
    pub companion: Option<String>,
    pub name: Option<String>,
    pub id: Option<String>,
    pub token: Option<String>,
    pub size: Option<u64>,
    pub dir: Option<PathBuf>,
    pub jobs: Option<usize>,
}

pub async fn run_get(registry: &ModelRegistry, cfg: &MdmConfig, args: GetArgs) -> Result<()> {
    if args.urls.len() > 1
        && (args.companion.is_some() || args.name.is_some() || args.id.is_some())
    {
        bail!("--companion, --name and --id apply to a single URL only");
    }
    let base_dir = match &args.dir {
        Some(dir) => dir.clone(),
        None => config::download_dir(cfg)?,
    };
    let policy = cfg
        .retry
        .as_ref()
        .map(RetryPolicy::from_config)
        .unwrap_or_default();
    let host = Arc::new(HostState::new());

    let mut items: Vec<Arc<ArtifactDownload>> = Vec::new();
    for url in &args.urls {
        let name = match &args.name {
            Some(name) => name.clone(),
            None => file_name_from_url(url)
                .with_context(|| format!("cannot derive a filename from {url}, pass --name"))?,
        };
        let id = args.id.clone().unwrap_or_else(|| name.clone());
        let artifact = Artifact {
            dir: base_dir.join(&id),
            id,
            name,
            url: url.clone(),
            companion_url: args.companion.clone(),
            companion_name: None,
            total_bytes: args.size.unwrap_or(0),
            token: args.token.clone(),
        };
        if artifact.is_complete_on_disk() && registry.contains(&artifact.id).await? {
            println!("{} is already downloaded.", artifact.id);
            continue;
        }
        items.push(Arc::new(ArtifactDownload::with_policy(
            artifact,
            Arc::clone(&host),
            policy,
        )));
    }
    if items.is_empty() {
        return Ok(());
    }

    let jobs = args.jobs.unwrap_or(cfg.max_concurrent_downloads);
    let scheduler = DownloadScheduler::new(jobs, Box::new(registry.clone()));
    for item in &items {
        scheduler.schedule(Arc::clone(item))?;
    }

    loop {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let mut all_done = true;
        for item in &items {
            let status = item.status();
            if !status.is_terminal() {
                all_done = false;
            }
            if status == DownloadStatus::Downloading {
                let p = item.progress();
                println!(
                    "  {:<28} {:>10} / {:<10} ({:>5.1}%)  {:>12}  ETA {}",
                    item.id(),
                    format_bytes(p.bytes_written),
                    format_bytes(p.total_bytes),
                    p.fraction() * 100.0,
                    format_speed(p.speed_bps),
                    format_eta(p.eta_secs())
                );
            }
        }
        if all_done {
            break;
        }
    }

    let mut failed = 0usize;
    for item in &items {
        match item.status() {
            DownloadStatus::Completed => println!("{}: completed", item.id()),
            DownloadStatus::Cancelled => println!("{}: cancelled", item.id()),
            DownloadStatus::Failed => {
                failed += 1;
                let reason = item.last_error().unwrap_or_else(|| "unknown error".into());
                println!("{}: failed ({reason})", item.id());
            }
            _ => {}
        }
    }
    if failed > 0 {
        bail!("{failed} download(s) failed");
    }
    Ok(())
}
