use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum automatic retries per download while the app is foregrounded.
    pub max_attempts: u32,
    /// Base delay in seconds for backoff between backgrounded retries (e.g. 0.25 = 250ms).
    pub background_base_delay_secs: f64,
    /// Maximum backoff delay in seconds between backgrounded retries.
    pub background_max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            background_base_delay_secs: 0.25,
            background_max_delay_secs: 30,
        }
    }
}

/// Global configuration loaded from `~/.config/mdm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdmConfig {
    /// Maximum number of model downloads running at once; further requests queue FIFO.
    pub max_concurrent_downloads: usize,
    /// Base directory for downloaded model folders (None = XDG data dir).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for MdmConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 3,
            download_dir: None,
            retry: None,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Base directory for downloaded models: configured dir, or `~/.local/share/mdm/models`.
pub fn download_dir(cfg: &MdmConfig) -> Result<PathBuf> {
    if let Some(dir) = &cfg.download_dir {
        return Ok(dir.clone());
    }
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdm")?;
    Ok(xdg_dirs.get_data_home().join("models"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = MdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: MdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}
