use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// How downloaded files reach shared storage.
///
/// `Legacy` writes into a public directory and needs the storage permission;
/// `Scoped` inserts into the media index (Images or Downloads collection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageModel {
    Legacy,
    #[default]
    Scoped,
}

/// Global configuration loaded from `~/.config/tkfdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TkfConfig {
    /// Maximum number of idle browser instances kept for reuse.
    pub pool_capacity: usize,
    /// Storage model of the host platform.
    #[serde(default)]
    pub storage_model: StorageModel,
    /// Subdirectory appended under the public Downloads/Pictures directories.
    pub download_subdir: String,
    /// User-Agent sent when the page did not supply one.
    pub user_agent: String,
    /// Connect timeout for HEAD probes and direct downloads.
    pub connect_timeout_secs: u64,
    /// Whole-transfer timeout for direct downloads.
    pub transfer_timeout_secs: u64,
    /// Content length at and above which WebView downloads skip the size label.
    pub direct_download_threshold_bytes: u64,
    /// Base directory for direct file writes; current directory when unset.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// URL markers whose downloads are always JPEG images, whatever the server says.
    #[serde(default = "default_jpeg_markers")]
    pub jpeg_markers: Vec<String>,
}

fn default_jpeg_markers() -> Vec<String> {
    vec!["SoilContinuity".to_string()]
}

impl Default for TkfConfig {
    fn default() -> Self {
        Self {
            pool_capacity: 3,
            storage_model: StorageModel::Scoped,
            download_subdir: "Downloads".to_string(),
            user_agent: "Mozilla/5.0 (Linux; Android 10; Mobile)".to_string(),
            connect_timeout_secs: 30,
            transfer_timeout_secs: 3600,
            direct_download_threshold_bytes: 10 * 1024 * 1024,
            download_dir: None,
            jpeg_markers: default_jpeg_markers(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tkfdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TkfConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TkfConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let cfg: TkfConfig = toml::from_str(&data)
        .with_context(|| format!("invalid config: {}", path.display()))?;
    Ok(cfg)
}
