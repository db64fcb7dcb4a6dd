//! Viewer configuration and where it lives on disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default bound on the navigation history.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

/// Initial state of the severity filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub no_leak: bool,
    pub investigate: bool,
    pub leak: bool,
    pub dont_care: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { no_leak: true, investigate: true, leak: true, dont_care: true }
    }
}

/// Serializable viewer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub filter: FilterConfig,
    /// Maximum number of navigation entries kept.
    pub history_limit: usize,
    /// Where emergency snapshots go. Defaults to the dump's directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autosave_dir: Option<String>,
    /// One of `error`, `warn`, `info`, `debug`, `trace`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            autosave_dir: None,
            log_level: None,
        }
    }
}

/// Logical config locations derived from a root directory.
///
/// Computing a layout never touches the filesystem.
#[derive(Debug, Clone)]
pub struct ConfigLayout {
    pub root: PathBuf,
    /// Directory for viewer metadata (`.leakscope`).
    pub meta_dir: PathBuf,
    /// Default config file (`.leakscope/config.json`).
    pub config_path: PathBuf,
}

impl ConfigLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let meta_dir = root.join(".leakscope");
        let config_path = meta_dir.join("config.json");
        Self { root, meta_dir, config_path }
    }
}

/// Load a config file. `.yaml`/`.yml` files are parsed as YAML, everything
/// else as JSON.
pub fn load_viewer_config(path: &Path) -> Result<ViewerConfig> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read viewer config at {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let config = if matches!(ext, "yaml" | "yml") {
        serde_yaml::from_str(&body).context("Failed to parse viewer config YAML")?
    } else {
        serde_json::from_str(&body).context("Failed to parse viewer config JSON")?
    };
    Ok(config)
}

/// Load `explicit` if given, otherwise the layout's default file when it
/// exists, otherwise defaults.
pub fn resolve_viewer_config(
    layout: &ConfigLayout,
    explicit: Option<&Path>,
) -> Result<ViewerConfig> {
    match explicit {
        Some(path) => load_viewer_config(path),
        None if layout.config_path.is_file() => load_viewer_config(&layout.config_path),
        None => Ok(ViewerConfig::default()),
    }
}
