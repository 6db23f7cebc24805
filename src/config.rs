// Viewer configuration: archive endpoint, prefetch degree, downscale
// tool and display defaults. Loaded from TOML or JSON by extension;
// every field has a default so a partial file is fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub archive: ArchiveConfig,
    pub prefetch: PrefetchConfig,
    pub downscale: DownscaleConfig,
    pub display: DisplayConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub url: String,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8042".to_string(),
            timeout_ms: 30_000,
            user_agent: concat!("stackview/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Number of partitions, one worker thread each.
    pub workers: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownscaleConfig {
    pub enabled: bool,
    pub program: String,
    /// Either side above this: 25% in one go.
    pub quarter_above: u32,
    /// Either side above this (after any quarter stage): 50%.
    pub half_above: u32,
    /// Scratch files go here; system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for DownscaleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "convert".to_string(),
            quarter_above: 2000,
            half_above: 1000,
            scratch_dir: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub window_center: i32,
    pub window_width: i32,
    /// Additive calibration bias applied to the window center.
    pub offset: i32,
    pub overlay: bool,
    /// RGB painted where a panned slice leaves the viewport uncovered.
    pub background: [u8; 3],
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window_center: 40,
            window_width: 80,
            offset: 1020,
            overlay: true,
            background: [0, 0, 0],
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| Error::Config(format!("invalid TOML: {e}")))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("invalid JSON: {e}")))?,
            _ => {
                return Err(Error::Config(format!(
                    "{}: expected a .toml or .json file",
                    path.display()
                )));
            }
        };
        log::info!("config: loaded {}", path.display());
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}
