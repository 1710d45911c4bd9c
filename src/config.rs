use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use facecrop_vision::{AlignParams, Backend, BackendKind, EstimateOptions};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// `FACECROP_CONFIG` if set, otherwise `config.toml` in the platform config dir.
pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if let Some(path) = std::env::var_os("FACECROP_CONFIG") {
        return PathBuf::from(path);
    }
    ProjectDirs::from("", "", "facecrop")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("facecrop.toml"))
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendKind,
    /// Residual in pixels above which a landmark is reported as an outlier.
    /// Unset means no landmark is ever flagged.
    pub reprojection_threshold: Option<f64>,
    pub align: AlignParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Native,
            reprojection_threshold: None,
            align: AlignParams::default(),
        }
    }
}

impl Config {
    pub fn to_params(&self) -> Result<AlignParams> {
        self.align.validate().context("invalid alignment settings")?;
        Ok(self.align.clone())
    }

    pub fn backend(&self) -> Backend {
        let options = EstimateOptions {
            reprojection_threshold: self.reprojection_threshold.unwrap_or(f64::INFINITY),
        };
        Backend::new(self.backend, options)
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(CONFIG_PATH.as_path());
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(CONFIG_PATH.as_path());
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data).with_context(|| format!("writing config {}", path.display()))?;
    Ok(())
}
