//! Assumptions document loading and path resolution

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use healthcast_core::ForecastConfig;

/// Serialization format of an assumptions document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// `.yaml`/`.yml` are YAML; anything else is JSON
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }
}

/// Parse an assumptions document. A leading UTF-8 byte-order mark is ignored.
pub fn parse_config(text: &str, format: ConfigFormat) -> Result<ForecastConfig> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let config = match format {
        ConfigFormat::Json => serde_json::from_str(text).wrap_err("invalid JSON assumptions")?,
        ConfigFormat::Yaml => serde_saphyr::from_str(text).wrap_err("invalid YAML assumptions")?,
    };
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<ForecastConfig> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
    parse_config(&text, ConfigFormat::from_path(path))
        .wrap_err_with(|| format!("failed to parse config {}", path.display()))
}

/// `path` as given when absolute, otherwise relative to `base_dir`
pub fn resolve_path(base_dir: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Directory the config lives in, used as the base for relative paths
pub fn config_dir(config_path: &Path) -> PathBuf {
    let absolute = if config_path.is_absolute() {
        config_path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(config_path))
            .unwrap_or_else(|_| config_path.to_path_buf())
    };
    absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
