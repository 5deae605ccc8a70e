use std::path::{Path, PathBuf};

use qfile_core::ServiceConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QfeConfig {
    pub storage: StorageSection,
    pub service: ServiceConfig,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSection {
    /// SQLite catalog of key pairs and file records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,

    /// Directory holding encrypted blobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_dir: Option<PathBuf>,
}

impl QfeConfig {
    /// Config with every path spelled out, as written by `qfe init`.
    pub fn with_default_paths() -> anyhow::Result<Self> {
        Ok(Self {
            storage: StorageSection {
                catalog_path: Some(default_catalog_path()?),
                blob_dir: Some(default_blob_dir()?),
            },
            service: ServiceConfig::default(),
        })
    }

    pub fn catalog_path(&self) -> anyhow::Result<PathBuf> {
        match &self.storage.catalog_path {
            Some(path) => Ok(path.clone()),
            None => default_catalog_path(),
        }
    }

    pub fn blob_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.storage.blob_dir {
            Some(path) => Ok(path.clone()),
            None => default_blob_dir(),
        }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_catalog_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("catalog.db"))
}

pub fn default_blob_dir() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("blobs"))
}

/// Read the config at `path`, or defaults if the file does not exist.
pub fn load_config(path: &Path) -> anyhow::Result<QfeConfig> {
    if path.exists() {
        read_config(path)
    } else {
        Ok(QfeConfig::default())
    }
}

pub fn read_config(path: &Path) -> anyhow::Result<QfeConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &QfeConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("qfe"));
        }
    }
    Ok(home_dir()?.join(".config").join("qfe"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("qfe"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("qfe"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}
