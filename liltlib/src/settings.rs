//! Persistence of the last used job configuration.

use crate::config::JobConfig;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

const APP_DIR: &str = "lilt-gui";
const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to get config directory")]
    NoConfigDir,
    #[error("failed to create config directory: {0}")]
    CreateDir(#[source] io::Error),
    #[error("failed to read config file: {0}")]
    Read(#[source] io::Error),
    #[error("failed to write config file: {0}")]
    Write(#[source] io::Error),
    #[error("failed to unmarshal config: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("failed to marshal config: {0}")]
    Serialize(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// The persisted record: the last job plus the UI language.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigData {
    pub last_config: JobConfig,
    pub language: String,
}

impl Default for ConfigData {
    fn default() -> Self {
        Self {
            last_config: JobConfig {
                use_docker: true,
                output_format: "flac".into(),
                copy_images: true,
                ..Default::default()
            },
            language: "en".into(),
        }
    }
}

/// A single JSON config file on disk.
#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// `<user config dir>/lilt-gui/config.json`
    pub fn user_default() -> Result<Self> {
        let config_dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(Self::at(config_dir.join(APP_DIR).join(CONFIG_FILE)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored record, or the default one if nothing was saved yet.
    pub fn load(&self) -> Result<ConfigData> {
        let json = match fs::read(&self.path) {
            Ok(json) => json,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no saved config, using defaults");
                return Ok(ConfigData::default());
            }
            Err(err) => return Err(SettingsError::Read(err)),
        };
        serde_json::from_slice(&json).map_err(SettingsError::Parse)
    }

    pub fn save(&self, data: &ConfigData) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(SettingsError::CreateDir)?;
        }
        let json = serde_json::to_vec_pretty(data).map_err(SettingsError::Serialize)?;
        fs::write(&self.path, json).map_err(SettingsError::Write)?;
        debug!(path = %self.path.display(), "saved config");
        Ok(())
    }
}
