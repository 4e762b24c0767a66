//! Application configuration.
//!
//! Stored as JSON at the platform config directory
//! (e.g. `~/.config/storeadmin/config.json`). Everything is optional;
//! a missing file means defaults.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_PAGE_SIZE;

/// Application name used for config and data directory paths.
const APP_NAME: &str = "storeadmin";

/// Config file name.
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Override for the backend base URL (staging mirrors, local stubs).
    pub base_url: Option<String>,
    /// Username offered as the default at the next login.
    pub last_username: Option<String>,
    /// Rows fetched per page for list commands.
    pub page_size: Option<u32>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for durable session storage.
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("could not determine data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
