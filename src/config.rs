use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::urgency::UrgencyThresholds;
use crate::error::StorageError;
use crate::sync::tokens::FileStore;

pub const APP_ID: &str = "restock";

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join(APP_ID)
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct RestockConfig {
    pub data_directory: PathBuf,
    pub debug_logging: bool,
    pub thresholds: UrgencyThresholds,
}

impl Default for RestockConfig {
    fn default() -> Self {
        Self {
            data_directory: default_data_dir(),
            debug_logging: false,
            thresholds: UrgencyThresholds::default(),
        }
    }
}

impl RestockConfig {
    /// `~/.config/restock/config.json` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join(APP_ID)
            .join("config.json")
    }

    /// Read the config at `path`, falling back to defaults when it is
    /// missing or unreadable.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn token_store_path(&self) -> PathBuf {
        self.data_directory.join("tokens.json")
    }

    pub fn token_store(&self) -> FileStore {
        FileStore::new(self.token_store_path())
    }

    /// Ensure the data directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_directory)
    }
}
