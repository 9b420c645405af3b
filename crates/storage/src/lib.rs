use directories::ProjectDirs;
use overlay_core::{ConfigError, OverlayConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const CONFIG_SCHEMA_VERSION: u32 = 1;
const CONFIG_FILE_NAME: &str = "overlay-config.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported config schema version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigError),
}

/// Per-user settings directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConfigEnvelope<C> {
    version: u32,
    config: C,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "PdfMarkup", "pdf-markup")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Loads the saved configuration, or the defaults when none was saved yet.
    pub fn load_config(&self) -> Result<OverlayConfig, StorageError> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(OverlayConfig::default());
        }

        let bytes = fs::read(path)?;
        let envelope: ConfigEnvelope<OverlayConfig> = serde_json::from_slice(&bytes)?;
        if envelope.version > CONFIG_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion(envelope.version));
        }

        envelope.config.validate()?;
        Ok(envelope.config)
    }

    /// Writes `config` under the current schema version, creating the
    /// directory as needed. Invalid configs are refused before anything is written.
    pub fn save_config(&self, config: &OverlayConfig) -> Result<(), StorageError> {
        config.validate()?;
        fs::create_dir_all(&self.root)?;

        let envelope = ConfigEnvelope { version: CONFIG_SCHEMA_VERSION, config };
        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.config_path(), bytes)?;
        Ok(())
    }
}
