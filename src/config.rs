//! # Configuration Module
//!
//! Data directory setup and the runtime configuration file.
//!
//! Muse Radio keeps its state in the platform-standard data directory:
//! - Linux: `~/.local/share/muse-radio/`
//! - macOS: `~/Library/Application Support/muse-radio/`
//! - Windows: `%APPDATA%\muse-radio\`
//!
//! `config.json` in that directory (or any file passed with `--config`)
//! holds a [`RuntimeConfig`]. Every field is optional; a missing file means
//! all defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::embedding::TrainingConfig;
use crate::persistence::{self, FileStorage, MemoryStorage, PersistenceAdapter, SqliteStorage};
use crate::queue::QueueConfig;

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_PORT: u16 = 3000;

/// Returns the platform-appropriate data directory, creating it if needed.
///
/// # Errors
///
/// This function will return an error if:
/// - The system data directory cannot be determined
/// - The `muse-radio` subdirectory cannot be created
///
/// # Examples
///
/// ```no_run
/// use muse_radio::config::get_data_dir;
///
/// let dir = get_data_dir()?;
/// println!("State lives in {}", dir.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let radio_dir = data_dir.join("muse-radio");
    fs::create_dir_all(&radio_dir).with_context(|| {
        format!(
            "Failed to create Muse Radio data directory at {}. Please check file permissions.",
            radio_dir.display()
        )
    })?;

    Ok(radio_dir)
}

/// Default location of the configuration file.
///
/// # Errors
///
/// Returns an error if the data directory cannot be resolved.
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(CONFIG_FILE))
}

/// Where trained state is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Whatever suits the build target.
    #[default]
    Platform,
    Sqlite,
    File,
    /// Nothing survives the process.
    Memory,
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    /// Track catalog JSON; relative paths resolve against the data directory.
    pub catalog_path: PathBuf,
    /// Listening sessions JSON; relative paths resolve against the data directory.
    pub sessions_path: PathBuf,
    pub storage: StorageBackend,
    pub training: TrainingConfig,
    pub queue: QueueConfig,
    pub port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("catalog.json"),
            sessions_path: PathBuf::from("sessions.json"),
            storage: StorageBackend::default(),
            training: TrainingConfig::default(),
            queue: QueueConfig::default(),
            port: DEFAULT_PORT,
        }
    }
}

impl RuntimeConfig {
    /// Read a configuration file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Write this configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data).with_context(|| format!("Failed to write config file {}", path.display()))
    }

    #[must_use]
    pub fn resolve(&self, data_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            data_dir.join(path)
        }
    }

    /// Build the configured persistence backend under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the `SQLite` database cannot be opened.
    pub fn open_storage(&self, data_dir: &Path) -> Result<Box<dyn PersistenceAdapter>> {
        let adapter: Box<dyn PersistenceAdapter> = match self.storage {
            StorageBackend::Platform => persistence::platform_default(data_dir)?,
            StorageBackend::Sqlite => Box::new(SqliteStorage::open(&data_dir.join("muse-radio.db3"))?),
            StorageBackend::File => Box::new(FileStorage::new(data_dir.join("state"))),
            StorageBackend::Memory => Box::new(MemoryStorage::new()),
        };
        Ok(adapter)
    }
}
