//! Engine configuration, persisted as TOML in the data directory.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backend::ExecutionBackend;
use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::{Result, UpscaleError};

const CONFIG_FILE_NAME: &str = "config.toml";
const ENV_DATA_DIR: &str = "LUMISCALE_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Execution backend, resolved once at engine construction.
    pub backend: ExecutionBackend,
    /// Slot count of the in-process upscale result cache.
    pub cache_capacity: usize,
    /// Directory where super-resolution models are looked up.
    pub models_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: ExecutionBackend::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            models_dir: PathBuf::from("models"),
        }
    }
}

impl EngineConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|e| UpscaleError::Config {
            reason: format!("failed to read config file {}: {e}", path.display()),
        })?;

        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(&raw).map_err(|e| UpscaleError::Config {
            reason: format!("failed to parse config TOML {}: {e}", path.display()),
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let parent = path.parent().ok_or_else(|| UpscaleError::Config {
            reason: "config path does not have a parent directory".to_string(),
        })?;
        fs::create_dir_all(parent)?;

        let encoded = toml::to_string_pretty(self).map_err(|e| UpscaleError::Config {
            reason: format!("failed to serialize config TOML: {e}"),
        })?;
        fs::write(path, encoded)?;

        Ok(())
    }
}

/// Resolve the data directory with 3-tier priority:
/// 1. CLI override if provided
/// 2. LUMISCALE_DATA_DIR environment variable
/// 3. Default: ./data
pub fn data_dir(cli_override: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_override {
        return path.to_path_buf();
    }

    if let Some(env_dir) = env::var_os(ENV_DATA_DIR) {
        return PathBuf::from(env_dir);
    }

    PathBuf::from("data")
}

/// Returns the path to config.toml within the given data directory.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE_NAME)
}

/// Initialize the data directory structure on first run: creates the
/// directory if missing and writes a default config.toml only when none
/// exists yet.
pub fn initialize_data_dir(data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        fs::create_dir_all(data_dir)?;
    }

    let cfg_path = config_path(data_dir);
    if !cfg_path.exists() {
        EngineConfig::default().save_to_path(&cfg_path)?;
    }

    Ok(())
}
