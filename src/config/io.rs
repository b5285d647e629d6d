use std::path::{Path, PathBuf};

use serde::de::Error as SerdeDeError;

use crate::app_dirs;
use crate::atomic_file::write_atomic;

use super::types::{ConfigError, PipelineConfig};

/// Default filename of the pipeline configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file inside the app root directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the app-level config, returning defaults if it does not exist yet.
pub fn load_or_default() -> Result<PipelineConfig, ConfigError> {
    load_from(&config_path()?)
}

/// Parse and validate a TOML config. A missing file yields the defaults.
pub fn load_from(path: &Path) -> Result<PipelineConfig, ConfigError> {
    if !path.exists() {
        return Ok(PipelineConfig::default());
    }
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source: SerdeDeError::custom(source),
    })?;
    let config: PipelineConfig = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    let config = config.normalized();
    config.validate()?;
    Ok(config)
}

/// Write the TOML config atomically, creating parent directories as needed.
pub fn save_to(config: &PipelineConfig, path: &Path) -> Result<(), ConfigError> {
    let data = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, data.as_bytes()).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
