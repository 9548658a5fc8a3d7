//! Where the config file lives, and writing one out.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pubhub_common::ConfigError;
use tracing::info;

use super::template::annotated_config;
use crate::schema::PubhubConfig;

const APP_DIR: &str = "pubhub";
const FILE_NAME: &str = "config.toml";

/// `<platform config dir>/pubhub/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(FILE_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

/// Write `config` to `path` as annotated TOML, creating missing parent
/// directories.
pub fn write_config(path: &Path, config: &PubhubConfig) -> Result<(), ConfigError> {
    let write_err = |source: io::Error| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, annotated_config(config)).map_err(write_err)
}

/// Write the default config to `path`.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    write_config(path, &PubhubConfig::default())?;
    info!(path = %path.display(), "Created default config");
    Ok(())
}
