//! pubhub configuration.
//!
//! TOML-based configuration for the broadcast hub and its hosting server.
//! Every section uses serde defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pubhub_config::{config_to_toml, load_config};
//!
//! let config = load_config().expect("failed to load config");
//! println!("{}", config_to_toml(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{HubConfig, LoggingConfig, PubhubConfig, ServerConfig};
pub use toml_loader::{default_config_path, load_default, load_from_path, write_config};

use pubhub_common::ConfigError;

/// Load config from the platform default path and validate it.
pub fn load_config() -> Result<PubhubConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config back to TOML.
pub fn config_to_toml(config: &PubhubConfig) -> String {
    toml::to_string_pretty(config)
        .unwrap_or_else(|e| format!("# failed to serialize config: {e}\n"))
}
