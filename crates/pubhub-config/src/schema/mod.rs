//! Configuration schema types for pubhub.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod hub;
mod logging;
mod server;

pub use hub::*;
pub use logging::*;
pub use server::*;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PubhubConfig {
    pub hub: HubConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}
