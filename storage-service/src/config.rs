// SPDX-License-Identifier: GPL-3.0-only

//! Service configuration loaded from TOML

use std::path::Path;

use serde::{Deserialize, Serialize};
use storage_sys::EngineConfig;

use crate::error::{Result, ServiceError};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/storage-service/config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Used when `RUST_LOG` is not set
    pub log_filter: String,

    /// Capacity of each worker queue
    pub queue_depth: usize,

    pub engine: EngineConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_filter: "storage_service=info,storage_sys=info,warn".to_string(),
            queue_depth: 32,
            engine: EngineConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(error) => return Err(error.into()),
        };
        Self::parse(&contents).map_err(|reason| ServiceError::Config {
            path: path.display().to_string(),
            reason,
        })
    }

    pub fn parse(contents: &str) -> std::result::Result<Self, String> {
        toml::from_str(contents).map_err(|error| error.to_string())
    }
}
