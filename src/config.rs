// src/config.rs
//! Configuration file handling

use crate::error::{Result, XexunError};
use crate::reset::{CancelPolicy, ResetPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub host: String,
    pub port: u16,
    pub reset_delay_ms: u64,  // 0 disables the reset
    pub cancel_on_decode: bool,
    pub devices: HashMap<String, i64>,  // IMEI -> device id
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5007,
            reset_delay_ms: 0,
            cancel_on_decode: false,
            devices: HashMap::new(),
        }
    }
}

impl DecoderConfig {
    /// Load from the default location, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load from an explicit path, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            XexunError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            XexunError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;

        Ok(config)
    }

    fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| XexunError::Config("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home).join(".config").join("xexun-decoder").join("config.json"))
    }

    pub fn reset_policy(&self) -> ResetPolicy {
        let cancel = if self.cancel_on_decode {
            CancelPolicy::OnDecode
        } else {
            CancelPolicy::Never
        };
        ResetPolicy::new(self.reset_delay_ms, cancel)
    }

    /// Socket address string for the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
