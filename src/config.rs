//! Runtime configuration
//!
//! Configuration is plain data with serde defaults, so a JSON file only
//! needs the keys it wants to change:
//!
//! ```
//! use quickpromise::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_json_str(r#"{ "max_resolution_depth": 64 }"#).unwrap();
//! assert_eq!(config.max_resolution_depth, 64);
//! assert_eq!(config.max_microtasks_per_tick, 10_000);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables shared by every promise created from one [`Runtime`](crate::Runtime)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// How many nested thenables the resolution procedure follows before
    /// rejecting with a TypeError
    pub max_resolution_depth: usize,
    /// Maximum microtasks the reference event loop drains per tick
    pub max_microtasks_per_tick: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_resolution_depth: 256,
            max_microtasks_per_tick: 10_000,
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RuntimeConfig =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Reject limits that would make every promise fail or stall
    pub fn validate(&self) -> Result<()> {
        if self.max_resolution_depth == 0 {
            return Err(Error::Config("max_resolution_depth must be at least 1".into()));
        }
        if self.max_microtasks_per_tick == 0 {
            return Err(Error::Config("max_microtasks_per_tick must be at least 1".into()));
        }
        Ok(())
    }
}
