//! Runtime configuration
//!
//! Loaded from JSON or from `ZKCP_*` environment variables; every field has a
//! default so an empty object is a valid configuration.

use crate::error::{Result, ZkcpError};
use serde::{Deserialize, Serialize};
use std::env;

/// Top-level configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZkcpConfig {
    pub cipher: CipherConfig,
    pub escrow: EscrowConfig,
}

/// Keystream worker settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    /// Worker threads for keystream generation; 1 keeps it sequential
    pub workers: usize,
    /// Minimum number of keystream blocks before work is split
    pub parallel_threshold: usize,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            parallel_threshold: 1024,
        }
    }
}

/// Escrow script settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
    /// Lowest locktime accepted for the timed variant
    pub min_locktime: u32,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self { min_locktime: 1 }
    }
}

impl ZkcpConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ZkcpConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = ZkcpConfig::default();

        if let Some(workers) = read_var("ZKCP_CIPHER_WORKERS")? {
            config.cipher.workers = workers;
        }
        if let Some(threshold) = read_var("ZKCP_PARALLEL_THRESHOLD")? {
            config.cipher.parallel_threshold = threshold;
        }
        if let Some(min_locktime) = read_var("ZKCP_MIN_LOCKTIME")? {
            config.escrow.min_locktime = min_locktime;
        }

        config.validate()?;
        tracing::debug!(?config, "configuration loaded from environment");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cipher.workers == 0 {
            return Err(ZkcpError::InvalidConfig(
                "cipher.workers must be at least 1".to_string(),
            ));
        }
        if self.escrow.min_locktime == 0 {
            return Err(ZkcpError::InvalidConfig(
                "escrow.min_locktime must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ZkcpError::InvalidConfig(format!("{} = {:?}", name, value))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ZkcpError::InvalidConfig(format!("{}: {}", name, e))),
    }
}
