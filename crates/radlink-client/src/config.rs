//! Client configuration
//!
//! Retry counts, backoff, and OTA pacing are configuration, not literals
//! at call sites. A full [`RadioConfig`] can be loaded from YAML.

use radlink_transport::{SequencerConfig, TransportConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol client tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Retries after the initial attempt for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry delay in milliseconds; doubles per retry.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
    /// Command sequencer tuning (per-command timeout, quiet period).
    #[serde(default)]
    pub sequencer: SequencerConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            sequencer: SequencerConfig::default(),
        }
    }
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay() -> u64 {
    100
}

/// OTA upload tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtaConfig {
    /// Fixed chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Wait after end-transfer while the device applies the image and
    /// reboots, in milliseconds.
    #[serde(default = "default_settle_time")]
    pub settle_time_ms: u64,
}

impl Default for OtaConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            settle_time_ms: default_settle_time(),
        }
    }
}

fn default_chunk_size() -> usize {
    512
}

fn default_settle_time() -> u64 {
    3000
}

/// Top-level configuration for one radio connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RadioConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub ota: OtaConfig,
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RadioConfig {
    /// Parse a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }
}
