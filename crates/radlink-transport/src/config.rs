//! Transport configuration
//!
//! Serde structs with per-field defaulting so partial config files work.
//! Timeouts and the framing quiet period live here rather than as
//! literals at call sites.

use serde::{Deserialize, Serialize};
use uuid::{uuid, Uuid};

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Short-range wireless link (BLE GATT write/notify).
    Ble(BleConfig),
    /// Wired serial link.
    Serial(SerialConfig),
    /// Mock transport for testing.
    Mock(MockConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Mock(MockConfig::default())
    }
}

/// BLE link configuration.
///
/// The defaults match the radio's UART-style GATT service: one write
/// characteristic (host -> device) and one notify characteristic
/// (device -> host).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BleConfig {
    /// GATT service containing the command characteristics.
    #[serde(default = "default_service_uuid")]
    pub service_uuid: Uuid,
    /// Characteristic the host writes command text to.
    #[serde(default = "default_write_char_uuid")]
    pub write_char_uuid: Uuid,
    /// Characteristic the device notifies response fragments on.
    #[serde(default = "default_notify_char_uuid")]
    pub notify_char_uuid: Uuid,
    /// Bound on the connection attempt in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            service_uuid: default_service_uuid(),
            write_char_uuid: default_write_char_uuid(),
            notify_char_uuid: default_notify_char_uuid(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

fn default_service_uuid() -> Uuid {
    uuid!("6e400001-b5a3-f393-e0a9-e50e24dcca9e")
}

fn default_write_char_uuid() -> Uuid {
    uuid!("6e400002-b5a3-f393-e0a9-e50e24dcca9e")
}

fn default_notify_char_uuid() -> Uuid {
    uuid!("6e400003-b5a3-f393-e0a9-e50e24dcca9e")
}

fn default_connect_timeout() -> u64 {
    5000
}

/// Wired serial link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path (e.g. `/dev/ttyUSB0`, `COM3`).
    pub port: String,
    /// Baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Read timeout for the background reader in milliseconds. Governs how
    /// quickly the reader notices shutdown, not message framing.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    115200
}

fn default_read_timeout() -> u64 {
    100
}

/// Mock transport configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockConfig {
    /// Simulated response latency in milliseconds.
    #[serde(default)]
    pub latency_ms: u64,
}

/// Command sequencer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencerConfig {
    /// Per-command response timeout in milliseconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,
    /// Quiet period after the last fragment before completion heuristics
    /// run, in milliseconds. The link has no explicit framing, so a lull
    /// in fragments is the only signal that a message may be complete.
    #[serde(default = "default_quiet_period")]
    pub quiet_period_ms: u64,
    /// Depth of the pending-command queue.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout(),
            quiet_period_ms: default_quiet_period(),
            queue_depth: default_queue_depth(),
        }
    }
}

fn default_command_timeout() -> u64 {
    5000
}

fn default_quiet_period() -> u64 {
    200
}

fn default_queue_depth() -> usize {
    32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_config_deserializes_tagged() {
        let config: TransportConfig =
            serde_json::from_str(r#"{"type":"serial","port":"/dev/ttyUSB0"}"#).unwrap();
        match config {
            TransportConfig::Serial(cfg) => {
                assert_eq!(cfg.port, "/dev/ttyUSB0");
                assert_eq!(cfg.baud_rate, 115200);
            }
            other => panic!("expected serial config, got {other:?}"),
        }
    }

    #[test]
    fn ble_defaults_are_uart_service() {
        let config = BleConfig::default();
        assert_ne!(config.write_char_uuid, config.notify_char_uuid);
        assert_eq!(config.connect_timeout_ms, 5000);
    }

    #[test]
    fn sequencer_defaults() {
        let config: SequencerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.command_timeout_ms, 5000);
        assert_eq!(config.quiet_period_ms, 200);
    }
}
