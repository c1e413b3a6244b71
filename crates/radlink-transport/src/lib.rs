//! radlink-transport - device links for the radlink stack
//!
//! This crate turns a physical link to the radio into an ordered text
//! command channel:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    CommandSequencer                      │
//! │  one worker task, FIFO queue, single command in flight   │
//! │                          │                               │
//! │                  ┌───────┴────────┐                      │
//! │                  │FrameReassembler│                      │
//! │                  │(quiet period)  │                      │
//! │                  └───────┬────────┘                      │
//! │                          │                               │
//! │                 ┌────────┴────────┐                      │
//! │                 │   Transport     │                      │
//! │                 │ (BLE / serial)  │                      │
//! │                 └─────────────────┘                      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Transports are substitutable: the BLE link fragments messages into
//! ≤512-byte notifications with no length prefix, the wired serial link
//! delivers whatever the OS read returns, and the mock link is scripted
//! for tests. The reassembler and sequencer are identical above all three.

mod adapter;
pub mod ble;
pub mod config;
pub mod error;
pub mod mock;
pub mod reassembly;
pub mod sequencer;
pub mod serial;

pub use adapter::Transport;
pub use config::{BleConfig, MockConfig, SequencerConfig, SerialConfig, TransportConfig};
pub use error::LinkError;
pub use mock::MockTransport;
pub use reassembly::FrameReassembler;
pub use sequencer::CommandSequencer;

use std::sync::Arc;

/// Create a transport from configuration.
///
/// BLE cannot be built from configuration alone - it needs a peripheral
/// produced by device discovery - so use [`ble::BleTransport::connect`]
/// for that path.
pub fn create_transport(config: &TransportConfig) -> Result<Arc<dyn Transport>, LinkError> {
    match config {
        TransportConfig::Serial(cfg) => {
            let transport = serial::SerialTransport::open(cfg)?;
            Ok(transport)
        }
        TransportConfig::Ble(_) => Err(LinkError::Unsupported(
            "BLE requires a discovered peripheral; use BleTransport::connect".to_string(),
        )),
        TransportConfig::Mock(cfg) => {
            let transport = mock::MockTransport::new(cfg);
            Ok(transport)
        }
    }
}
