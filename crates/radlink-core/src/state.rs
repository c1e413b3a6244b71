//! Transport connection lifecycle state

use serde::{Deserialize, Serialize};

/// Connection state of a device transport.
///
/// State machine:
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Ready
///       ^                                      |
///       `------------ link drop / disconnect --'
/// ```
///
/// `Connected` means the physical link is up but capability discovery
/// (locating the write and notify channels) has not finished; only `Ready`
/// accepts commands. Any link loss transitions straight to `Disconnected`
/// and cancels all pending work downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No link to the device.
    Disconnected,
    /// Connection attempt in progress (bounded by a timeout).
    Connecting,
    /// Link established, write/notify channels not yet located.
    Connected,
    /// Both channels located and notifications enabled; commands accepted.
    Ready,
}

impl ConnectionState {
    /// Whether the physical link is up (regardless of readiness).
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected | Self::Ready)
    }

    /// Whether the transport accepts commands.
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Ready => "ready",
        };
        f.write_str(s)
    }
}
