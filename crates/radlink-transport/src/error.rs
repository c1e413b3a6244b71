//! Link layer errors

use thiserror::Error;

/// Errors surfaced by a [`crate::Transport`] or the command sequencer.
///
/// All of these are recoverable by reconnecting; none are silently
/// swallowed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The transport is not ready; the call failed fast instead of blocking.
    #[error("not connected")]
    NotConnected,

    /// A connection attempt did not produce a usable link.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// Bytes could not be delivered to the physical channel.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// The link dropped while a wait was in flight.
    #[error("link lost")]
    LinkLost,

    /// No complete response arrived within the command timeout.
    #[error("timed out waiting for response")]
    Timeout,

    /// The inbound byte stream violated the framing rules (oversized or
    /// unparseable buffer). A protocol fault, not a transient state.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The requested transport cannot be built in this context.
    #[error("transport not supported: {0}")]
    Unsupported(String),
}
