//! Transport trait

use async_trait::async_trait;
use radlink_core::ConnectionState;
use tokio::sync::{broadcast, watch};

use crate::LinkError;

/// Substitutable channel over which command text is exchanged with the
/// device.
///
/// Implementations own the [`ConnectionState`] exclusively and publish
/// every transition on the watch channel. Inbound bytes arrive as raw
/// fragments on the broadcast channel; reassembly into logical messages
/// happens above the transport, in [`crate::FrameReassembler`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Watch channel that receives every state transition.
    ///
    /// A transition to [`ConnectionState::Disconnected`] must immediately
    /// fail all waits that observe it; no wait may outlive the connection
    /// that created it.
    fn watch_state(&self) -> watch::Receiver<ConnectionState>;

    /// Subscribe to raw inbound fragments.
    fn fragments(&self) -> broadcast::Receiver<Vec<u8>>;

    /// Write raw bytes to the physical channel.
    ///
    /// Fails fast with [`LinkError::NotConnected`] while the transport is
    /// not ready rather than blocking; an undeliverable write surfaces as
    /// [`LinkError::WriteFailed`].
    async fn write(&self, data: &[u8]) -> Result<(), LinkError>;

    /// Tear the link down. Pending waits observe the state change and fail
    /// with [`LinkError::LinkLost`].
    async fn disconnect(&self) -> Result<(), LinkError>;

    /// Whether the physical link is up.
    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Whether both write and notify channels have been located and the
    /// transport accepts commands.
    fn is_ready(&self) -> bool {
        self.state().is_ready()
    }
}
