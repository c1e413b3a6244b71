//! Mock transport for testing
//!
//! Scripted request -> response mapping plus manual fragment injection and
//! connection-state control. Lives in the library (not behind `cfg(test)`)
//! so downstream crates can drive the full stack without hardware.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use radlink_core::ConnectionState;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::config::MockConfig;
use crate::{LinkError, Transport};

/// Mock transport with predefined responses.
pub struct MockTransport {
    config: MockConfig,
    state_tx: watch::Sender<ConnectionState>,
    fragment_tx: broadcast::Sender<Vec<u8>>,
    /// Command text (exact or prefix) -> response fragments.
    responses: RwLock<Vec<(String, Vec<Vec<u8>>)>>,
    /// Every payload written, for assertions on ordering and content.
    writes: Mutex<Vec<Vec<u8>>>,
    fail_writes: RwLock<bool>,
}

impl MockTransport {
    /// Create a mock transport that starts out `Ready`.
    pub fn new(config: &MockConfig) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Ready);
        let (fragment_tx, _) = broadcast::channel(256);
        Arc::new(Self {
            config: config.clone(),
            state_tx,
            fragment_tx,
            responses: RwLock::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            fail_writes: RwLock::new(false),
        })
    }

    /// Script a response delivered as a single fragment.
    pub fn add_text_response(&self, command: impl Into<String>, response: impl Into<String>) {
        self.add_response(command, vec![response.into().into_bytes()]);
    }

    /// Script a response delivered as a sequence of fragments.
    pub fn add_response(&self, command: impl Into<String>, fragments: Vec<Vec<u8>>) {
        self.responses.write().push((command.into(), fragments));
    }

    /// Deliver raw bytes as if the device notified them.
    pub fn inject_fragment(&self, data: Vec<u8>) {
        let _ = self.fragment_tx.send(data);
    }

    /// Force a connection-state transition, as link loss would.
    pub fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Make subsequent writes fail with `WriteFailed`.
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write() = fail;
    }

    /// All payloads written so far, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    fn find_response(&self, command: &str) -> Option<Vec<Vec<u8>>> {
        let responses = self.responses.read();

        // Exact match first, then prefix match for variable-tail commands
        // (e.g. OTA chunk packets keyed by their hex header).
        for (expected, fragments) in responses.iter() {
            if expected == command {
                return Some(fragments.clone());
            }
        }
        for (expected, fragments) in responses.iter() {
            if command.starts_with(expected.as_str()) {
                return Some(fragments.clone());
            }
        }
        None
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn fragments(&self) -> broadcast::Receiver<Vec<u8>> {
        self.fragment_tx.subscribe()
    }

    async fn write(&self, data: &[u8]) -> Result<(), LinkError> {
        if !self.is_ready() {
            return Err(LinkError::NotConnected);
        }
        if *self.fail_writes.read() {
            return Err(LinkError::WriteFailed("mock write failure".to_string()));
        }

        self.writes.lock().push(data.to_vec());

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        let command = String::from_utf8_lossy(data).into_owned();
        if let Some(fragments) = self.find_response(&command) {
            let fragment_tx = self.fragment_tx.clone();
            tokio::spawn(async move {
                for fragment in fragments {
                    // Small gap between fragments, like a real notify stream.
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    let _ = fragment_tx.send(fragment);
                }
            });
        } else {
            debug!(%command, "mock transport: no scripted response");
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        self.state_tx.send_replace(ConnectionState::Disconnected);
        Ok(())
    }
}
