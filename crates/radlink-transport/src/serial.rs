//! Wired serial transport
//!
//! Second implementer of the transport contract. A background reader
//! thread feeds raw read chunks into the fragment channel; writes go
//! through a cloned port handle on the blocking pool. The port is usable
//! as soon as it opens, so the transport goes straight to `Ready`.
//!
//! Enumerating which serial device is the radio is a collaborator's job;
//! this module only opens the configured port.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use radlink_core::ConnectionState;
use serialport::SerialPort;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::{LinkError, Transport};

/// Read granularity for the background reader.
const READ_CHUNK_SIZE: usize = 512;

/// Wired serial transport.
pub struct SerialTransport {
    writer: Arc<Mutex<Box<dyn SerialPort>>>,
    state_tx: watch::Sender<ConnectionState>,
    fragment_tx: broadcast::Sender<Vec<u8>>,
    shutdown: Arc<AtomicBool>,
}

impl SerialTransport {
    /// Open the configured port and start the reader thread.
    pub fn open(config: &SerialConfig) -> Result<Arc<Self>, LinkError> {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let (fragment_tx, _) = broadcast::channel(256);

        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()
            .map_err(|e| {
                state_tx.send_replace(ConnectionState::Disconnected);
                LinkError::ConnectFailed(e.to_string())
            })?;

        let reader = port
            .try_clone()
            .map_err(|e| LinkError::ConnectFailed(e.to_string()))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        spawn_reader(reader, fragment_tx.clone(), state_tx.clone(), shutdown.clone());

        state_tx.send_replace(ConnectionState::Ready);
        info!(port = %config.port, baud = config.baud_rate, "serial transport ready");

        Ok(Arc::new(Self {
            writer: Arc::new(Mutex::new(port)),
            state_tx,
            fragment_tx,
            shutdown,
        }))
    }
}

fn spawn_reader(
    mut reader: Box<dyn SerialPort>,
    fragment_tx: broadcast::Sender<Vec<u8>>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: Arc<AtomicBool>,
) {
    std::thread::spawn(move || {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        loop {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            match reader.read(&mut buf) {
                Ok(0) => {
                    warn!("serial port closed by peer");
                    state_tx.send_replace(ConnectionState::Disconnected);
                    break;
                }
                Ok(n) => {
                    let _ = fragment_tx.send(buf[..n].to_vec());
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    // Read timeout is how we poll the shutdown flag.
                }
                Err(e) => {
                    warn!(%e, "serial read failed, link lost");
                    state_tx.send_replace(ConnectionState::Disconnected);
                    break;
                }
            }
        }
        debug!("serial reader stopped");
    });
}

#[async_trait]
impl Transport for SerialTransport {
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
        let writer = self.writer.clone();
        let data = data.to_vec();
        let result = tokio::task::spawn_blocking(move || {
            let mut port = writer.lock();
            port.write_all(&data).and_then(|()| port.flush())
        })
        .await
        .map_err(|e| LinkError::WriteFailed(e.to_string()))?;

        result.map_err(|e| {
            self.state_tx.send_replace(ConnectionState::Disconnected);
            LinkError::WriteFailed(e.to_string())
        })
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.state_tx.send_replace(ConnectionState::Disconnected);
        Ok(())
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}
