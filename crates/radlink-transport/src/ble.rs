//! BLE transport - GATT write/notify command channel
//!
//! The radio exposes a UART-style GATT service: the host writes command
//! text to the write characteristic and the device answers with
//! notifications on the notify characteristic, fragmented to the link MTU
//! (≤512 bytes) with no length prefix.
//!
//! Readiness requires more than a link: both characteristics must be
//! located and notifications enabled before the transport reports `Ready`.
//! Device discovery (finding the peripheral to hand in here) is a
//! collaborator's job.

use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use radlink_core::ConnectionState;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BleConfig;
use crate::{LinkError, Transport};

/// BLE GATT transport over a discovered peripheral.
pub struct BleTransport {
    peripheral: Peripheral,
    write_char: RwLock<Option<Characteristic>>,
    state_tx: watch::Sender<ConnectionState>,
    fragment_tx: broadcast::Sender<Vec<u8>>,
    notify_task: Mutex<Option<JoinHandle<()>>>,
}

impl BleTransport {
    /// Connect the peripheral and bring the transport to `Ready`.
    ///
    /// The attempt is bounded by `config.connect_timeout_ms`; on expiry or
    /// any discovery failure the state returns to `Disconnected` and an
    /// error is returned.
    pub async fn connect(
        peripheral: Peripheral,
        config: &BleConfig,
    ) -> Result<Arc<Self>, LinkError> {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (fragment_tx, _) = broadcast::channel(256);

        let transport = Arc::new(Self {
            peripheral,
            write_char: RwLock::new(None),
            state_tx,
            fragment_tx,
            notify_task: Mutex::new(None),
        });

        if let Err(error) = transport.establish(config).await {
            transport.state_tx.send_replace(ConnectionState::Disconnected);
            let _ = transport.peripheral.disconnect().await;
            return Err(error);
        }
        Ok(transport)
    }

    async fn establish(&self, config: &BleConfig) -> Result<(), LinkError> {
        self.state_tx.send_replace(ConnectionState::Connecting);

        let timeout = std::time::Duration::from_millis(config.connect_timeout_ms);
        tokio::time::timeout(timeout, self.peripheral.connect())
            .await
            .map_err(|_| LinkError::ConnectFailed("connection attempt timed out".to_string()))?
            .map_err(|e| LinkError::ConnectFailed(e.to_string()))?;

        self.state_tx.send_replace(ConnectionState::Connected);
        debug!("link established, discovering services");

        self.peripheral
            .discover_services()
            .await
            .map_err(|e| LinkError::ConnectFailed(e.to_string()))?;

        let characteristics = self.peripheral.characteristics();
        let write_char = find_characteristic(
            &characteristics,
            config.service_uuid,
            config.write_char_uuid,
        )
        .ok_or_else(|| {
            LinkError::ConnectFailed(format!(
                "write characteristic {} not found in service {}",
                config.write_char_uuid, config.service_uuid
            ))
        })?;
        let notify_char = find_characteristic(
            &characteristics,
            config.service_uuid,
            config.notify_char_uuid,
        )
        .ok_or_else(|| {
            LinkError::ConnectFailed(format!(
                "notify characteristic {} not found in service {}",
                config.notify_char_uuid, config.service_uuid
            ))
        })?;

        self.peripheral
            .subscribe(&notify_char)
            .await
            .map_err(|e| LinkError::ConnectFailed(e.to_string()))?;

        let mut notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(|e| LinkError::ConnectFailed(e.to_string()))?;

        *self.write_char.write() = Some(write_char);

        // Pump notifications into the fragment channel. The stream ending
        // means the peripheral disconnected.
        let fragment_tx = self.fragment_tx.clone();
        let state_tx = self.state_tx.clone();
        let notify_uuid = config.notify_char_uuid;
        let handle = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid == notify_uuid {
                    let _ = fragment_tx.send(notification.value);
                }
            }
            warn!("notification stream ended, link lost");
            state_tx.send_replace(ConnectionState::Disconnected);
        });
        *self.notify_task.lock() = Some(handle);

        self.state_tx.send_replace(ConnectionState::Ready);
        info!("BLE transport ready");
        Ok(())
    }
}

#[async_trait]
impl Transport for BleTransport {
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
        let characteristic = self
            .write_char
            .read()
            .clone()
            .ok_or(LinkError::NotConnected)?;

        self.peripheral
            .write(&characteristic, data, WriteType::WithoutResponse)
            .await
            .map_err(|e| LinkError::WriteFailed(e.to_string()))
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        if let Some(handle) = self.notify_task.lock().take() {
            handle.abort();
        }
        let _ = self.peripheral.disconnect().await;
        self.state_tx.send_replace(ConnectionState::Disconnected);
        Ok(())
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.notify_task.get_mut().take() {
            handle.abort();
        }
    }
}

/// Locate a characteristic by UUID within the configured service.
///
/// Some peripherals expose the same characteristic UUID under more than
/// one service, so matching on the characteristic UUID alone can pick the
/// wrong one.
fn find_characteristic<'a>(
    characteristics: impl IntoIterator<Item = &'a Characteristic>,
    service_uuid: Uuid,
    char_uuid: Uuid,
) -> Option<Characteristic> {
    characteristics
        .into_iter()
        .find(|c| c.service_uuid == service_uuid && c.uuid == char_uuid)
        .cloned()
}
