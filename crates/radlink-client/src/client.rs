//! Typed RPC client
//!
//! [`RpcClient`] owns the request-id counter and the retry loop. Ids
//! increase monotonically for the lifetime of the client; a retry gets a
//! fresh id so a late response to the failed attempt can never be mistaken
//! for the retry's answer. Responses are correlated by id and anything
//! that does not match is a protocol fault, not silently accepted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use radlink_core::{RpcRequest, RpcResponse};
use radlink_transport::{CommandSequencer, LinkError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::config::ProtocolConfig;
use crate::error::RpcError;

/// Identity and firmware revision reported by the device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceInfo {
    pub model: String,
    pub serial: String,
    pub firmware_version: String,
    #[serde(default)]
    pub hardware_revision: Option<String>,
}

/// Battery telemetry reported by the device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatteryStatus {
    /// State of charge, 0-100.
    pub percent: u8,
    /// Pack voltage in millivolts.
    pub voltage_mv: u32,
    #[serde(default)]
    pub charging: bool,
}

/// Typed command client over a [`CommandSequencer`].
pub struct RpcClient {
    sequencer: CommandSequencer,
    config: ProtocolConfig,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(sequencer: CommandSequencer, config: ProtocolConfig) -> Self {
        Self {
            sequencer,
            config,
            next_id: AtomicU64::new(1),
        }
    }

    /// The sequencer this client submits through.
    pub fn sequencer(&self) -> &CommandSequencer {
        &self.sequencer
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Issue `method` and decode the result into `T`, retrying transient
    /// failures per the configured policy.
    #[instrument(skip(self, params))]
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, RpcError> {
        // Fail fast rather than queueing behind a dead link; a not-ready
        // transport is not a transient condition worth retrying.
        if !self.sequencer.transport().is_ready() {
            return Err(RpcError::Transport(LinkError::NotConnected));
        }

        let mut attempt = 0u32;
        loop {
            // A fresh id per attempt: the failed attempt's late response
            // must not satisfy the retry.
            let id = self.allocate_id();
            match self.call_once(method, params.clone(), id).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.retry_base_delay_ms << attempt;
                    warn!(%error, attempt, delay_ms = delay, "retrying after transient failure");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn call_once<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        id: u64,
    ) -> Result<T, RpcError> {
        let request = RpcRequest::new(method, params, id);
        let text = serde_json::to_string(&request)
            .map_err(|e| RpcError::Parse(format!("request encoding failed: {e}")))?;

        debug!(id, "sending request");
        let response_text = self
            .sequencer
            .submit(text)
            .await
            .map_err(RpcError::from_link)?;

        self.decode(&response_text, id)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str, expected_id: u64) -> Result<T, RpcError> {
        if text.is_empty() {
            return Err(RpcError::Transport(LinkError::InvalidResponse(
                "empty response".to_string(),
            )));
        }
        // Reassembly is byte-transparent but responses must be UTF-8 JSON;
        // replacement characters mean the link corrupted the stream.
        if text.contains('\u{FFFD}') {
            return Err(RpcError::Transport(LinkError::InvalidResponse(
                "response is not valid UTF-8".to_string(),
            )));
        }

        let response: RpcResponse = serde_json::from_str(text)
            .map_err(|e| RpcError::Parse(format!("malformed response envelope: {e}")))?;

        if response.id != expected_id {
            return Err(RpcError::Parse(format!(
                "response id {} does not match request id {expected_id}",
                response.id
            )));
        }

        if let Some(error) = response.error {
            return Err(RpcError::from_device(error.code, error.message));
        }

        let result = response.result.ok_or(RpcError::InvalidRequest)?;
        serde_json::from_value(result)
            .map_err(|e| RpcError::Parse(format!("result decoding failed: {e}")))
    }

    /// Liveness probe; the device answers with a short token.
    pub async fn ping(&self) -> Result<String, RpcError> {
        self.call("ping", None).await
    }

    /// Model, serial, and firmware revision.
    pub async fn device_info(&self) -> Result<DeviceInfo, RpcError> {
        self.call("device_info", None).await
    }

    /// Battery charge and voltage telemetry.
    pub async fn battery_status(&self) -> Result<BatteryStatus, RpcError> {
        self.call("battery_status", None).await
    }

    /// Read a named device setting.
    pub async fn read_setting(&self, key: &str) -> Result<Value, RpcError> {
        self.call("read_setting", Some(json!({ "key": key }))).await
    }

    /// Write a named device setting.
    pub async fn write_setting(&self, key: &str, value: Value) -> Result<(), RpcError> {
        let _: Value = self
            .call("write_setting", Some(json!({ "key": key, "value": value })))
            .await?;
        Ok(())
    }
}
