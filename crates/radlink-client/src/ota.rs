//! OTA firmware uploader
//!
//! Streams a verified image to the device over the command channel as
//! hex-encoded binary packets (`radlink-core::ota`). Every chunk must be
//! acknowledged with the ACK byte before the next one is sent; a missing
//! or wrong acknowledgment aborts the upload at that offset. The
//! end-transfer packet is fire-and-forget: the device reboots into the
//! new image and never answers it.

use std::time::Duration;

use radlink_core::ota::{encode_begin, encode_chunk, encode_end, to_wire_text, ACK};
use radlink_firmware::FirmwarePackage;
use radlink_transport::{CommandSequencer, LinkError};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::OtaConfig;

/// Upload failures.
#[derive(Debug, Error)]
pub enum OtaError {
    /// The image is empty or larger than the protocol can address.
    #[error("image of {0} bytes cannot be uploaded")]
    InvalidImageSize(usize),

    /// The configured chunk size cannot be expressed in the chunk packet's
    /// u16 length field (or is zero).
    #[error("chunk size of {0} bytes cannot be uploaded")]
    InvalidChunkSize(usize),

    /// The connection was not ready, or dropped mid-upload.
    #[error("device is not connected")]
    NotConnected,

    /// The chunk at `offset` was not acknowledged. The device discards the
    /// partial image; the whole upload must be restarted.
    #[error("chunk at offset {offset} was not acknowledged")]
    ChunkFailed { offset: u32 },

    /// The device did not answer the begin-transfer in time.
    #[error("timed out waiting for the device")]
    Timeout,

    /// Link failure outside the per-chunk exchange.
    #[error("link error during upload: {0}")]
    Link(LinkError),
}

/// Upload phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaPhase {
    /// Begin-transfer sent, waiting for the device to erase flash.
    Starting,
    /// Chunks in flight.
    Transferring,
    /// End-transfer sent, device applying the image.
    Finalizing,
    /// Settle window elapsed.
    Complete,
}

/// Progress snapshot delivered to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtaProgress {
    pub phase: OtaPhase,
    pub chunks_sent: usize,
    pub total_chunks: usize,
    pub bytes_sent: usize,
    pub total_bytes: usize,
}

/// In-flight upload bookkeeping. Created when an upload starts, advanced
/// as each chunk is acknowledged, dropped on completion or first failure.
#[derive(Debug, Clone, Copy)]
struct OtaSession {
    total_size: usize,
    chunk_size: usize,
    bytes_sent: usize,
    chunks_sent: usize,
    offset: u32,
}

impl OtaSession {
    fn new(total_size: usize, chunk_size: usize) -> Self {
        Self {
            total_size,
            chunk_size,
            bytes_sent: 0,
            chunks_sent: 0,
            offset: 0,
        }
    }

    fn total_chunks(&self) -> usize {
        self.total_size.div_ceil(self.chunk_size)
    }

    fn record_ack(&mut self, chunk_len: usize) {
        self.bytes_sent += chunk_len;
        self.chunks_sent += 1;
        self.offset = self.bytes_sent as u32;
    }

    fn progress(&self, phase: OtaPhase) -> OtaProgress {
        OtaProgress {
            phase,
            chunks_sent: self.chunks_sent,
            total_chunks: self.total_chunks(),
            bytes_sent: self.bytes_sent,
            total_bytes: self.total_size,
        }
    }
}

type ProgressFn = Box<dyn Fn(OtaProgress) + Send + Sync>;

/// Chunked, acknowledged firmware uploader.
pub struct OtaUploader {
    sequencer: CommandSequencer,
    config: OtaConfig,
    progress: Option<ProgressFn>,
}

impl OtaUploader {
    pub fn new(sequencer: CommandSequencer, config: OtaConfig) -> Self {
        Self {
            sequencer,
            config,
            progress: None,
        }
    }

    /// Install a progress callback invoked on every phase change and
    /// acknowledged chunk.
    pub fn with_progress(mut self, callback: impl Fn(OtaProgress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    fn report(&self, progress: OtaProgress) {
        if let Some(callback) = &self.progress {
            callback(progress);
        }
    }

    /// Upload a verified package's main image.
    ///
    /// Taking [`FirmwarePackage`] rather than raw bytes keeps unverified
    /// images out of this path entirely: the only way to construct one is
    /// through its verifying loader.
    #[instrument(skip_all, fields(version = %package.manifest().version))]
    pub async fn flash_package(&self, package: &FirmwarePackage) -> Result<(), OtaError> {
        self.upload(package.main_image()).await
    }

    async fn upload(&self, image: &[u8]) -> Result<(), OtaError> {
        let total = image.len();
        if total == 0 || total > u32::MAX as usize {
            return Err(OtaError::InvalidImageSize(total));
        }
        // chunk_size comes from loadable config; the wire format caps a
        // chunk's length field at u16.
        let chunk_size = self.config.chunk_size;
        if chunk_size == 0 || chunk_size > u16::MAX as usize {
            return Err(OtaError::InvalidChunkSize(chunk_size));
        }

        info!(total, chunk_size = self.config.chunk_size, "starting firmware upload");
        let mut session = OtaSession::new(total, self.config.chunk_size);
        self.report(session.progress(OtaPhase::Starting));
        self.begin_transfer(total as u32).await?;

        self.report(session.progress(OtaPhase::Transferring));
        for chunk in image.chunks(session.chunk_size) {
            self.send_chunk(session.offset, chunk).await?;
            session.record_ack(chunk.len());
            // Reported synchronously, before the next chunk goes out.
            self.report(session.progress(OtaPhase::Transferring));
        }

        self.report(session.progress(OtaPhase::Finalizing));
        self.end_transfer().await;

        // Give the device its reboot window before the caller touches the
        // link again.
        tokio::time::sleep(Duration::from_millis(self.config.settle_time_ms)).await;
        self.report(session.progress(OtaPhase::Complete));
        info!("firmware upload complete");
        Ok(())
    }

    async fn begin_transfer(&self, total_size: u32) -> Result<(), OtaError> {
        let text = to_wire_text(&encode_begin(total_size));
        let response = self.sequencer.submit(text).await.map_err(map_link)?;
        if !is_ack(&response) {
            warn!(%response, "device rejected begin-transfer");
            return Err(OtaError::Link(LinkError::InvalidResponse(format!(
                "begin-transfer not acknowledged: {response:?}"
            ))));
        }
        Ok(())
    }

    async fn send_chunk(&self, offset: u32, data: &[u8]) -> Result<(), OtaError> {
        let text = to_wire_text(&encode_chunk(offset, data));
        match self.sequencer.submit(text).await {
            Ok(response) if is_ack(&response) => {
                debug!(offset, len = data.len(), "chunk acknowledged");
                Ok(())
            }
            Ok(response) => {
                warn!(offset, %response, "chunk not acknowledged");
                Err(OtaError::ChunkFailed { offset })
            }
            Err(LinkError::NotConnected | LinkError::LinkLost) => Err(OtaError::NotConnected),
            Err(error) => {
                warn!(offset, %error, "chunk exchange failed");
                Err(OtaError::ChunkFailed { offset })
            }
        }
    }

    /// Fire-and-forget: the device applies the image and reboots instead of
    /// answering, so this writes directly rather than awaiting a response.
    async fn end_transfer(&self) {
        let text = to_wire_text(&encode_end());
        if let Err(error) = self.sequencer.transport().write(text.as_bytes()).await {
            warn!(%error, "end-transfer write failed; device may still apply the image");
        }
    }
}

fn map_link(error: LinkError) -> OtaError {
    match error {
        LinkError::NotConnected | LinkError::LinkLost => OtaError::NotConnected,
        LinkError::Timeout => OtaError::Timeout,
        other => OtaError::Link(other),
    }
}

fn is_ack(response: &str) -> bool {
    response.as_bytes() == [ACK]
}
