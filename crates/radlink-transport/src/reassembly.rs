//! Frame reassembly for a framing-free link
//!
//! The wireless link delivers logical messages as small fragments
//! (≤512 bytes) with no length prefix, so completion is heuristic: after a
//! quiet period with no new fragments, the buffer is a complete message if
//! it contains a line terminator, is a syntactically closed JSON object or
//! array, or matches a known plain-text marker (the OTA ACK byte, `OK`,
//! `ERROR`).
//!
//! The heuristic cannot distinguish two complete messages arriving
//! back-to-back within one quiet window from a single larger message; this
//! is a known limitation of the wire format, kept isolated behind this
//! type so an explicit length-prefixed framing could replace it without
//! touching the sequencer or client.

use bytes::BytesMut;
use thiserror::Error;

use radlink_core::ota::ACK;

/// Hard cap on the reassembly buffer. Exceeding it is a protocol fault.
pub const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Plain-text response prefixes some firmware revisions emit instead of a
/// JSON envelope.
const TEXT_MARKERS: [&str; 2] = ["OK", "ERROR"];

/// The buffer grew past [`MAX_BUFFER_SIZE`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("reassembly buffer overflow: {size} bytes exceeds limit of {max}")]
pub struct BufferOverflow {
    pub size: usize,
    pub max: usize,
}

/// Accumulates inbound fragments into logical messages.
///
/// Single-writer: owned by the sequencer worker task, never shared.
#[derive(Debug)]
pub struct FrameReassembler {
    buffer: BytesMut,
    max_size: usize,
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::with_max_size(MAX_BUFFER_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_size,
        }
    }

    /// Append a fragment, enforcing the size cap.
    ///
    /// On overflow the buffer is reset and the pending wait must be failed;
    /// an oversized buffer is a fault, not a transient state.
    pub fn push(&mut self, fragment: &[u8]) -> Result<(), BufferOverflow> {
        if self.buffer.len() + fragment.len() > self.max_size {
            let size = self.buffer.len() + fragment.len();
            self.buffer.clear();
            return Err(BufferOverflow {
                size,
                max: self.max_size,
            });
        }
        self.buffer.extend_from_slice(fragment);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Discard everything accumulated so far.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Evaluate the completion heuristics.
    ///
    /// Returns the whitespace-trimmed message and resets the buffer when
    /// the accumulated bytes form a complete logical message; otherwise
    /// leaves the buffer untouched so later fragments can extend it.
    pub fn try_complete(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.buffer).into_owned();
        if !is_complete(&text) {
            return None;
        }
        self.buffer.clear();
        Some(text.trim().to_string())
    }
}

fn is_complete(text: &str) -> bool {
    if text.contains('\n') {
        return true;
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    if is_closed_json(trimmed) {
        return true;
    }
    if trimmed.len() == 1 && trimmed.as_bytes()[0] == ACK {
        return true;
    }
    TEXT_MARKERS.iter().any(|marker| trimmed.starts_with(marker))
}

/// A buffer whose first and last non-whitespace characters are a matching
/// bracket pair is treated as a syntactically closed JSON document.
fn is_closed_json(trimmed: &str) -> bool {
    let first = trimmed.chars().next();
    let last = trimmed.chars().last();
    matches!((first, last), (Some('{'), Some('}')) | (Some('['), Some(']')))
}
