//! RPC error taxonomy

use radlink_core::RpcErrorKind;
use radlink_transport::LinkError;
use thiserror::Error;

/// Errors from a protocol-level call.
///
/// `Parse`, `Timeout`, and `Transport` indicate transient link or framing
/// trouble and are retried by the client; everything else means the device
/// semantically rejected the request, and retrying would not help.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// The response envelope was malformed, carried an unknown id, or the
    /// typed result failed to decode.
    #[error("parse error: {0}")]
    Parse(String),

    /// The device rejected the envelope, or the response carried neither
    /// result nor error.
    #[error("invalid request")]
    InvalidRequest,

    /// The method does not exist on the device.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// The method exists but rejected its parameters.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Internal device error.
    #[error("internal device error: {0}")]
    InternalError(String),

    /// The link failed underneath the call.
    #[error("transport error: {0}")]
    Transport(LinkError),

    /// No response within the command timeout.
    #[error("timed out waiting for device response")]
    Timeout,

    /// Device-reported error outside the standard code set.
    #[error("device error {code}: {message}")]
    Unknown { code: i32, message: String },
}

impl RpcError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Timeout | Self::Transport(_))
    }

    /// Map a link failure onto the call taxonomy.
    pub(crate) fn from_link(error: LinkError) -> Self {
        match error {
            LinkError::Timeout => Self::Timeout,
            other => Self::Transport(other),
        }
    }

    /// Map a device-reported error object onto the taxonomy.
    pub(crate) fn from_device(code: i32, message: String) -> Self {
        match RpcErrorKind::from(code) {
            RpcErrorKind::ParseError => Self::Parse(message),
            RpcErrorKind::InvalidRequest => Self::InvalidRequest,
            RpcErrorKind::MethodNotFound => Self::MethodNotFound(message),
            RpcErrorKind::InvalidParams => Self::InvalidParams(message),
            RpcErrorKind::InternalError => Self::InternalError(message),
            RpcErrorKind::Unknown(code) => Self::Unknown { code, message },
        }
    }
}
