//! JSON-RPC 2.0 envelope types and error-code taxonomy
//!
//! The device speaks a JSON-RPC-like protocol over newline- or
//! bracket-delimited UTF-8 text. Requests carry a monotonically increasing
//! integer id that is unique for the lifetime of one connection; a response
//! with an unknown id is a protocol fault.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The single protocol version spoken on the wire. No negotiation.
pub const PROTOCOL_VERSION: &str = "2.0";

/// A request envelope: `{"jsonrpc":"2.0","method":...,"params":...,"id":N}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: u64,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: u64) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A response envelope carrying exactly one of `result` or `error`.
///
/// `result` distinguishes an absent field (`None`) from a present JSON
/// `null` (`Some(Value::Null)`): void methods legally answer with
/// `"result":null`, which is a success, while a response carrying neither
/// field is malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
    pub id: u64,
}

/// Only invoked when the field is present, so a JSON `null` becomes
/// `Some(Value::Null)` rather than collapsing into `None`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Device-reported error object inside a response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i32,
    pub message: String,
}

/// The standard JSON-RPC error codes as a closed sum type.
///
/// Anything outside the standard set becomes [`RpcErrorKind::Unknown`] so
/// callers can match exhaustively instead of comparing numeric ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorKind {
    /// -32700: the device could not parse the request text.
    ParseError,
    /// -32600: the envelope was not a valid request object.
    InvalidRequest,
    /// -32601: the method does not exist on the device.
    MethodNotFound,
    /// -32602: the method exists but the parameters were rejected.
    InvalidParams,
    /// -32603: internal device error.
    InternalError,
    /// Any non-standard code.
    Unknown(i32),
}

impl From<i32> for RpcErrorKind {
    fn from(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            other => Self::Unknown(other),
        }
    }
}

impl RpcErrorKind {
    pub fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::Unknown(code) => code,
        }
    }
}

impl std::fmt::Display for RpcErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParseError => write!(f, "parse error"),
            Self::InvalidRequest => write!(f, "invalid request"),
            Self::MethodNotFound => write!(f, "method not found"),
            Self::InvalidParams => write!(f, "invalid params"),
            Self::InternalError => write!(f, "internal error"),
            Self::Unknown(code) => write!(f, "unknown error code {code}"),
        }
    }
}
