//! radlink-core - shared protocol types for the radlink stack
//!
//! This crate holds the pure, I/O-free pieces of the protocol:
//!
//! - [`ConnectionState`] - transport lifecycle state machine
//! - [`rpc`] - JSON-RPC 2.0 request/response envelope and error taxonomy
//! - [`ota`] - the binary OTA sub-protocol codec (begin/chunk/end/ACK)
//!
//! Everything here is deterministic over its inputs and safe to call from
//! any context; transports and clients live in `radlink-transport` and
//! `radlink-client`.

pub mod ota;
pub mod rpc;
mod state;

pub use rpc::{RpcErrorKind, RpcErrorObject, RpcRequest, RpcResponse, PROTOCOL_VERSION};
pub use state::ConnectionState;
