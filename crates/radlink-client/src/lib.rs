//! radlink-client - typed command surface for the radio
//!
//! Two layers sit on top of the transport stack:
//!
//! - [`RpcClient`] translates typed method calls into protocol requests,
//!   correlates responses by id, classifies device-reported errors, and
//!   retries the transient failure kinds with exponential backoff.
//! - [`OtaUploader`] streams a firmware image to the device in
//!   acknowledged fixed-size chunks over the same command channel.
//!
//! A firmware package must pass verification (`radlink-firmware`) before
//! its bytes reach the uploader; [`OtaUploader::flash_package`] enforces
//! that by accepting only verified packages.

mod client;
pub mod config;
mod error;
pub mod ota;

pub use client::{BatteryStatus, DeviceInfo, RpcClient};
pub use config::{ConfigError, OtaConfig, ProtocolConfig, RadioConfig};
pub use error::RpcError;
pub use ota::{OtaError, OtaPhase, OtaProgress, OtaUploader};
