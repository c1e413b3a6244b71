//! Integration tests for the radlink stack
//!
//! This crate contains end-to-end tests that exercise the full stack over
//! the mock transport:
//! - command sequencing and frame reassembly
//! - typed RPC client (correlation, retry, error classification)
//! - firmware package verification and OTA upload
//!
//! # Test Structure
//!
//! - `client_e2e_test.rs` - sequencer ordering and RPC client behavior
//! - `firmware_e2e_test.rs` - verified package to flashed image, end to end

// This crate only contains tests, no library code
