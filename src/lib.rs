//! WiFi Provisioner
//!
//! Hands WiFi credentials to a headless peripheral over a BLE link:
//! - binary credential codec with checksum
//! - timeout driven session state machine
//! - coordinator with retries, cancellation and progress reporting

pub mod backend;
pub mod config;
pub mod core;
pub mod protocol;
pub mod transport;

pub use core::{
    coordinator::SessionCoordinator,
    error::{DecodeError, FailureReason, ServiceError, TransportError},
    types::{AccessPoint, NetworkCredential, Outcome, ProgressEvent, SessionState},
};
