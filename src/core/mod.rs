//! Core provisioning logic

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod progress;
pub mod scanner;
pub mod session;
pub mod types;
