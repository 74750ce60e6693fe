//! Transports between the session engine and a peripheral

pub mod ble;
pub mod link;
pub mod simulated;

pub use link::{NotifyHandler, Transport};
pub use simulated::SimulatedPeripheral;
