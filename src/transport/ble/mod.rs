//! Bluetooth Low Energy central transport

#[cfg(feature = "bluez")]
pub mod central;
#[cfg_attr(not(feature = "bluez"), allow(dead_code))]
mod slot;
pub mod uuids;

#[cfg(feature = "bluez")]
pub use central::BluerTransport;
pub use uuids::*;
