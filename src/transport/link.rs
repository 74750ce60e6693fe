//! Transport adapter trait definition

use tokio::sync::mpsc;
use trait_variant::make;

use crate::core::{error::TransportResult, types::DeviceHandle};

/// Receives every notification the peripheral sends
pub type NotifyHandler = mpsc::UnboundedSender<Vec<u8>>;

/// Point-to-point link to one peripheral at a time
///
/// Furnished by the platform radio stack. The provisioning engine owns the
/// transport exclusively while a session is active, so implementations need
/// not guard against concurrent callers.
#[make(Send)]
pub trait Transport: Send + Sync + 'static {
    /// Establish the link to `device`
    async fn connect(&self, device: &DeviceHandle) -> TransportResult<()>;

    /// Write one complete frame to the peripheral
    async fn write(&self, bytes: &[u8]) -> TransportResult<()>;

    /// Route incoming notifications to `handler`, replacing any previous one
    async fn set_notify_handler(&self, handler: NotifyHandler);

    /// Tear the link down
    ///
    /// Must be idempotent: disconnecting an idle transport is not an error.
    async fn disconnect(&self) -> TransportResult<()>;
}
