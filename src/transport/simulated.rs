//! Simulated peripheral
//!
//! Speaks the real wire protocol without a radio: it sends the ready signal
//! after connect, decodes the credential frame and answers after a delay.
//! Every step can be scripted to misbehave, which makes it the test double
//! for the session engine as well as the `--simulate` mode of the CLI.

use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    core::{
        error::{TransportError, TransportResult},
        types::{DeviceHandle, ProvisioningResponse, ResponseStatus},
    },
    protocol::{self, ProvisioningRequest},
    transport::{NotifyHandler, Transport},
};

/// Default delay before the simulated peripheral acknowledges credentials
pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    Succeed,
    Fail,
    /// Never complete
    Hang,
    /// Hang for the first `n` connects, succeed afterwards
    HangFirst(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeBehavior {
    Ready,
    Silent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBehavior {
    Succeed,
    Fail,
    Hang,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyBehavior {
    Accept,
    Reject(u8),
    ReportMalformed,
    WrongRequestId,
    Garbage,
    Silent,
}

#[derive(Debug)]
struct PeripheralState {
    connect: ConnectBehavior,
    handshake: HandshakeBehavior,
    write: WriteBehavior,
    reply: ReplyBehavior,
    ready_delay: Duration,
    reply_delay: Duration,
    notify: Option<NotifyHandler>,
    connected: bool,
    connect_calls: u32,
    write_calls: u32,
    disconnect_calls: u32,
    received: Vec<ProvisioningRequest>,
}

/// In-process peripheral implementing [`Transport`]
#[derive(Debug, Clone)]
pub struct SimulatedPeripheral {
    inner: Arc<Mutex<PeripheralState>>,
}

impl SimulatedPeripheral {
    /// A well behaved peripheral that accepts after [`DEFAULT_REPLY_DELAY`]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PeripheralState {
                connect: ConnectBehavior::Succeed,
                handshake: HandshakeBehavior::Ready,
                write: WriteBehavior::Succeed,
                reply: ReplyBehavior::Accept,
                ready_delay: Duration::ZERO,
                reply_delay: DEFAULT_REPLY_DELAY,
                notify: None,
                connected: false,
                connect_calls: 0,
                write_calls: 0,
                disconnect_calls: 0,
                received: Vec::new(),
            })),
        }
    }

    pub async fn set_connect_behavior(&self, behavior: ConnectBehavior) {
        self.inner.lock().await.connect = behavior;
    }

    pub async fn set_handshake_behavior(&self, behavior: HandshakeBehavior) {
        self.inner.lock().await.handshake = behavior;
    }

    pub async fn set_write_behavior(&self, behavior: WriteBehavior) {
        self.inner.lock().await.write = behavior;
    }

    pub async fn set_reply_behavior(&self, behavior: ReplyBehavior) {
        self.inner.lock().await.reply = behavior;
    }

    pub async fn set_ready_delay(&self, delay: Duration) {
        self.inner.lock().await.ready_delay = delay;
    }

    pub async fn set_reply_delay(&self, delay: Duration) {
        self.inner.lock().await.reply_delay = delay;
    }

    pub async fn connect_calls(&self) -> u32 {
        self.inner.lock().await.connect_calls
    }

    pub async fn write_calls(&self) -> u32 {
        self.inner.lock().await.write_calls
    }

    pub async fn disconnect_calls(&self) -> u32 {
        self.inner.lock().await.disconnect_calls
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.connected
    }

    /// Requests decoded from successful writes, oldest first
    pub async fn received_requests(&self) -> Vec<ProvisioningRequest> {
        self.inner.lock().await.received.clone()
    }

    fn notify_after(handler: Option<NotifyHandler>, frame: Vec<u8>, delay: Duration) {
        let Some(handler) = handler else {
            warn!("No notify handler registered, dropping notification");
            return;
        };

        if delay.is_zero() {
            let _ = handler.send(frame);
            return;
        }

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The session may be gone by now.
            let _ = handler.send(frame);
        });
    }

    fn reply_for(behavior: ReplyBehavior, request_id: u16) -> Option<Vec<u8>> {
        let response = |request_id, status| {
            protocol::encode_response(&ProvisioningResponse { request_id, status })
        };

        match behavior {
            ReplyBehavior::Accept => Some(response(request_id, ResponseStatus::Ok)),
            ReplyBehavior::Reject(reason) => {
                Some(response(request_id, ResponseStatus::Rejected(reason)))
            }
            ReplyBehavior::ReportMalformed => Some(response(request_id, ResponseStatus::Malformed)),
            ReplyBehavior::WrongRequestId => {
                Some(response(request_id.wrapping_add(1), ResponseStatus::Ok))
            }
            ReplyBehavior::Garbage => Some(vec![protocol::frame::FRAME_VERSION, 0xde, 0xad]),
            ReplyBehavior::Silent => None,
        }
    }
}

impl Default for SimulatedPeripheral {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SimulatedPeripheral {
    async fn connect(&self, device: &DeviceHandle) -> TransportResult<()> {
        let behavior = {
            let mut state = self.inner.lock().await;
            state.connect_calls += 1;
            match state.connect {
                ConnectBehavior::HangFirst(n) if state.connect_calls <= n => ConnectBehavior::Hang,
                ConnectBehavior::HangFirst(_) => ConnectBehavior::Succeed,
                other => other,
            }
        };
        debug!(%device, ?behavior, "Simulated connect");

        match behavior {
            ConnectBehavior::Fail => {
                return Err(TransportError::ConnectFailed(
                    "simulated connect failure".to_string(),
                ));
            }
            ConnectBehavior::Hang => return std::future::pending().await,
            ConnectBehavior::Succeed | ConnectBehavior::HangFirst(_) => {}
        }

        let mut state = self.inner.lock().await;
        state.connected = true;
        if state.handshake == HandshakeBehavior::Ready {
            Self::notify_after(state.notify.clone(), protocol::encode_ready(), state.ready_delay);
        }
        Ok(())
    }

    async fn write(&self, bytes: &[u8]) -> TransportResult<()> {
        let (behavior, reply) = {
            let mut state = self.inner.lock().await;
            state.write_calls += 1;
            if !state.connected {
                return Err(TransportError::NotConnected);
            }

            let behavior = state.write;
            let reply = match behavior {
                WriteBehavior::Succeed => match protocol::decode_request(bytes) {
                    Ok(request) => {
                        debug!(?request, "Simulated peripheral received credentials");
                        let reply = Self::reply_for(state.reply, request.request_id());
                        state.received.push(request);
                        reply
                    }
                    Err(e) => {
                        warn!("Simulated peripheral got an invalid frame: {}", e);
                        Some(protocol::encode_response(&ProvisioningResponse {
                            request_id: 0,
                            status: ResponseStatus::Malformed,
                        }))
                    }
                },
                WriteBehavior::Fail | WriteBehavior::Hang => None,
            };
            if let Some(frame) = &reply {
                Self::notify_after(state.notify.clone(), frame.clone(), state.reply_delay);
            }
            (behavior, reply)
        };

        match behavior {
            WriteBehavior::Succeed => {
                debug!(replied = reply.is_some(), "Simulated write complete");
                Ok(())
            }
            WriteBehavior::Fail => Err(TransportError::WriteFailed(
                "simulated write failure".to_string(),
            )),
            WriteBehavior::Hang => std::future::pending().await,
        }
    }

    async fn set_notify_handler(&self, handler: NotifyHandler) {
        self.inner.lock().await.notify = Some(handler);
    }

    async fn disconnect(&self) -> TransportResult<()> {
        let mut state = self.inner.lock().await;
        state.disconnect_calls += 1;
        state.connected = false;
        Ok(())
    }
}
