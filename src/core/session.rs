//! Provisioning session state machine
//!
//! [`ProvisioningSession`] is a pure transition function: it consumes
//! [`SessionEvent`]s and answers with [`SessionAction`]s, never touching the
//! transport or the clock itself. [`drive`] executes those actions against a
//! [`Transport`] and feeds the results back until the session is terminal.

use std::collections::VecDeque;

use futures::future::BoxFuture;
use tokio::{
    sync::{mpsc, watch},
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    config::Timeouts,
    core::{
        clock::Clock,
        error::{FailureReason, TransportResult},
        progress::ObserverRegistry,
        types::{DeviceHandle, ProgressEvent, ResponseStatus, SessionContext, SessionState},
    },
    protocol::{self, ProvisioningRequest},
    transport::Transport,
};

/// Inputs that advance a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ConnectResult(TransportResult<()>),
    WriteResult(TransportResult<()>),
    Notification(Vec<u8>),
    TimerFired { generation: u64 },
    Cancel,
}

/// Side effects requested by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// The session entered a new state
    Report(SessionState),
    /// Replace the pending timer; it fires `TimerFired { generation }`
    ArmTimer { generation: u64, deadline: Instant },
    Connect,
    Write(Vec<u8>),
    Disconnect,
}

/// One provisioning attempt
#[derive(Debug)]
pub struct ProvisioningSession {
    request: ProvisioningRequest,
    timeouts: Timeouts,
    context: SessionContext,
    /// Bumped on every state entry so timers armed for older states are stale
    generation: u64,
    /// Ready signal seen before the link was reported up
    peripheral_ready: bool,
    /// Response seen before the write was reported complete
    early_response: Option<Vec<u8>>,
    disconnected: bool,
}

impl ProvisioningSession {
    pub fn new(request: ProvisioningRequest, attempt: u32, timeouts: Timeouts) -> Self {
        Self {
            request,
            timeouts,
            context: SessionContext {
                state: SessionState::Idle,
                attempt,
                deadline: None,
                last_error: None,
            },
            generation: 0,
            peripheral_ready: false,
            early_response: None,
            disconnected: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.context.state
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn request(&self) -> &ProvisioningRequest {
        &self.request
    }

    pub fn is_terminal(&self) -> bool {
        self.context.state.is_terminal()
    }

    /// `Idle -> Connecting`
    pub fn start(&mut self, now: Instant) -> Vec<SessionAction> {
        if self.context.state != SessionState::Idle {
            warn!(state = ?self.context.state, "Session already started");
            return Vec::new();
        }

        let mut actions = self.enter(SessionState::Connecting, now);
        actions.push(SessionAction::Connect);
        actions
    }

    /// Abort from any non-terminal state
    pub fn cancel(&mut self) -> Vec<SessionAction> {
        if self.is_terminal() {
            return Vec::new();
        }
        self.fail(FailureReason::Cancelled)
    }

    /// Advance on one event
    pub fn handle(&mut self, event: SessionEvent, now: Instant) -> Vec<SessionAction> {
        use SessionEvent as E;
        use SessionState as S;

        if self.is_terminal() {
            debug!(?event, "Ignoring event in terminal state");
            return Vec::new();
        }

        match (self.context.state, event) {
            (_, E::Cancel) => self.cancel(),

            (state, E::TimerFired { generation }) if generation != self.generation => {
                debug!(?state, generation, current = self.generation, "Stale timer");
                Vec::new()
            }
            (S::Connecting, E::TimerFired { .. }) => self.fail(FailureReason::ConnectTimeout),
            (S::Handshaking, E::TimerFired { .. }) => self.fail(FailureReason::HandshakeTimeout),
            (S::Sending, E::TimerFired { .. }) => {
                self.context.last_error = Some("write timed out".to_string());
                self.fail(FailureReason::WriteError)
            }
            (S::AwaitingAck, E::TimerFired { .. }) => self.fail(FailureReason::AckTimeout),

            (S::Connecting, E::ConnectResult(Ok(()))) => {
                let mut actions = self.enter(S::Handshaking, now);
                if self.peripheral_ready {
                    actions.extend(self.begin_sending(now));
                }
                actions
            }
            (S::Connecting, E::ConnectResult(Err(e))) => {
                self.context.last_error = Some(e.to_string());
                self.fail(FailureReason::ConnectTimeout)
            }
            (S::Connecting, E::Notification(bytes)) if protocol::is_ready_signal(&bytes) => {
                self.peripheral_ready = true;
                Vec::new()
            }

            (S::Handshaking, E::Notification(bytes)) if protocol::is_ready_signal(&bytes) => {
                self.peripheral_ready = true;
                self.begin_sending(now)
            }

            (S::Sending, E::WriteResult(Ok(()))) => {
                let mut actions = self.enter(S::AwaitingAck, now);
                if let Some(bytes) = self.early_response.take() {
                    actions.extend(self.evaluate_response(&bytes));
                }
                actions
            }
            (S::Sending, E::WriteResult(Err(e))) => {
                self.context.last_error = Some(e.to_string());
                self.fail(FailureReason::WriteError)
            }
            (S::Sending, E::Notification(bytes)) if !protocol::is_ready_signal(&bytes) => {
                self.early_response = Some(bytes);
                Vec::new()
            }

            (S::AwaitingAck, E::Notification(bytes)) if !protocol::is_ready_signal(&bytes) => {
                self.evaluate_response(&bytes)
            }

            (state, event) => {
                debug!(?state, ?event, "Ignoring event");
                Vec::new()
            }
        }
    }

    fn begin_sending(&mut self, now: Instant) -> Vec<SessionAction> {
        let mut actions = self.enter(SessionState::Sending, now);
        debug!(
            request_id = self.request.request_id(),
            len = self.request.frame().len(),
            "Writing credential frame"
        );
        actions.push(SessionAction::Write(self.request.frame().to_vec()));
        actions
    }

    fn evaluate_response(&mut self, bytes: &[u8]) -> Vec<SessionAction> {
        debug!(frame = %hex::encode(bytes), "Response received");

        let response = match protocol::decode(bytes) {
            Ok(response) => response,
            Err(e) => {
                self.context.last_error = Some(e.to_string());
                return self.fail(FailureReason::Malformed);
            }
        };

        if response.request_id != self.request.request_id() {
            self.context.last_error = Some(format!(
                "response for request {} while awaiting {}",
                response.request_id,
                self.request.request_id()
            ));
            return self.fail(FailureReason::Malformed);
        }

        match response.status {
            ResponseStatus::Ok => self.complete(),
            ResponseStatus::Rejected(reason) => self.fail(FailureReason::Rejected(reason)),
            ResponseStatus::Malformed => {
                self.context.last_error = Some("peripheral reported a malformed frame".to_string());
                self.fail(FailureReason::Malformed)
            }
        }
    }

    fn timeout_for(&self, state: SessionState) -> Option<std::time::Duration> {
        match state {
            SessionState::Connecting => Some(self.timeouts.connect),
            SessionState::Handshaking => Some(self.timeouts.handshake),
            SessionState::Sending => Some(self.timeouts.write),
            SessionState::AwaitingAck => Some(self.timeouts.ack),
            _ => None,
        }
    }

    fn enter(&mut self, state: SessionState, now: Instant) -> Vec<SessionAction> {
        self.generation += 1;
        self.context.state = state;

        let mut actions = vec![SessionAction::Report(state)];
        match self.timeout_for(state) {
            Some(timeout) => {
                let deadline = now + timeout;
                self.context.deadline = Some(deadline);
                actions.push(SessionAction::ArmTimer {
                    generation: self.generation,
                    deadline,
                });
            }
            None => self.context.deadline = None,
        }
        actions
    }

    fn complete(&mut self) -> Vec<SessionAction> {
        self.terminate(SessionState::Completed)
    }

    fn fail(&mut self, reason: FailureReason) -> Vec<SessionAction> {
        if let Some(error) = &self.context.last_error {
            debug!(?reason, %error, "Session failed");
        }
        self.terminate(SessionState::Failed(reason))
    }

    fn terminate(&mut self, state: SessionState) -> Vec<SessionAction> {
        self.generation += 1;
        self.context.state = state;
        self.context.deadline = None;

        let mut actions = vec![SessionAction::Report(state)];
        if !self.disconnected {
            self.disconnected = true;
            actions.push(SessionAction::Disconnect);
        }
        actions
    }
}

/// Run `session` against `transport` until it reaches a terminal state
///
/// Returns `Ok(())` on `Completed`. Cancellation is observed through
/// `cancel` flipping to `true`.
pub async fn drive<T, C>(
    session: &mut ProvisioningSession,
    transport: &T,
    clock: &C,
    device: &DeviceHandle,
    cancel: &mut watch::Receiver<bool>,
    observers: &ObserverRegistry,
) -> Result<(), FailureReason>
where
    T: Transport,
    C: Clock,
{
    let attempt = session.context().attempt;
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
    transport.set_notify_handler(notify_tx).await;

    let mut pending: Option<BoxFuture<'_, SessionEvent>> = None;
    let mut timer: Option<(u64, Instant)> = None;
    let mut actions: VecDeque<SessionAction> = session.start(clock.now()).into();

    loop {
        while let Some(action) = actions.pop_front() {
            match action {
                SessionAction::Report(state) => {
                    debug!(attempt, ?state, "Session state changed");
                    observers
                        .notify(ProgressEvent::StateChanged { attempt, state })
                        .await;
                }
                SessionAction::ArmTimer {
                    generation,
                    deadline,
                } => timer = Some((generation, deadline)),
                SessionAction::Connect => {
                    info!(%device, attempt, "Connecting to peripheral");
                    pending = Some(Box::pin(async move {
                        SessionEvent::ConnectResult(transport.connect(device).await)
                    }));
                }
                SessionAction::Write(frame) => {
                    pending = Some(Box::pin(async move {
                        SessionEvent::WriteResult(transport.write(&frame).await)
                    }));
                }
                SessionAction::Disconnect => {
                    pending = None;
                    timer = None;
                    if let Err(e) = transport.disconnect().await {
                        warn!("Disconnect failed: {}", e);
                    }
                }
            }
        }

        match session.state() {
            SessionState::Completed => return Ok(()),
            SessionState::Failed(reason) => return Err(reason),
            _ => {}
        }

        let event = tokio::select! {
            biased;
            _ = cancelled(cancel) => SessionEvent::Cancel,
            event = next_completion(&mut pending) => event,
            Some(bytes) = notify_rx.recv() => SessionEvent::Notification(bytes),
            generation = next_timer(clock, timer) => SessionEvent::TimerFired { generation },
        };
        actions.extend(session.handle(event, clock.now()));
    }
}

/// Resolve once cancellation has been requested; never if the sender is gone
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let observed = cancel.wait_for(|cancelled| *cancelled).await.map(|_| ());
    if observed.is_err() {
        std::future::pending::<()>().await
    }
}

async fn next_completion(pending: &mut Option<BoxFuture<'_, SessionEvent>>) -> SessionEvent {
    match pending {
        Some(operation) => {
            let event = operation.await;
            *pending = None;
            event
        }
        None => std::future::pending().await,
    }
}

async fn next_timer<C: Clock>(clock: &C, timer: Option<(u64, Instant)>) -> u64 {
    match timer {
        Some((generation, deadline)) => {
            clock.sleep_until(deadline).await;
            generation
        }
        None => std::future::pending().await,
    }
}
