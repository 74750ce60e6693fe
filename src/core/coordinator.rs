//! Provisioning session coordinator
//!
//! Entry point for callers: validates credentials, guarantees a single active
//! session, retries link-level timeouts and fans progress out to observers.

use std::sync::{
    Arc, Mutex as SyncMutex, PoisonError,
    atomic::{AtomicU16, Ordering},
};
use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    config::ProvisioningSettings,
    core::{
        clock::{Clock, TokioClock},
        error::FailureReason,
        progress::{ObserverRegistry, ProgressObserver},
        session::{self, ProvisioningSession},
        types::{DeviceHandle, NetworkCredential, Outcome, ProgressEvent, SessionId, SessionState},
    },
    protocol::ProvisioningRequest,
    transport::Transport,
};

type CancelSlot = SyncMutex<Option<watch::Sender<bool>>>;

/// Ownership of the transport for one provisioning call
///
/// Dropping it before [`ActiveSession::finish`] means the caller abandoned the
/// call mid-flight: the link is torn down in the background and the
/// coordinator becomes idle again.
struct ActiveSession<'a, T: Transport> {
    transport: Option<OwnedMutexGuard<T>>,
    cancel: &'a CancelSlot,
}

impl<'a, T: Transport> ActiveSession<'a, T> {
    fn new(transport: OwnedMutexGuard<T>, cancel: &'a CancelSlot, sender: watch::Sender<bool>) -> Self {
        *cancel.lock().unwrap_or_else(PoisonError::into_inner) = Some(sender);
        Self {
            transport: Some(transport),
            cancel,
        }
    }

    fn transport(&self) -> Option<&T> {
        self.transport.as_deref()
    }

    /// Release the transport after the call reached an outcome
    fn finish(mut self) {
        self.transport.take();
    }
}

impl<T: Transport> Drop for ActiveSession<'_, T> {
    fn drop(&mut self) {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(transport) = self.transport.take() else {
            return;
        };
        warn!("Provisioning call dropped before completion, disconnecting");
        match tokio::runtime::Handle::try_current() {
            // The guard moves into the task, so the transport stays exclusive
            // until the disconnect is done.
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = transport.disconnect().await {
                        warn!("Disconnect after dropped call failed: {}", e);
                    }
                });
            }
            Err(_) => warn!("No runtime left, link to peripheral not torn down"),
        }
    }
}

/// Coordinates provisioning sessions against one peripheral
pub struct SessionCoordinator<T: Transport, C: Clock = TokioClock> {
    /// Held by the active session, which owns the transport exclusively
    transport: Arc<Mutex<T>>,
    clock: C,
    device: DeviceHandle,
    settings: ProvisioningSettings,
    next_request_id: AtomicU16,
    cancel: CancelSlot,
    observers: ObserverRegistry,
}

impl<T: Transport> SessionCoordinator<T> {
    /// Create a coordinator driven by the tokio clock
    pub fn new(transport: T, device: DeviceHandle, settings: ProvisioningSettings) -> Self {
        Self::with_clock(transport, device, settings, TokioClock)
    }
}

impl<T: Transport, C: Clock> SessionCoordinator<T, C> {
    pub fn with_clock(
        transport: T,
        device: DeviceHandle,
        settings: ProvisioningSettings,
        clock: C,
    ) -> Self {
        Self {
            transport: Arc::new(Mutex::new(transport)),
            clock,
            device,
            settings,
            next_request_id: AtomicU16::new(1),
            cancel: SyncMutex::new(None),
            observers: ObserverRegistry::new(),
        }
    }

    /// Register a progress observer
    pub async fn subscribe(&self, observer: Arc<dyn ProgressObserver>) {
        self.observers.subscribe(observer).await;
    }

    /// True while a provisioning call is in flight
    pub fn is_active(&self) -> bool {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Validate `ssid`/`password` and provision them
    pub async fn provision(&self, ssid: &str, password: &str) -> Outcome {
        match NetworkCredential::new(ssid, password) {
            Ok(credential) => self.provision_credential(credential).await,
            Err(e) => {
                warn!(ssid, "Rejecting credential: {}", e);
                Outcome::Failure(FailureReason::InvalidCredential)
            }
        }
    }

    /// Provision an already validated credential
    ///
    /// Fails with `Busy` right away if another call is in flight. Dropping
    /// the returned future disconnects the peripheral and frees the session.
    pub async fn provision_credential(&self, credential: NetworkCredential) -> Outcome {
        let Ok(transport) = self.transport.clone().try_lock_owned() else {
            warn!("Provisioning already in progress");
            return Outcome::Failure(FailureReason::Busy);
        };

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let active = ActiveSession::new(transport, &self.cancel, cancel_tx);
        let Some(transport) = active.transport() else {
            return Outcome::Failure(FailureReason::Busy);
        };

        let session_id = SessionId::new();
        let span = info_span!("provision", %session_id, device = %self.device);
        let outcome = self
            .run_attempts(transport, &credential, &mut cancel_rx)
            .instrument(span)
            .await;

        active.finish();
        outcome
    }

    /// Abort the active provisioning call, if any
    ///
    /// Safe at any time: a no-op when idle, and aborts a pending retry
    /// backoff as well as an in-flight attempt.
    pub fn cancel(&self) {
        match self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(cancel) => {
                info!("Cancelling provisioning");
                // The call may have finished concurrently; nothing to do then.
                let _ = cancel.send(true);
            }
            None => debug!("Cancel requested while idle"),
        }
    }

    async fn run_attempts(
        &self,
        transport: &T,
        credential: &NetworkCredential,
        cancel: &mut watch::Receiver<bool>,
    ) -> Outcome {
        let max_attempts = self.settings.max_retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
            let request = ProvisioningRequest::new(credential.clone(), request_id);
            info!(
                attempt,
                max_attempts,
                request_id,
                ssid = credential.ssid(),
                "Starting provisioning attempt"
            );

            let mut session = ProvisioningSession::new(request, attempt, self.settings.timeouts);
            let result = session::drive(
                &mut session,
                transport,
                &self.clock,
                &self.device,
                cancel,
                &self.observers,
            )
            .await;

            let reason = match result {
                Ok(()) => {
                    info!(attempt, "Provisioning succeeded");
                    return Outcome::Success;
                }
                Err(reason) => reason,
            };

            if !reason.is_retryable() || attempt >= max_attempts {
                warn!(
                    attempt,
                    ?reason,
                    last_error = session.context().last_error.as_deref(),
                    "Provisioning failed"
                );
                return Outcome::Failure(reason);
            }

            let delay = self.settings.retry_delay * attempt;
            info!(attempt, ?reason, ?delay, "Retrying after backoff");
            self.observers
                .notify(ProgressEvent::RetryScheduled {
                    attempt: attempt + 1,
                    delay,
                })
                .await;

            let deadline = self.clock.now() + delay;
            tokio::select! {
                biased;
                _ = session::cancelled(cancel) => {
                    info!(attempt, "Cancelled during retry backoff");
                    self.observers
                        .notify(ProgressEvent::StateChanged {
                            attempt,
                            state: SessionState::Failed(FailureReason::Cancelled),
                        })
                        .await;
                    return Outcome::Failure(FailureReason::Cancelled);
                }
                _ = self.clock.sleep_until(deadline) => {}
            }
        }
    }
}
