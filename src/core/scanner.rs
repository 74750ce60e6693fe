//! Access point scanning service

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{
    backend::ScanBackend,
    core::{
        error::{ServiceError, ServiceResult},
        types::{AccessPoint, ScanState},
    },
};

#[derive(Debug)]
struct ScanStateMachine {
    state: ScanState,
    results: Option<Vec<AccessPoint>>,
    error: Option<String>,
}

impl ScanStateMachine {
    fn new() -> Self {
        Self {
            state: ScanState::Idle,
            results: None,
            error: None,
        }
    }

    fn start_scan(&mut self) -> ServiceResult<()> {
        if self.state == ScanState::Scanning {
            return Err(ServiceError::OperationInProgress);
        }
        self.state = ScanState::Scanning;
        self.results = None;
        self.error = None;
        Ok(())
    }

    fn complete_scan(&mut self, access_points: Vec<AccessPoint>) {
        self.state = ScanState::Finished;
        self.results = Some(selectable_networks(access_points));
        self.error = None;
    }

    fn fail_scan(&mut self, error: String) {
        self.state = ScanState::Error;
        self.error = Some(error);
        self.results = None;
    }
}

/// Reduce raw scan output to the networks a user can pick from
///
/// Hidden networks (blank SSID) are dropped, each SSID is listed once with
/// its strongest signal, strongest first.
pub fn selectable_networks(access_points: Vec<AccessPoint>) -> Vec<AccessPoint> {
    let mut strongest: HashMap<String, AccessPoint> = HashMap::new();
    for ap in access_points {
        if ap.ssid.trim().is_empty() {
            continue;
        }
        match strongest.get(&ap.ssid) {
            Some(known) if known.rssi >= ap.rssi => {}
            _ => {
                strongest.insert(ap.ssid.clone(), ap);
            }
        }
    }

    let mut networks: Vec<AccessPoint> = strongest.into_values().collect();
    networks.sort_by(|a, b| b.rssi.cmp(&a.rssi).then_with(|| a.ssid.cmp(&b.ssid)));
    networks
}

/// Runs scans against a backend, one at a time
pub struct ScanService<B: ScanBackend> {
    backend: Arc<B>,
    state_machine: Arc<RwLock<ScanStateMachine>>,
}

impl<B: ScanBackend> ScanService<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            state_machine: Arc::new(RwLock::new(ScanStateMachine::new())),
        }
    }

    /// Start a scan in the background
    ///
    /// Fails if a scan is already in progress. Poll [`Self::state`] and fetch
    /// [`Self::results`] once finished.
    pub async fn start_scan(&self) -> ServiceResult<()> {
        self.state_machine.write().await.start_scan()?;

        let backend = self.backend.clone();
        let state_machine = self.state_machine.clone();
        tokio::spawn(async move {
            let result = backend.scan().await;
            Self::record(&state_machine, result).await;
        });

        Ok(())
    }

    /// Scan and wait for the selectable networks
    pub async fn scan(&self) -> ServiceResult<Vec<AccessPoint>> {
        self.state_machine.write().await.start_scan()?;
        let result = self.backend.scan().await;
        Self::record(&self.state_machine, result).await;
        self.results().await
    }

    pub async fn state(&self) -> ScanState {
        self.state_machine.read().await.state
    }

    /// Selectable networks of the last finished scan
    pub async fn results(&self) -> ServiceResult<Vec<AccessPoint>> {
        let sm = self.state_machine.read().await;
        match (&sm.results, &sm.error) {
            (Some(results), _) => Ok(results.clone()),
            (None, Some(error)) => Err(ServiceError::ScanFailed(error.clone())),
            (None, None) => Err(ServiceError::NoScanResults),
        }
    }

    async fn record(
        state_machine: &RwLock<ScanStateMachine>,
        result: crate::core::error::ScanResult<Vec<AccessPoint>>,
    ) {
        match result {
            Ok(access_points) => {
                debug!(raw = access_points.len(), "Scan finished");
                state_machine.write().await.complete_scan(access_points);
            }
            Err(e) => {
                warn!("Scan failed: {}", e);
                state_machine.write().await.fail_scan(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockScanBackend;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn ap(ssid: &str, mac: &str, rssi: i16) -> AccessPoint {
        AccessPoint {
            ssid: ssid.into(),
            mac: mac.into(),
            channel: 6,
            rssi,
        }
    }

    #[test]
    fn test_selectable_networks_filters_dedupes_and_sorts() {
        let networks = selectable_networks(vec![
            ap("Office", "00:00:00:00:00:01", -70),
            ap("", "00:00:00:00:00:02", -30),
            ap("   ", "00:00:00:00:00:03", -31),
            ap("HomeNet", "00:00:00:00:00:04", -60),
            ap("Office", "00:00:00:00:00:05", -50),
        ]);

        assert_eq!(
            networks,
            vec![
                ap("Office", "00:00:00:00:00:05", -50),
                ap("HomeNet", "00:00:00:00:00:04", -60),
            ]
        );
    }

    #[test]
    fn test_scan_state_machine_transitions() {
        let mut sm = ScanStateMachine::new();
        assert_eq!(sm.state, ScanState::Idle);

        sm.start_scan().unwrap();
        assert_eq!(sm.state, ScanState::Scanning);
        assert!(matches!(
            sm.start_scan(),
            Err(ServiceError::OperationInProgress)
        ));

        sm.complete_scan(vec![ap("TestNetwork", "aa:bb:cc:dd:ee:ff", -65)]);
        assert_eq!(sm.state, ScanState::Finished);
        assert_eq!(sm.results.as_ref().map(Vec::len), Some(1));

        sm.start_scan().unwrap();
        sm.fail_scan("radio off".into());
        assert_eq!(sm.state, ScanState::Error);
        assert!(sm.results.is_none());
        assert_eq!(sm.error.as_deref(), Some("radio off"));
    }

    #[tokio::test]
    async fn test_scan_returns_selectable_networks() {
        let backend = Arc::new(MockScanBackend::new());
        backend
            .set_access_points(vec![
                ap("HomeNet", "aa:bb:cc:dd:ee:01", -65),
                ap("", "aa:bb:cc:dd:ee:02", -40),
            ])
            .await;
        let service = ScanService::new(backend.clone());

        let networks = service.scan().await.unwrap();

        assert_eq!(networks, vec![ap("HomeNet", "aa:bb:cc:dd:ee:01", -65)]);
        assert_eq!(service.state().await, ScanState::Finished);
        assert_eq!(backend.scan_calls().await, 1);
    }

    #[tokio::test]
    async fn test_scan_failure() {
        let backend = Arc::new(MockScanBackend::new());
        backend.set_failure(true).await;
        let service = ScanService::new(backend);

        assert!(matches!(
            service.scan().await,
            Err(ServiceError::ScanFailed(_))
        ));
        assert_eq!(service.state().await, ScanState::Error);
    }

    #[tokio::test]
    async fn test_no_results_before_scan() {
        let service = ScanService::new(Arc::new(MockScanBackend::new()));
        assert!(matches!(
            service.results().await,
            Err(ServiceError::NoScanResults)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_scan_guards_concurrent_scans() {
        let backend = Arc::new(MockScanBackend::new());
        backend.set_delay(Duration::from_secs(3)).await;
        backend
            .set_access_points(vec![ap("HomeNet", "aa:bb:cc:dd:ee:01", -65)])
            .await;
        let service = ScanService::new(backend.clone());

        service.start_scan().await.unwrap();
        assert_eq!(service.state().await, ScanState::Scanning);
        assert!(matches!(
            service.scan().await,
            Err(ServiceError::OperationInProgress)
        ));

        tokio::time::sleep(Duration::from_secs(4)).await;

        assert_eq!(service.state().await, ScanState::Finished);
        assert_eq!(service.results().await.unwrap().len(), 1);
        assert_eq!(backend.scan_calls().await, 1);
    }
}
