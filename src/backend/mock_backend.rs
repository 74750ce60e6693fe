//! Mock scan backend for tests

use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;

use crate::{
    backend::ScanBackend,
    core::{
        error::{ScanError, ScanResult},
        types::AccessPoint,
    },
};

#[derive(Debug, Clone, Default)]
struct MockState {
    access_points: Vec<AccessPoint>,
    should_fail: bool,
    delay: Duration,
    scan_calls: u32,
}

/// Scripted [`ScanBackend`]
#[derive(Debug, Clone, Default)]
pub struct MockScanBackend {
    inner: Arc<Mutex<MockState>>,
}

impl MockScanBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Access points returned by the next scans
    pub async fn set_access_points(&self, access_points: Vec<AccessPoint>) {
        self.inner.lock().await.access_points = access_points;
    }

    pub async fn set_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail = should_fail;
    }

    /// How long a scan takes
    pub async fn set_delay(&self, delay: Duration) {
        self.inner.lock().await.delay = delay;
    }

    pub async fn scan_calls(&self) -> u32 {
        self.inner.lock().await.scan_calls
    }
}

impl ScanBackend for MockScanBackend {
    async fn scan(&self) -> ScanResult<Vec<AccessPoint>> {
        let (delay, result) = {
            let mut state = self.inner.lock().await;
            state.scan_calls += 1;
            let result = if state.should_fail {
                Err(ScanError::ScanFailed("Mock scan failure".into()))
            } else {
                Ok(state.access_points.clone())
            };
            (state.delay, result)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }
}
