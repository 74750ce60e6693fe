//! Scan backend trait definition

use trait_variant::make;

use crate::core::{error::ScanResult, types::AccessPoint};

/// Source of nearby access points (typically wpa_supplicant)
///
/// Lets the scan service run against a mock in tests.
#[make(Send)]
pub trait ScanBackend: Send + Sync + 'static {
    /// Trigger a scan and return what was discovered
    ///
    /// May take several seconds on real hardware.
    async fn scan(&self) -> ScanResult<Vec<AccessPoint>>;
}
