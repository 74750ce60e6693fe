//! wpa_supplicant scan backend over wifi-ctrl

use tracing::{debug, error};
use wifi_ctrl::sta::{RequestClient, WifiSetup};

use crate::{
    backend::ScanBackend,
    core::{
        error::{ScanError, ScanResult},
        types::AccessPoint,
    },
};

const WPA_SUPPLICANT_RUN_DIR: &str = "/var/run/wpa_supplicant";

pub struct WifiCtrlBackend {
    interface: String,
    client: RequestClient,
}

impl WifiCtrlBackend {
    /// Attach to the wpa_supplicant control socket of `interface`
    pub async fn new(interface: String) -> ScanResult<Self> {
        let mut setup =
            WifiSetup::new().map_err(|e| ScanError::BackendUnavailable(e.to_string()))?;
        setup.set_socket_path(format!("{WPA_SUPPLICANT_RUN_DIR}/{interface}"));

        let client = setup.get_request_client();
        let station = setup.complete();

        tokio::spawn(async move {
            if let Err(e) = station.run().await {
                error!("wpa_supplicant station runtime error: {}", e);
            }
        });

        Ok(Self { interface, client })
    }

    /// Channel number for a center frequency in MHz, 0 if unknown
    fn frequency_to_channel(freq: &str) -> u16 {
        let Ok(freq) = freq.trim().parse::<u16>() else {
            return 0;
        };
        match freq {
            2484 => 14,
            2412..=2472 => (freq - 2407) / 5,
            5160..=5885 => (freq - 5000) / 5,
            5955..=7115 => (freq - 5950) / 5,
            _ => 0,
        }
    }
}

impl ScanBackend for WifiCtrlBackend {
    async fn scan(&self) -> ScanResult<Vec<AccessPoint>> {
        debug!(interface = %self.interface, "Starting WiFi scan");

        let results = self
            .client
            .get_scan()
            .await
            .map_err(|e| ScanError::WpaSupplicantError(format!("Scan failed: {}", e)))?;

        let access_points: Vec<AccessPoint> = results
            .iter()
            .map(|res| AccessPoint {
                ssid: res.name.clone(),
                mac: res.mac.clone(),
                channel: Self::frequency_to_channel(&res.frequency),
                rssi: i16::try_from(res.signal).unwrap_or(i16::MIN),
            })
            .collect();

        debug!(count = access_points.len(), "Scan complete");
        Ok(access_points)
    }
}
