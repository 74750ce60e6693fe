//! Access point scanning backends

pub mod mock_backend;
pub mod scan_backend;
pub mod wifi_ctrl_backend;

pub use mock_backend::MockScanBackend;
pub use scan_backend::ScanBackend;
pub use wifi_ctrl_backend::WifiCtrlBackend;
