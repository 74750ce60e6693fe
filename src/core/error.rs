//! Error types for the WiFi provisioner

use serde::Serialize;
use thiserror::Error;

/// Result type for scan backend operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for frame decoding
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors related to WiFi scan backend operations
#[derive(Error, Debug, Clone)]
pub enum ScanError {
    #[error("WiFi scan failed: {0}")]
    ScanFailed(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("wpa_supplicant error: {0}")]
    WpaSupplicantError(String),
}

/// Errors related to core service operations
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Operation already in progress")]
    OperationInProgress,

    #[error("No scan results available")]
    NoScanResults,

    #[error("Scan failed: {0}")]
    ScanFailed(String),
}

/// Credential validation failures, raised before any transport use
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("SSID must not be empty")]
    EmptySsid,

    #[error("SSID too long: {0} bytes, at most 32 allowed")]
    SsidTooLong(usize),

    #[error("Invalid password length: {0} bytes, expected 0 or 8 to 63")]
    InvalidPasswordLength(usize),

    #[error("Credential is not valid UTF-8")]
    InvalidUtf8,
}

/// Frame decoding failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Frame truncated: need {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Checksum mismatch: frame carries {received:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { received: u16, computed: u16 },

    #[error("Unsupported frame version {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("Unknown response status {0:#04x}")]
    UnknownStatus(u8),

    #[error("{0} unexpected bytes after end of frame")]
    TrailingBytes(usize),

    #[error("Invalid credential in frame: {0}")]
    InvalidCredential(#[from] CredentialError),
}

/// Errors surfaced by a transport adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Provisioning service not found on peripheral")]
    ServiceNotFound,

    #[error("BLE error: {0}")]
    Ble(String),
}

/// Reason a provisioning call failed
///
/// This is the only failure information that leaves the coordinator; raw
/// transport errors are folded into one of these.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "code", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Connect timed out")]
    ConnectTimeout,

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Write to peripheral failed")]
    WriteError,

    #[error("Acknowledgment timed out")]
    AckTimeout,

    #[error("Rejected by peripheral (reason code {0})")]
    Rejected(u8),

    #[error("Malformed exchange")]
    Malformed,

    #[error("Cancelled")]
    Cancelled,

    #[error("Another provisioning session is active")]
    Busy,
}

impl FailureReason {
    /// Whether the coordinator may start another attempt after this failure
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureReason::ConnectTimeout | FailureReason::HandshakeTimeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_link_timeouts_are_retryable() {
        assert!(FailureReason::ConnectTimeout.is_retryable());
        assert!(FailureReason::HandshakeTimeout.is_retryable());

        for reason in [
            FailureReason::InvalidCredential,
            FailureReason::WriteError,
            FailureReason::AckTimeout,
            FailureReason::Rejected(3),
            FailureReason::Malformed,
            FailureReason::Cancelled,
            FailureReason::Busy,
        ] {
            assert!(!reason.is_retryable(), "{reason:?} must not be retried");
        }
    }

    #[test]
    fn test_failure_reason_serialization() {
        let json = serde_json::to_string(&FailureReason::Rejected(7)).unwrap();
        assert_eq!(json, r#"{"reason":"rejected","code":7}"#);

        let json = serde_json::to_string(&FailureReason::Cancelled).unwrap();
        assert_eq!(json, r#"{"reason":"cancelled"}"#);
    }
}
