//! Domain types for WiFi provisioning

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::core::error::{CredentialError, FailureReason};

/// Maximum SSID length in bytes (IEEE 802.11)
pub const MAX_SSID_LEN: usize = 32;

/// WPA2 passphrase bounds in bytes
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 63;

/// Represents a discovered WiFi access point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessPoint {
    /// Network SSID
    pub ssid: String,
    /// MAC address (BSSID)
    pub mac: String,
    /// Channel number
    pub channel: u16,
    /// Signal strength in dBm
    pub rssi: i16,
}

/// WiFi scan state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Scanning,
    Finished,
    Error,
}

/// Validated WiFi credential
///
/// An empty password denotes an open network.
#[derive(Clone, PartialEq, Eq)]
pub struct NetworkCredential {
    ssid: String,
    password: String,
}

impl NetworkCredential {
    /// Validate and build a credential
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Result<Self, CredentialError> {
        let ssid = ssid.into();
        let password = password.into();

        if ssid.is_empty() {
            return Err(CredentialError::EmptySsid);
        }
        if ssid.len() > MAX_SSID_LEN {
            return Err(CredentialError::SsidTooLong(ssid.len()));
        }
        if !password.is_empty()
            && !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password.len())
        {
            return Err(CredentialError::InvalidPasswordLength(password.len()));
        }

        Ok(Self { ssid, password })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// True if this credential targets an open network
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

// Keep the passphrase out of logs.
impl fmt::Debug for NetworkCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkCredential")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Status carried in a provisioning response frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    Rejected(u8),
    Malformed,
}

/// Response produced by the peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisioningResponse {
    pub request_id: u16,
    pub status: ResponseStatus,
}

/// Provisioning session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "failure", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    Handshaking,
    Sending,
    AwaitingAck,
    Completed,
    Failed(FailureReason),
}

impl SessionState {
    /// Completed and Failed admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed(_))
    }
}

/// Bookkeeping for one in-flight provisioning attempt
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub state: SessionState,
    /// 1-based attempt number within a provisioning call
    pub attempt: u32,
    /// Deadline of the timer guarding the current state
    pub deadline: Option<Instant>,
    pub last_error: Option<String>,
}

/// Final result reported to the caller of `provision`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "failure", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure(FailureReason),
}

/// Progress notification delivered to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    StateChanged { attempt: u32, state: SessionState },
    RetryScheduled {
        attempt: u32,
        #[serde(rename = "delay_ms", serialize_with = "serialize_millis")]
        delay: Duration,
    },
}

fn serialize_millis<S: serde::Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
}

/// Address of the peripheral to provision (a BLE address for real radios)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle(String);

impl DeviceHandle {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for one provisioning call, used to correlate log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_credential_bounds() {
        assert!(NetworkCredential::new("HomeNet", "hunter22").is_ok());
        assert!(NetworkCredential::new("a".repeat(32), "p".repeat(63)).is_ok());

        assert_eq!(
            NetworkCredential::new("", "hunter22"),
            Err(CredentialError::EmptySsid)
        );
        assert_eq!(
            NetworkCredential::new("a".repeat(33), ""),
            Err(CredentialError::SsidTooLong(33))
        );
        assert_eq!(
            NetworkCredential::new("HomeNet", "hunter2"),
            Err(CredentialError::InvalidPasswordLength(7))
        );
        assert_eq!(
            NetworkCredential::new("HomeNet", "p".repeat(64)),
            Err(CredentialError::InvalidPasswordLength(64))
        );
    }

    #[test]
    fn test_open_network_credential() {
        let credential = NetworkCredential::new("CoffeeShop", "").unwrap();
        assert!(credential.is_open());
    }

    #[test]
    fn test_ssid_bounds_count_bytes_not_chars() {
        // two bytes per char
        assert!(NetworkCredential::new("ü".repeat(16), "").is_ok());
        assert_eq!(
            NetworkCredential::new("ü".repeat(17), ""),
            Err(CredentialError::SsidTooLong(34))
        );
    }

    #[test]
    fn test_credential_debug_redacts_password() {
        let credential = NetworkCredential::new("HomeNet", "supersecret").unwrap();
        let debug = format!("{credential:?}");
        assert!(debug.contains("HomeNet"));
        assert!(!debug.contains("supersecret"));
    }

    #[test]
    fn test_session_state_terminal() {
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::AwaitingAck.is_terminal());
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Failed(FailureReason::Cancelled).is_terminal());
    }

    #[test]
    fn test_progress_event_serialization() {
        let event = ProgressEvent::StateChanged {
            attempt: 1,
            state: SessionState::Connecting,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"event":"state_changed","attempt":1,"state":{"state":"connecting"}}"#
        );

        let event = ProgressEvent::RetryScheduled {
            attempt: 2,
            delay: Duration::from_secs(1),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"event":"retry_scheduled","attempt":2,"delay_ms":1000}"#
        );
    }

    #[test]
    fn test_outcome_serialization() {
        assert_eq!(
            serde_json::to_string(&Outcome::Success).unwrap(),
            r#"{"outcome":"success"}"#
        );
        assert_eq!(
            serde_json::to_string(&Outcome::Failure(FailureReason::Busy)).unwrap(),
            r#"{"outcome":"failure","failure":{"reason":"busy"}}"#
        );
    }
}
