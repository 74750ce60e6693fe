//! Runtime settings

use std::time::Duration;

use crate::config::cli::ProvisionArgs;

/// Per-state timeouts of a provisioning session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub handshake: Duration,
    pub write: Duration,
    pub ack: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            handshake: Duration::from_secs(3),
            write: Duration::from_secs(5),
            ack: Duration::from_secs(5),
        }
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisioningSettings {
    pub timeouts: Timeouts,
    /// Retries after a connect or handshake timeout
    pub max_retries: u32,
    /// Backoff before attempt n+1 is `retry_delay * n`
    pub retry_delay: Duration,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl From<&ProvisionArgs> for ProvisioningSettings {
    fn from(args: &ProvisionArgs) -> Self {
        ProvisioningSettings {
            timeouts: Timeouts {
                connect: Duration::from_millis(args.connect_timeout_ms),
                handshake: Duration::from_millis(args.handshake_timeout_ms),
                write: Duration::from_millis(args.write_timeout_ms),
                ack: Duration::from_millis(args.ack_timeout_ms),
            },
            max_retries: args.max_retries,
            retry_delay: Duration::from_millis(args.retry_delay_ms),
        }
    }
}
