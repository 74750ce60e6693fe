//! Provisioning request message

use std::fmt;

use crate::{core::types::NetworkCredential, protocol::frame};

/// One provisioning request, built per attempt
///
/// The encoded frame is computed once at construction; the request is
/// immutable afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ProvisioningRequest {
    credential: NetworkCredential,
    request_id: u16,
    checksum: u16,
    frame: Vec<u8>,
}

impl ProvisioningRequest {
    pub fn new(credential: NetworkCredential, request_id: u16) -> Self {
        let frame = frame::encode(&credential, request_id);
        let tail = &frame[frame.len() - 2..];
        let checksum = u16::from_be_bytes([tail[0], tail[1]]);

        Self {
            credential,
            request_id,
            checksum,
            frame,
        }
    }

    pub fn credential(&self) -> &NetworkCredential {
        &self.credential
    }

    pub fn request_id(&self) -> u16 {
        self.request_id
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Wire representation
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }
}

// The frame embeds the passphrase; only show metadata.
impl fmt::Debug for ProvisioningRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningRequest")
            .field("credential", &self.credential)
            .field("request_id", &self.request_id)
            .field("checksum", &format_args!("{:#06x}", self.checksum))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_frame_checksum() {
        let credential = NetworkCredential::new("HomeNet", "hunter22").unwrap();
        let request = ProvisioningRequest::new(credential, 42);

        let frame = request.frame();
        let body = &frame[..frame.len() - 2];
        assert_eq!(request.checksum(), frame::checksum(body));
        assert_eq!(request.request_id(), 42);
        assert_eq!(request.credential().ssid(), "HomeNet");
    }

    #[test]
    fn test_request_debug_hides_frame() {
        let credential = NetworkCredential::new("HomeNet", "hunter22").unwrap();
        let request = ProvisioningRequest::new(credential, 1);
        assert!(!format!("{request:?}").contains("hunter22"));
    }
}
