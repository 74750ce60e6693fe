//! Binary frame codec
//!
//! Request (central to peripheral):
//! `version | request_id (BE u16) | ssid_len | ssid | password_len | password | checksum (BE u16)`
//!
//! Response (peripheral to central):
//! `version | request_id (BE u16) | status | reason | checksum (BE u16)`
//!
//! Ready signal (peripheral to central, ends the handshake): `version | 0x52`
//!
//! The checksum is the sum of all preceding bytes modulo 2^16.

use crate::{
    core::{
        error::{CredentialError, DecodeError, DecodeResult},
        types::{NetworkCredential, ProvisioningResponse, ResponseStatus},
    },
    protocol::request::ProvisioningRequest,
};

/// The only frame version this codec speaks
pub const FRAME_VERSION: u8 = 0x01;

/// Second byte of the ready signal
pub const READY_SIGNAL: u8 = 0x52;

/// Response frames have a fixed size
pub const RESPONSE_FRAME_LEN: usize = 7;

const CHECKSUM_LEN: usize = 2;

const STATUS_OK: u8 = 0x00;
const STATUS_REJECTED: u8 = 0x01;
const STATUS_MALFORMED: u8 = 0x02;

/// Sum of all bytes modulo 2^16
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, byte| sum.wrapping_add(u16::from(*byte)))
}

/// Encode a provisioning request frame
///
/// Never fails: `NetworkCredential` guarantees both lengths fit in one byte.
pub fn encode(credential: &NetworkCredential, request_id: u16) -> Vec<u8> {
    let ssid = credential.ssid().as_bytes();
    let password = credential.password().as_bytes();

    let mut frame = Vec::with_capacity(6 + ssid.len() + password.len() + CHECKSUM_LEN);
    frame.push(FRAME_VERSION);
    frame.extend_from_slice(&request_id.to_be_bytes());
    frame.push(ssid.len() as u8);
    frame.extend_from_slice(ssid);
    frame.push(password.len() as u8);
    frame.extend_from_slice(password);
    seal(frame)
}

/// Decode a provisioning response frame
pub fn decode(bytes: &[u8]) -> DecodeResult<ProvisioningResponse> {
    if bytes.len() < RESPONSE_FRAME_LEN {
        return Err(DecodeError::Truncated {
            needed: RESPONSE_FRAME_LEN,
            available: bytes.len(),
        });
    }
    check_version(bytes[0])?;
    if bytes.len() > RESPONSE_FRAME_LEN {
        return Err(DecodeError::TrailingBytes(bytes.len() - RESPONSE_FRAME_LEN));
    }
    verify_checksum(bytes)?;

    let request_id = u16::from_be_bytes([bytes[1], bytes[2]]);
    let status = match bytes[3] {
        STATUS_OK => ResponseStatus::Ok,
        STATUS_REJECTED => ResponseStatus::Rejected(bytes[4]),
        STATUS_MALFORMED => ResponseStatus::Malformed,
        other => return Err(DecodeError::UnknownStatus(other)),
    };

    Ok(ProvisioningResponse { request_id, status })
}

/// Encode a response frame (peripheral side)
pub fn encode_response(response: &ProvisioningResponse) -> Vec<u8> {
    let (status, reason) = match response.status {
        ResponseStatus::Ok => (STATUS_OK, 0),
        ResponseStatus::Rejected(reason) => (STATUS_REJECTED, reason),
        ResponseStatus::Malformed => (STATUS_MALFORMED, 0),
    };

    let mut frame = Vec::with_capacity(RESPONSE_FRAME_LEN);
    frame.push(FRAME_VERSION);
    frame.extend_from_slice(&response.request_id.to_be_bytes());
    frame.push(status);
    frame.push(reason);
    seal(frame)
}

/// Decode a request frame (peripheral side)
pub fn decode_request(bytes: &[u8]) -> DecodeResult<ProvisioningRequest> {
    let mut reader = FrameReader::new(bytes);

    check_version(reader.u8()?)?;
    let request_id = reader.u16()?;
    let ssid_len = usize::from(reader.u8()?);
    let ssid = reader.take(ssid_len)?;
    let password_len = usize::from(reader.u8()?);
    let password = reader.take(password_len)?;
    let body_len = reader.position();
    let received = reader.u16()?;

    if reader.remaining() > 0 {
        return Err(DecodeError::TrailingBytes(reader.remaining()));
    }

    let computed = checksum(&bytes[..body_len]);
    if received != computed {
        return Err(DecodeError::ChecksumMismatch { received, computed });
    }

    let ssid = std::str::from_utf8(ssid).map_err(|_| CredentialError::InvalidUtf8)?;
    let password = std::str::from_utf8(password).map_err(|_| CredentialError::InvalidUtf8)?;
    let credential = NetworkCredential::new(ssid, password)?;

    Ok(ProvisioningRequest::new(credential, request_id))
}

/// The handshake signal a peripheral sends once it is ready for credentials
pub fn encode_ready() -> Vec<u8> {
    vec![FRAME_VERSION, READY_SIGNAL]
}

pub fn is_ready_signal(bytes: &[u8]) -> bool {
    bytes == [FRAME_VERSION, READY_SIGNAL]
}

fn seal(mut frame: Vec<u8>) -> Vec<u8> {
    let sum = checksum(&frame);
    frame.extend_from_slice(&sum.to_be_bytes());
    frame
}

fn check_version(version: u8) -> DecodeResult<()> {
    if version == FRAME_VERSION {
        Ok(())
    } else {
        Err(DecodeError::UnsupportedVersion(version))
    }
}

fn verify_checksum(frame: &[u8]) -> DecodeResult<()> {
    let (body, tail) = frame.split_at(frame.len() - CHECKSUM_LEN);
    let received = u16::from_be_bytes([tail[0], tail[1]]);
    let computed = checksum(body);
    if received == computed {
        Ok(())
    } else {
        Err(DecodeError::ChecksumMismatch { received, computed })
    }
}

/// Cursor over a frame that reports truncation against declared lengths
struct FrameReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        let end = self.pos + len;
        if end > self.bytes.len() {
            return Err(DecodeError::Truncated {
                needed: end,
                available: self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> DecodeResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> DecodeResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn credential(ssid: &str, password: &str) -> NetworkCredential {
        NetworkCredential::new(ssid, password).unwrap()
    }

    #[test]
    fn test_encode_layout() {
        let frame = encode(&credential("Net", "password"), 0x0102);

        let mut expected = vec![0x01, 0x01, 0x02, 3];
        expected.extend_from_slice(b"Net");
        expected.push(8);
        expected.extend_from_slice(b"password");
        let sum = checksum(&expected);
        expected.extend_from_slice(&sum.to_be_bytes());

        assert_eq!(frame, expected);
        assert_eq!(frame.len(), 1 + 2 + 1 + 3 + 1 + 8 + 2);
    }

    #[test]
    fn test_encode_open_network() {
        let frame = encode(&credential("Cafe", ""), 9);
        assert_eq!(frame[3], 4);
        assert_eq!(frame[8], 0);
        assert_eq!(frame.len(), 1 + 2 + 1 + 4 + 1 + 2);
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0xff, 0x01]), 0x0100);
        // 300 * 255 = 76500 = 65536 + 10964
        assert_eq!(checksum(&[0xff; 300]), 10964);
    }

    #[test]
    fn test_echoed_ok_response_matches_request() {
        let ssid = "a".repeat(32);
        let password = "p".repeat(63);
        for (cred, id) in [
            (credential("HomeNet", "hunter22"), 0),
            (credential("Cafe", ""), 0x7fff),
            (credential(&ssid, &password), u16::MAX),
        ] {
            let request = decode_request(&encode(&cred, id)).unwrap();
            assert_eq!(request.credential(), &cred);

            let reply = encode_response(&ProvisioningResponse {
                request_id: request.request_id(),
                status: ResponseStatus::Ok,
            });
            let response = decode(&reply).unwrap();
            assert_eq!(response.request_id, id);
            assert_eq!(response.status, ResponseStatus::Ok);
        }
    }

    #[test]
    fn test_response_statuses() {
        for status in [
            ResponseStatus::Ok,
            ResponseStatus::Rejected(0x2a),
            ResponseStatus::Malformed,
        ] {
            let response = ProvisioningResponse {
                request_id: 77,
                status,
            };
            assert_eq!(decode(&encode_response(&response)).unwrap(), response);
        }
    }

    #[test]
    fn test_single_byte_corruption_detected() {
        let frame = encode_response(&ProvisioningResponse {
            request_id: 0x1234,
            status: ResponseStatus::Rejected(5),
        });

        for index in 1..frame.len() {
            for mask in [0x01u8, 0x10, 0x80, 0xff] {
                let mut corrupted = frame.clone();
                corrupted[index] ^= mask;
                assert!(
                    matches!(
                        decode(&corrupted),
                        Err(DecodeError::ChecksumMismatch { .. })
                    ),
                    "byte {index} xor {mask:#04x} not detected"
                );
            }
        }
    }

    #[test]
    fn test_request_payload_corruption_detected() {
        let frame = encode(&credential("HomeNet", "hunter22"), 3);
        let ssid_len_at = 3;
        let password_len_at = 4 + 7;

        for index in 1..frame.len() {
            if index == ssid_len_at || index == password_len_at {
                continue;
            }
            let mut corrupted = frame.clone();
            corrupted[index] ^= 0x20;
            assert!(
                matches!(
                    decode_request(&corrupted),
                    Err(DecodeError::ChecksumMismatch { .. })
                ),
                "byte {index} not detected"
            );
        }
    }

    #[test]
    fn test_truncated_response() {
        let frame = encode_response(&ProvisioningResponse {
            request_id: 1,
            status: ResponseStatus::Ok,
        });

        for len in 0..frame.len() {
            assert_eq!(
                decode(&frame[..len]),
                Err(DecodeError::Truncated {
                    needed: RESPONSE_FRAME_LEN,
                    available: len,
                })
            );
        }
    }

    #[test]
    fn test_truncated_request() {
        let frame = encode(&credential("HomeNet", "hunter22"), 1);
        for len in 0..frame.len() {
            assert!(
                matches!(
                    decode_request(&frame[..len]),
                    Err(DecodeError::Truncated { .. })
                ),
                "prefix of {len} bytes"
            );
        }
    }

    #[test]
    fn test_unsupported_version() {
        let mut frame = encode_response(&ProvisioningResponse {
            request_id: 1,
            status: ResponseStatus::Ok,
        });
        frame[0] = 0x02;
        assert_eq!(decode(&frame), Err(DecodeError::UnsupportedVersion(0x02)));

        let mut request = encode(&credential("HomeNet", "hunter22"), 1);
        request[0] = 0x00;
        assert_eq!(
            decode_request(&request),
            Err(DecodeError::UnsupportedVersion(0x00))
        );
    }

    #[test]
    fn test_unknown_status() {
        let frame = seal(vec![FRAME_VERSION, 0, 1, 0x09, 0]);
        assert_eq!(decode(&frame), Err(DecodeError::UnknownStatus(0x09)));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut frame = encode_response(&ProvisioningResponse {
            request_id: 1,
            status: ResponseStatus::Ok,
        });
        frame.push(0);
        assert_eq!(decode(&frame), Err(DecodeError::TrailingBytes(1)));

        let mut request = encode(&credential("HomeNet", "hunter22"), 1);
        request.extend_from_slice(&[0, 0]);
        assert_eq!(decode_request(&request), Err(DecodeError::TrailingBytes(2)));
    }

    #[test]
    fn test_request_with_invalid_utf8() {
        let frame = seal(vec![FRAME_VERSION, 0, 1, 2, 0xff, 0xfe, 0]);
        assert_eq!(
            decode_request(&frame),
            Err(DecodeError::InvalidCredential(CredentialError::InvalidUtf8))
        );
    }

    #[test]
    fn test_request_with_short_password() {
        let mut body = vec![FRAME_VERSION, 0, 1, 1, b'x', 3];
        body.extend_from_slice(b"abc");
        assert_eq!(
            decode_request(&seal(body)),
            Err(DecodeError::InvalidCredential(
                CredentialError::InvalidPasswordLength(3)
            ))
        );
    }

    #[test]
    fn test_ready_signal() {
        assert!(is_ready_signal(&encode_ready()));
        assert!(!is_ready_signal(&[FRAME_VERSION]));
        assert!(!is_ready_signal(&[0x02, READY_SIGNAL]));
        assert!(!is_ready_signal(&encode_response(&ProvisioningResponse {
            request_id: 0,
            status: ResponseStatus::Ok,
        })));
    }
}
