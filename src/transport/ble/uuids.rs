//! GATT UUIDs of the provisioning peripheral

use uuid::Uuid;

/// Provisioning service UUID
pub const PROVISIONING_SERVICE_UUID: Uuid = Uuid::from_bytes([
    0xd6, 0x9a, 0x37, 0xee, 0x1d, 0x8a, 0x43, 0x29, 0xbd, 0x24, 0x25, 0xdb, 0x4a, 0xf3, 0xc8, 0x70,
]);

/// Credential characteristic (write, carries one request frame)
pub const CREDENTIAL_CHAR_UUID: Uuid = Uuid::from_bytes([
    0xd6, 0x9a, 0x37, 0xee, 0x1d, 0x8a, 0x43, 0x29, 0xbd, 0x24, 0x25, 0xdb, 0x4a, 0xf3, 0xc8, 0x71,
]);

/// Status characteristic (notify, ready signal and response frames)
pub const STATUS_CHAR_UUID: Uuid = Uuid::from_bytes([
    0xd6, 0x9a, 0x37, 0xee, 0x1d, 0x8a, 0x43, 0x29, 0xbd, 0x24, 0x25, 0xdb, 0x4a, 0xf3, 0xc8, 0x72,
]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert_eq!(
            PROVISIONING_SERVICE_UUID.to_string(),
            "d69a37ee-1d8a-4329-bd24-25db4af3c870"
        );
        assert_eq!(
            CREDENTIAL_CHAR_UUID.to_string(),
            "d69a37ee-1d8a-4329-bd24-25db4af3c871"
        );
        assert_eq!(
            STATUS_CHAR_UUID.to_string(),
            "d69a37ee-1d8a-4329-bd24-25db4af3c872"
        );
    }

    #[test]
    fn test_characteristic_uuids_unique() {
        assert_ne!(CREDENTIAL_CHAR_UUID, STATUS_CHAR_UUID);
        assert_ne!(PROVISIONING_SERVICE_UUID, CREDENTIAL_CHAR_UUID);
        assert_ne!(PROVISIONING_SERVICE_UUID, STATUS_CHAR_UUID);
    }
}
