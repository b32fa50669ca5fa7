//! Node addressing: short 1-byte node-ids and long 8-byte UIDs.

use crate::error::{Error, Result};

/// Broadcast short-address id. Addresses every listening node.
pub const BROADCAST_ID: u8 = 0xFF;

/// A node address, either a short 1-byte id or a long 8-byte UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    Short(u8),
    Long([u8; 8]),
}

impl Address {
    pub fn broadcast() -> Self {
        Address::Short(BROADCAST_ID)
    }

    /// Whether this address sets the header's 64-bit-address flag.
    pub fn is_long(&self) -> bool {
        matches!(self, Address::Long(_))
    }

    /// The address bytes as they appear on the wire.
    pub fn to_wire_bytes(self) -> Vec<u8> {
        match self {
            Address::Short(id) => vec![id],
            Address::Long(uid) => uid.to_vec(),
        }
    }

    /// Parse a 16-character uppercase (or lowercase) hex UID string.
    pub fn from_uid_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| Error::InvalidAddress(e.to_string()))?;
        let uid: [u8; 8] = bytes
            .try_into()
            .map_err(|_| Error::InvalidAddress(format!("UID must be 8 bytes: {s}")))?;
        Ok(Address::Long(uid))
    }

    /// Canonical 16-character uppercase hex representation of a long address.
    pub fn uid_hex(&self) -> Option<String> {
        match self {
            Address::Long(uid) => Some(hex::encode_upper(uid)),
            Address::Short(_) => None,
        }
    }
}

impl From<u8> for Address {
    fn from(id: u8) -> Self {
        Address::Short(id)
    }
}

impl From<[u8; 8]> for Address {
    fn from(uid: [u8; 8]) -> Self {
        Address::Long(uid)
    }
}

impl TryFrom<&str> for Address {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Address::from_uid_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_address_roundtrips() {
        let addr = Address::from(0x05u8);
        assert_eq!(addr.to_wire_bytes(), vec![0x05]);
        assert!(!addr.is_long());
    }

    #[test]
    fn long_address_from_hex_is_case_insensitive() {
        let addr = Address::from_uid_hex("0102030405060708").unwrap();
        assert_eq!(addr, Address::Long([1, 2, 3, 4, 5, 6, 7, 8]));
        assert_eq!(addr.uid_hex().unwrap(), "0102030405060708");

        let lower = Address::from_uid_hex("0102030405060708".to_lowercase().as_str()).unwrap();
        assert_eq!(addr, lower);
    }

    #[test]
    fn short_hex_string_is_rejected() {
        assert!(Address::from_uid_hex("AABB").is_err());
    }

    #[test]
    fn broadcast_is_short_0xff() {
        assert_eq!(Address::broadcast(), Address::Short(0xFF));
    }
}
