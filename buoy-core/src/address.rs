//! Hardware address: 6 bytes, rendered as uppercase hex octets joined by `:`.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length of a radio hardware address in bytes.
pub const ADDRESS_LEN: usize = 6;

/// Fixed-length radio hardware address. Used on the wire and as registry key.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct HardwareAddress([u8; ADDRESS_LEN]);

impl HardwareAddress {
    /// All bits set: deliver to every node in range.
    pub const BROADCAST: HardwareAddress = HardwareAddress([0xFF; ADDRESS_LEN]);

    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        HardwareAddress(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Random locally-administered unicast address, for hosts without radio hardware.
    pub fn random_local() -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes[0] = (bytes[0] | 0x02) & !0x01;
        HardwareAddress(bytes)
    }
}

impl From<[u8; ADDRESS_LEN]> for HardwareAddress {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        HardwareAddress(bytes)
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

impl FromStr for HardwareAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut bytes = [0u8; ADDRESS_LEN];
        let mut parts = s.split(':');
        for (i, slot) in bytes.iter_mut().enumerate() {
            let part = parts.next().ok_or(AddressParseError::OctetCount)?;
            if part.len() != 2 || !part.bytes().all(|c| c.is_ascii_hexdigit()) {
                return Err(AddressParseError::InvalidOctet(i));
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| AddressParseError::InvalidOctet(i))?;
        }
        if parts.next().is_some() {
            return Err(AddressParseError::OctetCount);
        }
        Ok(HardwareAddress(bytes))
    }
}

impl Serialize for HardwareAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HardwareAddress {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s: String = Deserialize::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error parsing a textual hardware address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("expected 6 octets separated by ':'")]
    OctetCount,
    #[error("octet {0} is not two hex digits")]
    InvalidOctet(usize),
}
