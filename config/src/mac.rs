// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Mac address type and logic.

use crate::ConfigError;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A [MAC Address] type.
///
/// `Mac` is a transparent wrapper around `[u8; 6]` which provides a small
/// collection of methods and type safety.
///
/// [MAC Address]: https://en.wikipedia.org/wiki/MAC_address
#[must_use]
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mac(pub [u8; 6]);

impl From<[u8; 6]> for Mac {
    fn from(value: [u8; 6]) -> Self {
        Mac(value)
    }
}

impl From<Mac> for [u8; 6] {
    fn from(value: Mac) -> Self {
        value.0
    }
}

impl AsRef<[u8; 6]> for Mac {
    #[must_use]
    fn as_ref(&self) -> &[u8; 6] {
        &self.0
    }
}

impl Mac {
    /// The zero `Mac`.
    ///
    /// `ZERO` is illegal as an interface address in most contexts.
    pub const ZERO: Mac = Mac([0; 6]);

    /// Returns true iff the least significant bit of the first octet is one.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    /// Returns true iff the least significant bit of the first octet is zero.
    #[must_use]
    pub fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }

    /// Returns true iff the second least significant bit of the first octet is one.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }

    /// Returns true iff the binary representation of the [`Mac`] is exclusively zeros.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self == &Mac::ZERO
    }

    /// Synthesize a locally administered unicast `Mac` from random bytes.
    ///
    /// Used by normalization for bridge-mode interfaces that did not
    /// specify an address.
    pub fn synthesize() -> Mac {
        let mut octets: [u8; 6] = rand::random();
        octets[0] &= 0xfe; // unicast
        octets[0] |= 0x02; // locally administered
        Mac(octets)
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for Mac {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(ConfigError::BadMac(s.to_string()));
        }
        for (octet, part) in octets.iter_mut().zip(parts.iter()) {
            *octet =
                u8::from_str_radix(part, 16).map_err(|_| ConfigError::BadMac(s.to_string()))?;
        }
        Ok(Mac(octets))
    }
}

impl serde::Serialize for Mac {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Mac {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Mac::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_roundtrip() {
        let mac = Mac::from_str("52:54:00:ab:cd:ef").unwrap();
        assert_eq!(mac.to_string(), "52:54:00:ab:cd:ef");
    }

    #[test]
    fn rejects_malformed() {
        assert!(Mac::from_str("52:54:00:ab:cd").is_err());
        assert!(Mac::from_str("52:54:00:ab:cd:zz").is_err());
        assert!(Mac::from_str("5254.00ab.cdef").is_err());
    }

    #[test]
    fn synthesized_is_local_unicast() {
        for _ in 0..32 {
            let mac = Mac::synthesize();
            assert!(mac.is_unicast());
            assert!(mac.is_local());
            assert!(!mac.is_zero());
        }
    }
}
