// Copyright 2019 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! MAC addresses as they appear in API payloads.

use std::fmt;
use std::str::FromStr;

use serde::de::{Error as DeserError, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Error, ErrorKind};

/// A MAC address.
///
/// Accepts either contiguous hex (`001422012345`) or dash-separated pairs
/// (`00-14-22-01-23-45`) on input; always formats as uppercase contiguous
/// hex. The zero-length [NONE](#associatedconstant.NONE) value stands for a
/// missing address and is what the empty input parses to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PhysicalAddress(Vec<u8>);

#[inline]
fn parse_error<S: Into<String>>(message: S) -> Error {
    Error::new(ErrorKind::InvalidAddress, message)
}

fn parse_pair(pair: &str) -> Result<u8, Error> {
    if pair.len() != 2 || !pair.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(parse_error(format!(
            "Expected exactly two hex digits, got {}",
            pair
        )));
    }
    u8::from_str_radix(pair, 16).map_err(|_| parse_error(format!("Invalid hex pair {}", pair)))
}

impl PhysicalAddress {
    /// The missing address.
    pub const NONE: PhysicalAddress = PhysicalAddress(Vec::new());

    /// Create an address from raw octets.
    #[inline]
    pub fn new<B: Into<Vec<u8>>>(octets: B) -> PhysicalAddress {
        PhysicalAddress(octets.into())
    }

    /// Whether this is the missing address.
    #[inline]
    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    /// The octets of the address.
    #[inline]
    pub fn octets(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for PhysicalAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<PhysicalAddress, Error> {
        if s.is_empty() {
            return Ok(PhysicalAddress::NONE);
        }

        let mut octets = Vec::new();
        if s.contains('-') {
            for pair in s.split('-') {
                octets.push(parse_pair(pair)?);
            }
        } else {
            if s.len() % 2 != 0 {
                return Err(parse_error(format!(
                    "Contiguous MAC address must have an even length, got {}",
                    s
                )));
            }
            for pos in (0..s.len()).step_by(2) {
                // indexing is safe: an odd length was rejected above and hex
                // digits are one byte each
                let pair = s
                    .get(pos..pos + 2)
                    .ok_or_else(|| parse_error(format!("Invalid MAC address {}", s)))?;
                octets.push(parse_pair(pair)?);
            }
        }
        Ok(PhysicalAddress(octets))
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for octet in &self.0 {
            write!(f, "{:02X}", octet)?;
        }
        Ok(())
    }
}

impl Serialize for PhysicalAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

struct PhysicalAddressVisitor;

impl<'de> Visitor<'de> for PhysicalAddressVisitor {
    type Value = PhysicalAddress;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a MAC address")
    }

    fn visit_str<E>(self, value: &str) -> Result<PhysicalAddress, E>
    where
        E: DeserError,
    {
        PhysicalAddress::from_str(value).map_err(DeserError::custom)
    }
}

impl<'de> Deserialize<'de> for PhysicalAddress {
    fn deserialize<D>(deserializer: D) -> Result<PhysicalAddress, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(PhysicalAddressVisitor)
    }
}

#[cfg(test)]
pub mod test {
    use std::str::FromStr;

    use super::PhysicalAddress;
    use crate::ErrorKind;

    #[test]
    fn test_dashed_input() {
        let mac = PhysicalAddress::from_str("00-14-22-01-23-45").unwrap();
        assert_eq!(mac.octets(), &[0x00, 0x14, 0x22, 0x01, 0x23, 0x45]);
        assert_eq!(mac.to_string(), "001422012345");
    }

    #[test]
    fn test_contiguous_input() {
        let mac = PhysicalAddress::from_str("001422012345").unwrap();
        assert_eq!(mac.to_string(), "001422012345");
        let mac = PhysicalAddress::from_str("aabbcc").unwrap();
        assert_eq!(mac.to_string(), "AABBCC");
    }

    #[test]
    fn test_empty_is_none() {
        let mac = PhysicalAddress::from_str("").unwrap();
        assert!(mac.is_none());
        assert_eq!(mac, PhysicalAddress::NONE);
        assert_eq!(mac.to_string(), "");
    }

    #[test]
    fn test_invalid() {
        for s in &[
            "00142201234",     // odd length
            "0-014-22",        // group is not two digits
            "00-14-22-",       // trailing dash
            "-00-14",          // leading dash
            "00--14",          // doubled dash
            "0g1422012345",    // not hex
            "00-14-2g",        // not hex in a group
        ] {
            let err = PhysicalAddress::from_str(s).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidAddress, "accepted {}", s);
        }
    }

    #[test]
    fn test_serde() {
        let mac: PhysicalAddress = serde_json::from_str("\"00-14-22-01-23-45\"").unwrap();
        assert_eq!(serde_json::to_string(&mac).unwrap(), "\"001422012345\"");
    }
}
