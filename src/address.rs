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

//! IP address values as they appear in API payloads.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::de::{Error as DeserError, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Error, ErrorKind};

/// An IPv4 or IPv6 address.
///
/// Values of different families never compare equal. The IPv4 variant keeps
/// the 32-bit value with the first textual octet in byte 0, so
/// `AddressValue::from_str("143.24.20.36")` stores the byte sequence
/// `[143, 24, 20, 36]`. Formatting an IPv6 value applies the RFC 5952
/// zero-run compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressValue {
    /// An IPv4 address.
    V4(u32),
    /// An IPv6 address as 16 big-endian bytes.
    V6([u8; 16]),
}

#[inline]
fn parse_error<S: Into<String>>(message: S) -> Error {
    Error::new(ErrorKind::InvalidAddress, message)
}

fn parse_v4(s: &str) -> Result<AddressValue, Error> {
    let mut octets = [0u8; 4];
    let mut count = 0;
    for part in s.split('.') {
        if count == 4 {
            return Err(parse_error(format!(
                "Too many components in IPv4 address {}",
                s
            )));
        }
        octets[count] = part
            .parse()
            .map_err(|_| parse_error(format!("Invalid IPv4 component {}", part)))?;
        count += 1;
    }
    if count != 4 {
        return Err(parse_error(format!(
            "Expected 4 components in IPv4 address {}, got {}",
            s, count
        )));
    }
    Ok(AddressValue::V4(u32::from_le_bytes(octets)))
}

fn parse_group(group: &str) -> Result<u16, Error> {
    if group.len() > 4 {
        return Err(parse_error(format!("IPv6 group {} is too long", group)));
    }
    u16::from_str_radix(group, 16)
        .map_err(|_| parse_error(format!("Invalid IPv6 group {}", group)))
}

fn parse_v6(s: &str) -> Result<AddressValue, Error> {
    let mut parts: Vec<&str> = s.split(':').collect();
    if parts.len() < 2 || parts.len() > 9 {
        return Err(parse_error(format!(
            "Expected between 2 and 9 groups in IPv6 address {}",
            s
        )));
    }

    // A leading or trailing `::` produces two adjacent empty segments,
    // collapse them into the one empty segment that marks the compression.
    if parts[0].is_empty() && parts[1].is_empty() {
        let _ = parts.remove(0);
    }
    if parts.len() >= 2 && parts[parts.len() - 1].is_empty() && parts[parts.len() - 2].is_empty() {
        let _ = parts.pop();
    }

    let empty = parts.iter().filter(|p| p.is_empty()).count();
    let groups = parts.len() - empty;
    if empty > 1 {
        return Err(parse_error(format!(
            "More than one :: compression in IPv6 address {}",
            s
        )));
    }
    if empty == 0 && groups != 8 {
        return Err(parse_error(format!(
            "Expected 8 groups in IPv6 address {}, got {}",
            s, groups
        )));
    }
    if groups > 8 || (empty == 1 && groups > 7) {
        return Err(parse_error(format!("Too many groups in IPv6 address {}", s)));
    }

    let mut bytes = [0u8; 16];
    let mut index = 0;
    for part in parts {
        if part.is_empty() {
            // the compression expands to however many zero groups are
            // needed to reach 8 in total
            index += 8 - groups;
        } else {
            let value = parse_group(part)?;
            bytes[index * 2] = (value >> 8) as u8;
            bytes[index * 2 + 1] = (value & 0xFF) as u8;
            index += 1;
        }
    }
    Ok(AddressValue::V6(bytes))
}

/// Find the longest run of zero groups, preferring the leftmost on a tie.
fn zero_run(groups: &[u16; 8]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut start = 0;
    let mut len = 0;
    for (i, &g) in groups.iter().enumerate() {
        if g == 0 {
            if len == 0 {
                start = i;
            }
            len += 1;
            if len >= 2 && best.map_or(true, |(_, l)| len > l) {
                best = Some((start, len));
            }
        } else {
            len = 0;
        }
    }
    best
}

impl AddressValue {
    /// Whether this is an IPv4 address.
    #[inline]
    pub fn is_v4(&self) -> bool {
        matches!(self, AddressValue::V4(..))
    }

    /// Whether this is an IPv6 address.
    #[inline]
    pub fn is_v6(&self) -> bool {
        matches!(self, AddressValue::V6(..))
    }

    /// The address bytes in textual order.
    pub fn octets(&self) -> Vec<u8> {
        match self {
            AddressValue::V4(value) => value.to_le_bytes().to_vec(),
            AddressValue::V6(bytes) => bytes.to_vec(),
        }
    }

    fn v6_groups(bytes: &[u8; 16]) -> [u16; 8] {
        let mut groups = [0u16; 8];
        for (i, group) in groups.iter_mut().enumerate() {
            *group = ((bytes[i * 2] as u16) << 8) | bytes[i * 2 + 1] as u16;
        }
        groups
    }
}

impl FromStr for AddressValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<AddressValue, Error> {
        if s.contains(':') {
            parse_v6(s)
        } else if s.contains('.') {
            parse_v4(s)
        } else {
            Err(parse_error(format!("Unrecognized address {}", s)))
        }
    }
}

impl fmt::Display for AddressValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AddressValue::V4(value) => {
                let octets = value.to_le_bytes();
                write!(f, "{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
            }
            AddressValue::V6(bytes) => {
                let groups = AddressValue::v6_groups(bytes);
                match zero_run(&groups) {
                    Some((start, len)) => {
                        for g in &groups[..start] {
                            write!(f, "{:x}:", g)?;
                        }
                        if start == 0 {
                            write!(f, ":")?;
                        }
                        if start + len == 8 {
                            write!(f, ":")?;
                        } else {
                            for g in &groups[start + len..] {
                                write!(f, ":{:x}", g)?;
                            }
                        }
                        Ok(())
                    }
                    None => {
                        let mut first = true;
                        for g in &groups {
                            if !first {
                                write!(f, ":")?;
                            }
                            write!(f, "{:x}", g)?;
                            first = false;
                        }
                        Ok(())
                    }
                }
            }
        }
    }
}

impl From<Ipv4Addr> for AddressValue {
    fn from(value: Ipv4Addr) -> AddressValue {
        AddressValue::V4(u32::from_le_bytes(value.octets()))
    }
}

impl From<Ipv6Addr> for AddressValue {
    fn from(value: Ipv6Addr) -> AddressValue {
        AddressValue::V6(value.octets())
    }
}

impl Serialize for AddressValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

struct AddressValueVisitor;

impl<'de> Visitor<'de> for AddressValueVisitor {
    type Value = AddressValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an IPv4 or IPv6 address")
    }

    fn visit_str<E>(self, value: &str) -> Result<AddressValue, E>
    where
        E: DeserError,
    {
        AddressValue::from_str(value).map_err(DeserError::custom)
    }
}

impl<'de> Deserialize<'de> for AddressValue {
    fn deserialize<D>(deserializer: D) -> Result<AddressValue, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(AddressValueVisitor)
    }
}

#[cfg(test)]
pub mod test {
    use std::net::Ipv6Addr;
    use std::str::FromStr;

    use super::AddressValue;
    use crate::ErrorKind;

    #[test]
    fn test_v4_octet_order() {
        let addr = AddressValue::from_str("143.24.20.36").unwrap();
        assert_eq!(addr.octets(), vec![143, 24, 20, 36]);
        assert_eq!(addr.to_string(), "143.24.20.36");
        assert!(addr.is_v4());
    }

    #[test]
    fn test_v4_round_trip() {
        for s in &["0.0.0.0", "255.255.255.255", "10.0.42.1"] {
            let addr = AddressValue::from_str(s).unwrap();
            assert_eq!(&addr.to_string(), s);
        }
    }

    #[test]
    fn test_v4_invalid() {
        for s in &["1.2.3", "1.2.3.4.5", "1.2.3.256", "1.2.3.", "a.b.c.d"] {
            let err = AddressValue::from_str(s).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidAddress);
        }
    }

    #[test]
    fn test_v6_all_zero() {
        let addr = AddressValue::from_str("::").unwrap();
        assert_eq!(addr, AddressValue::V6([0; 16]));
        assert_eq!(addr.to_string(), "::");
    }

    #[test]
    fn test_v6_compression_on_output() {
        let addr =
            AddressValue::from_str("2001:0db8:0000:0000:0000:0000:0000:0001").unwrap();
        assert_eq!(addr.to_string(), "2001:db8::1");
    }

    #[test]
    fn test_v6_leading_and_trailing() {
        assert_eq!(AddressValue::from_str("::1").unwrap().to_string(), "::1");
        assert_eq!(
            AddressValue::from_str("fe80::").unwrap().to_string(),
            "fe80::"
        );
        assert_eq!(
            AddressValue::from_str("1:2:3:4:5:6:7:8").unwrap().to_string(),
            "1:2:3:4:5:6:7:8"
        );
    }

    #[test]
    fn test_v6_leftmost_run_wins() {
        // two runs of equal length, the first one is compressed
        let addr = AddressValue::from_str("1:0:0:2:3:0:0:4").unwrap();
        assert_eq!(addr.to_string(), "1::2:3:0:0:4");
        // the longer run wins regardless of position
        let addr = AddressValue::from_str("1:0:0:2:0:0:0:3").unwrap();
        assert_eq!(addr.to_string(), "1:0:0:2::3");
    }

    #[test]
    fn test_v6_single_zero_not_compressed() {
        let addr = AddressValue::from_str("1:2:3:0:5:6:7:8").unwrap();
        assert_eq!(addr.to_string(), "1:2:3:0:5:6:7:8");
    }

    #[test]
    fn test_v6_format_is_idempotent() {
        for s in &[
            "::",
            "::1",
            "2001:db8::1",
            "fe80::1:2:3",
            "1:2:3:4:5:6:7:8",
            "2001:0DB8:0:0:8:800:200C:417A",
        ] {
            let parsed = AddressValue::from_str(s).unwrap();
            let reparsed = AddressValue::from_str(&parsed.to_string()).unwrap();
            assert_eq!(parsed, reparsed);
        }
    }

    #[test]
    fn test_v6_invalid() {
        for s in &[
            "1:::2",
            "1::2::3",
            "1:2:3:4:5:6:7",
            "1:2:3:4:5:6:7:8:9",
            "12345::",
            "g::1",
            "1:2:3:4:5:6:7:8::",
        ] {
            let err = AddressValue::from_str(s).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidAddress, "accepted {}", s);
        }
    }

    #[test]
    fn test_families_never_equal() {
        let v4 = AddressValue::from_str("0.0.0.0").unwrap();
        let v6 = AddressValue::from_str("::").unwrap();
        assert_ne!(v4, v6);
    }

    #[test]
    fn test_from_std() {
        let addr: AddressValue = Ipv6Addr::LOCALHOST.into();
        assert_eq!(addr.to_string(), "::1");
        let addr: AddressValue = "143.24.20.36".parse::<std::net::Ipv4Addr>().unwrap().into();
        assert_eq!(addr.octets(), vec![143, 24, 20, 36]);
    }

    #[test]
    fn test_serde() {
        let addr: AddressValue = serde_json::from_str("\"2001:db8::1\"").unwrap();
        assert_eq!(addr, AddressValue::from_str("2001:db8::1").unwrap());
        assert_eq!(
            serde_json::to_string(&addr).unwrap(),
            "\"2001:db8::1\"".to_string()
        );
        assert!(serde_json::from_str::<AddressValue>("\"1:::2\"").is_err());
    }
}
