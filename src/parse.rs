//! Parsers for metadata server responses.
//!
//! Listing responses are newline separated records. Records that do not
//! carry a usable non-negative index are skipped rather than rejected, so a
//! single odd line never fails the whole listing.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::Error;

/// A normalized link layer address, rendered as lowercase colon separated hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HwAddr([u8; 6]);

impl HwAddr {
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for HwAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl FromStr for HwAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Validation(format!("invalid hardware address {:?}", s));
        let trimmed = s.trim_ascii();
        let sep = if trimmed.contains('-') { '-' } else { ':' };
        let mut octets = [0u8; 6];
        let mut count = 0;
        for part in trimmed.split(sep) {
            if count == octets.len()
                || part.is_empty()
                || part.len() > 2
                || !part.bytes().all(|b| b.is_ascii_hexdigit())
            {
                return Err(invalid());
            }
            octets[count] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
            count += 1;
        }
        if count != octets.len() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

impl Serialize for HwAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parses an interface listing such as `"0/\n1/\n"`. The index of each
/// record is the part before its first `/`.
pub fn parse_interface_list(body: &[u8]) -> Vec<u64> {
    records(body)
        .filter_map(|record| record.split_once('/').map(|(index, _)| index))
        .filter_map(parse_index)
        .collect()
}

/// Parses a listing of bare decimal indices such as `"0\n3\n"`.
pub fn parse_index_list(body: &[u8]) -> Vec<u64> {
    records(body).filter_map(parse_index).collect()
}

pub fn parse_hwaddr(body: &[u8]) -> Result<HwAddr, Error> {
    let s = std::str::from_utf8(body)
        .map_err(|_| Error::Validation("hardware address is not valid UTF-8".into()))?;
    s.parse()
}

/// Validates a forwarded IP value. The body must be exactly one IPv4
/// literal, with no surrounding whitespace.
pub fn parse_ipv4(body: &[u8]) -> Result<Ipv4Addr, Error> {
    std::str::from_utf8(body)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::Validation("forwarded-ip is not a valid ip address".into()))
}

fn records(body: &[u8]) -> impl Iterator<Item = &str> {
    body.split(|b| *b == b'\n')
        .filter_map(|line| std::str::from_utf8(line).ok())
}

// Indices are non-negative and at most i64::MAX.
fn parse_index(s: &str) -> Option<u64> {
    let s = s.trim_ascii();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok().filter(|index| *index <= i64::MAX as u64)
}
