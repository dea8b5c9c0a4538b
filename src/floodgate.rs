//! Conversion from Xbox user ids (XUIDs) to Floodgate UUIDs.
//!
//! Floodgate represents a Bedrock account as a UUID whose upper 64 bits are zero and whose lower
//! 64 bits hold the XUID.

use std::{fmt, num::IntErrorKind};

use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConvertError {
    #[error("'{0}' is not a decimal integer")]
    InvalidFormat(String),
    #[error("'{0}' doesn't fit in 64 bits")]
    Overflow(String),
}

/// A Floodgate UUID, displayed as uppercase hyphenated hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FloodgateId(Uuid);

impl FloodgateId {
    pub fn from_xuid(xuid: u64) -> Self {
        Self(Uuid::from_u64_pair(0, xuid))
    }

    /// Parse a decimal XUID, as returned by the PlayerDB API.
    pub fn parse_xuid(xuid: &str) -> Result<Self, ConvertError> {
        let trimmed = xuid.trim();
        match trimmed.parse::<u64>() {
            Ok(value) => Ok(Self::from_xuid(value)),
            Err(err) if *err.kind() == IntErrorKind::PosOverflow => {
                Err(ConvertError::Overflow(trimmed.to_owned()))
            }
            Err(_) => Err(ConvertError::InvalidFormat(trimmed.to_owned())),
        }
    }

    pub fn xuid(&self) -> u64 {
        self.0.as_u64_pair().1
    }
}

impl fmt::Display for FloodgateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_one() {
        assert_eq!(
            FloodgateId::parse_xuid("0").unwrap().to_string(),
            "00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            FloodgateId::parse_xuid("1").unwrap().to_string(),
            "00000000-0000-0000-0000-000000000001"
        );
    }

    #[test]
    fn real_xuid() {
        // 2535405290989971 == 0x9_01F0_0BBB_2993
        let id = FloodgateId::parse_xuid("2535405290989971").unwrap();
        assert_eq!(id.to_string(), "00000000-0000-0000-0009-01F00BBB2993");
        assert_eq!(id.xuid(), 2535405290989971);
    }

    #[test]
    fn layout_matches_padded_hex() {
        for n in [
            0u64,
            9,
            10,
            255,
            0xFFFF,
            0x1_0000,
            0xDEAD_BEEF,
            u64::from(u32::MAX) + 1,
            u64::MAX - 1,
            u64::MAX,
        ] {
            let id = FloodgateId::parse_xuid(&n.to_string()).unwrap().to_string();
            let hex = format!("{n:016X}");

            assert_eq!(id.len(), 36);
            assert_eq!(&id[..19], "00000000-0000-0000-");
            assert_eq!(&id[19..23], &hex[..4]);
            assert_eq!(&id[23..24], "-");
            assert_eq!(&id[24..], &hex[4..]);
        }
    }

    #[test]
    fn lenient_on_surrounding_whitespace() {
        assert_eq!(
            FloodgateId::parse_xuid(" 42\n").unwrap(),
            FloodgateId::from_xuid(42)
        );
    }

    #[test]
    fn rejects_non_numeric() {
        for input in ["", "abc", "12a", "-1", "1.5", "0x10"] {
            assert!(
                matches!(
                    FloodgateId::parse_xuid(input),
                    Err(ConvertError::InvalidFormat(_))
                ),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_values_wider_than_64_bits() {
        // u64::MAX + 1 would need 17 hex digits.
        assert_eq!(
            FloodgateId::parse_xuid("18446744073709551616"),
            Err(ConvertError::Overflow("18446744073709551616".to_owned()))
        );
    }

    #[test]
    fn conversion_is_stable() {
        let first = FloodgateId::parse_xuid("2535405290989971").unwrap();
        let second = FloodgateId::parse_xuid("2535405290989971").unwrap();
        assert_eq!(first.to_string(), second.to_string());
    }
}
