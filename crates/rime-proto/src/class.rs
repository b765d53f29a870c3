//! DNS record classes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A DNS class (RFC 1035 section 3.2.4).
///
/// Unrecognized values survive round-trips via [`RecordClass::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordClass {
    /// The Internet class.
    In,
    /// Chaos.
    Ch,
    /// Hesiod.
    Hs,
    /// QCLASS NONE (RFC 2136).
    None,
    /// QCLASS * (any class).
    Any,
    /// Anything else.
    Other(u16),
}

impl RecordClass {
    /// Decodes a class from its wire value.
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::In,
            3 => Self::Ch,
            4 => Self::Hs,
            254 => Self::None,
            255 => Self::Any,
            other => Self::Other(other),
        }
    }

    /// The wire value of this class.
    pub fn to_u16(self) -> u16 {
        match self {
            Self::In => 1,
            Self::Ch => 3,
            Self::Hs => 4,
            Self::None => 254,
            Self::Any => 255,
            Self::Other(v) => v,
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => f.write_str("IN"),
            Self::Ch => f.write_str("CH"),
            Self::Hs => f.write_str("HS"),
            Self::None => f.write_str("NONE"),
            Self::Any => f.write_str("ANY"),
            Self::Other(v) => write!(f, "CLASS{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip() {
        for v in [1u16, 3, 4, 254, 255, 4711] {
            assert_eq!(RecordClass::from_u16(v).to_u16(), v);
        }
    }
}
