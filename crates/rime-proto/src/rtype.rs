//! DNS record types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A DNS record type.
///
/// Only the types the resolver handles structurally get their own variant;
/// everything else is carried through [`RecordType::Other`] so unknown types
/// still round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 host address.
    A,
    /// Authoritative name server.
    Ns,
    /// Canonical name alias.
    Cname,
    /// Start of a zone of authority.
    Soa,
    /// Domain name pointer.
    Ptr,
    /// Mail exchange.
    Mx,
    /// Text strings.
    Txt,
    /// IPv6 host address.
    Aaaa,
    /// Server selection.
    Srv,
    /// EDNS OPT pseudo-RR (parsed but not interpreted).
    Opt,
    /// QTYPE * (all records).
    Any,
    /// Anything else.
    Other(u16),
}

impl RecordType {
    /// Decodes a type from its wire value.
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::A,
            2 => Self::Ns,
            5 => Self::Cname,
            6 => Self::Soa,
            12 => Self::Ptr,
            15 => Self::Mx,
            16 => Self::Txt,
            28 => Self::Aaaa,
            33 => Self::Srv,
            41 => Self::Opt,
            255 => Self::Any,
            other => Self::Other(other),
        }
    }

    /// The wire value of this type.
    pub fn to_u16(self) -> u16 {
        match self {
            Self::A => 1,
            Self::Ns => 2,
            Self::Cname => 5,
            Self::Soa => 6,
            Self::Ptr => 12,
            Self::Mx => 15,
            Self::Txt => 16,
            Self::Aaaa => 28,
            Self::Srv => 33,
            Self::Opt => 41,
            Self::Any => 255,
            Self::Other(v) => v,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::Ns => f.write_str("NS"),
            Self::Cname => f.write_str("CNAME"),
            Self::Soa => f.write_str("SOA"),
            Self::Ptr => f.write_str("PTR"),
            Self::Mx => f.write_str("MX"),
            Self::Txt => f.write_str("TXT"),
            Self::Aaaa => f.write_str("AAAA"),
            Self::Srv => f.write_str("SRV"),
            Self::Opt => f.write_str("OPT"),
            Self::Any => f.write_str("ANY"),
            Self::Other(v) => write!(f, "TYPE{v}"),
        }
    }
}
