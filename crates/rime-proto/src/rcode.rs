//! DNS response codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 4-bit DNS response code (RFC 1035 section 4.1.1).
///
/// Extended (EDNS) rcodes are out of scope; values above 15 cannot appear in
/// the header field this type models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseCode {
    /// No error condition.
    NoError,
    /// The server could not interpret the query.
    FormErr,
    /// The server failed to complete the request.
    ServFail,
    /// The queried name does not exist.
    NxDomain,
    /// The server does not implement the request kind.
    NotImp,
    /// The server refused for policy reasons.
    Refused,
    /// Any other 4-bit value.
    Other(u8),
}

impl ResponseCode {
    /// Decodes the low four bits of `value`.
    pub fn from_u8(value: u8) -> Self {
        match value & 0x0F {
            0 => Self::NoError,
            1 => Self::FormErr,
            2 => Self::ServFail,
            3 => Self::NxDomain,
            4 => Self::NotImp,
            5 => Self::Refused,
            other => Self::Other(other),
        }
    }

    /// The 4-bit wire value.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::NoError => 0,
            Self::FormErr => 1,
            Self::ServFail => 2,
            Self::NxDomain => 3,
            Self::NotImp => 4,
            Self::Refused => 5,
            Self::Other(v) => v & 0x0F,
        }
    }

    /// True for `NOERROR`.
    pub fn is_no_error(self) -> bool {
        matches!(self, Self::NoError)
    }

    /// True for `NXDOMAIN`.
    pub fn is_nxdomain(self) -> bool {
        matches!(self, Self::NxDomain)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoError => f.write_str("NOERROR"),
            Self::FormErr => f.write_str("FORMERR"),
            Self::ServFail => f.write_str("SERVFAIL"),
            Self::NxDomain => f.write_str("NXDOMAIN"),
            Self::NotImp => f.write_str("NOTIMP"),
            Self::Refused => f.write_str("REFUSED"),
            Self::Other(v) => write!(f, "RCODE{v}"),
        }
    }
}
