//! The fixed 12-byte DNS message header.

use crate::error::{Error, Result};
use crate::rcode::ResponseCode;
use bitflags::bitflags;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Header size in bytes.
pub const HEADER_LEN: usize = 12;

bitflags! {
    /// The one-bit flags of the DNS header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u16 {
        /// Response (as opposed to query).
        const QR = 0x8000;
        /// Authoritative answer.
        const AA = 0x0400;
        /// Truncated.
        const TC = 0x0200;
        /// Recursion desired.
        const RD = 0x0100;
        /// Recursion available.
        const RA = 0x0080;
        /// Authentic data (DNSSEC).
        const AD = 0x0020;
        /// Checking disabled (DNSSEC).
        const CD = 0x0010;
    }
}

impl Serialize for Flags {
    fn serialize<S: serde::Serializer>(&self, ser: S) -> std::result::Result<S::Ok, S::Error> {
        ser.serialize_u16(self.bits())
    }
}

impl<'de> Deserialize<'de> for Flags {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> std::result::Result<Self, D::Error> {
        Ok(Self::from_bits_truncate(u16::deserialize(de)?))
    }
}

/// A DNS operation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCode {
    /// Standard query.
    Query,
    /// Inverse query (obsolete).
    IQuery,
    /// Server status request.
    Status,
    /// Zone change notification (RFC 1996).
    Notify,
    /// Dynamic update (RFC 2136).
    Update,
    /// Any other 4-bit value.
    Other(u8),
}

impl OpCode {
    /// Decodes the low four bits of `value`.
    pub fn from_u8(value: u8) -> Self {
        match value & 0x0F {
            0 => Self::Query,
            1 => Self::IQuery,
            2 => Self::Status,
            4 => Self::Notify,
            5 => Self::Update,
            other => Self::Other(other),
        }
    }

    /// The 4-bit wire value.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Query => 0,
            Self::IQuery => 1,
            Self::Status => 2,
            Self::Notify => 4,
            Self::Update => 5,
            Self::Other(v) => v & 0x0F,
        }
    }
}

/// The DNS message header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Message identifier, matched between query and response.
    pub id: u16,
    /// One-bit flags.
    pub flags: Flags,
    /// Operation code.
    pub opcode: OpCode,
    /// Response code.
    pub rcode: ResponseCode,
    /// Question count.
    pub qd_count: u16,
    /// Answer count.
    pub an_count: u16,
    /// Authority count.
    pub ns_count: u16,
    /// Additional count.
    pub ar_count: u16,
}

impl Header {
    /// A query header: RD set, everything else zero.
    pub fn query(id: u16) -> Self {
        Self {
            id,
            flags: Flags::RD,
            opcode: OpCode::Query,
            rcode: ResponseCode::NoError,
            qd_count: 0,
            an_count: 0,
            ns_count: 0,
            ar_count: 0,
        }
    }

    /// A response header mirroring `query`: same id and opcode, QR set,
    /// RD copied.
    pub fn response_to(query: &Header) -> Self {
        Self {
            id: query.id,
            flags: Flags::QR | (query.flags & Flags::RD),
            opcode: query.opcode,
            rcode: ResponseCode::NoError,
            qd_count: 0,
            an_count: 0,
            ns_count: 0,
            ar_count: 0,
        }
    }

    /// True for a response header.
    pub fn is_response(&self) -> bool {
        self.flags.contains(Flags::QR)
    }

    /// True if the TC bit is set.
    pub fn is_truncated(&self) -> bool {
        self.flags.contains(Flags::TC)
    }

    /// Parses a header from the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::short(0, HEADER_LEN, data.len()));
        }
        let word = |i: usize| u16::from_be_bytes([data[i], data[i + 1]]);

        let bits = word(2);
        Ok(Self {
            id: word(0),
            flags: Flags::from_bits_truncate(bits),
            opcode: OpCode::from_u8((bits >> 11) as u8),
            rcode: ResponseCode::from_u8(bits as u8),
            qd_count: word(4),
            an_count: word(6),
            ns_count: word(8),
            ar_count: word(10),
        })
    }

    /// Appends the wire form to `buf`.
    pub fn write_to(&self, buf: &mut BytesMut) {
        let bits = self.flags.bits()
            | u16::from(self.opcode.to_u8()) << 11
            | u16::from(self.rcode.to_u8());
        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.extend_from_slice(&bits.to_be_bytes());
        buf.extend_from_slice(&self.qd_count.to_be_bytes());
        buf.extend_from_slice(&self.an_count.to_be_bytes());
        buf.extend_from_slice(&self.ns_count.to_be_bytes());
        buf.extend_from_slice(&self.ar_count.to_be_bytes());
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id {} {:?} {} qd {} an {} ns {} ar {}",
            self.id, self.opcode, self.rcode, self.qd_count, self.an_count, self.ns_count,
            self.ar_count
        )
    }
}
