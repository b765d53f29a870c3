//! The question section.

use crate::class::RecordClass;
use crate::error::{Error, Result};
use crate::name::Name;
use crate::rtype::RecordType;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A DNS question: what is being asked of the namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Question {
    /// The name being queried.
    pub qname: Name,
    /// The requested record type.
    pub qtype: RecordType,
    /// The query class.
    pub qclass: RecordClass,
}

impl Question {
    /// Creates a question.
    pub fn new(qname: Name, qtype: RecordType, qclass: RecordClass) -> Self {
        Self {
            qname,
            qtype,
            qclass,
        }
    }

    /// An `A`-record question in class IN.
    pub fn a(qname: Name) -> Self {
        Self::new(qname, RecordType::A, RecordClass::In)
    }

    /// An `AAAA`-record question in class IN.
    pub fn aaaa(qname: Name) -> Self {
        Self::new(qname, RecordType::Aaaa, RecordClass::In)
    }

    /// True if `other` asks the same thing: name compared case-insensitively,
    /// type and class exactly.
    pub fn matches(&self, other: &Question) -> bool {
        self.qname == other.qname && self.qtype == other.qtype && self.qclass == other.qclass
    }

    /// Returns a copy of this question retargeted at `name`, keeping type
    /// and class. Used when following a CNAME.
    #[must_use]
    pub fn retarget(&self, name: Name) -> Self {
        Self {
            qname: name,
            qtype: self.qtype,
            qclass: self.qclass,
        }
    }

    /// Reads a question out of a message at `offset`. Returns the question
    /// and the bytes consumed.
    pub fn read(msg: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (qname, name_len) = Name::read(msg, offset)?;
        let fixed = offset + name_len;
        if fixed + 4 > msg.len() {
            return Err(Error::short(fixed, 4, msg.len().saturating_sub(fixed)));
        }
        let qtype = RecordType::from_u16(u16::from_be_bytes([msg[fixed], msg[fixed + 1]]));
        let qclass = RecordClass::from_u16(u16::from_be_bytes([msg[fixed + 2], msg[fixed + 3]]));
        Ok((
            Self {
                qname,
                qtype,
                qclass,
            },
            name_len + 4,
        ))
    }

    /// Appends the wire form to `buf`.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.qname.write_to(buf);
        buf.extend_from_slice(&self.qtype.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.qclass.to_u16().to_be_bytes());
    }

    /// Wire-format length.
    pub fn wire_len(&self) -> usize {
        self.qname.wire_len() + 4
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.qname, self.qclass, self.qtype)
    }
}
