//! Resource records and RRsets.

use crate::class::RecordClass;
use crate::error::{Error, Result};
use crate::name::Name;
use crate::rdata::Rdata;
use crate::rtype::RecordType;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single resource record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Owner name.
    pub name: Name,
    /// Record class.
    pub class: RecordClass,
    /// Time to live, seconds.
    pub ttl: u32,
    /// The record data. The type is implied by the data variant.
    pub rdata: Rdata,
}

impl Record {
    /// Creates a record.
    pub fn new(name: Name, class: RecordClass, ttl: u32, rdata: Rdata) -> Self {
        Self {
            name,
            class,
            ttl,
            rdata,
        }
    }

    /// An IN A record.
    pub fn a(name: Name, ttl: u32, addr: std::net::Ipv4Addr) -> Self {
        Self::new(name, RecordClass::In, ttl, Rdata::A(addr))
    }

    /// An IN AAAA record.
    pub fn aaaa(name: Name, ttl: u32, addr: std::net::Ipv6Addr) -> Self {
        Self::new(name, RecordClass::In, ttl, Rdata::Aaaa(addr))
    }

    /// An IN NS record.
    pub fn ns(name: Name, ttl: u32, host: Name) -> Self {
        Self::new(name, RecordClass::In, ttl, Rdata::Ns(host))
    }

    /// An IN CNAME record.
    pub fn cname(name: Name, ttl: u32, target: Name) -> Self {
        Self::new(name, RecordClass::In, ttl, Rdata::Cname(target))
    }

    /// The record type.
    pub fn rtype(&self) -> RecordType {
        self.rdata.rtype()
    }

    /// Returns a copy with a different TTL.
    #[must_use]
    pub fn with_ttl(&self, ttl: u32) -> Self {
        let mut copy = self.clone();
        copy.ttl = ttl;
        copy
    }

    /// Reads a record out of a message at `offset`. Returns the record and
    /// the bytes consumed.
    pub fn read(msg: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (name, name_len) = Name::read(msg, offset)?;
        let fixed = offset + name_len;
        if fixed + 10 > msg.len() {
            return Err(Error::short(fixed, 10, msg.len().saturating_sub(fixed)));
        }
        let rtype = RecordType::from_u16(u16::from_be_bytes([msg[fixed], msg[fixed + 1]]));
        let class = RecordClass::from_u16(u16::from_be_bytes([msg[fixed + 2], msg[fixed + 3]]));
        let ttl = u32::from_be_bytes([msg[fixed + 4], msg[fixed + 5], msg[fixed + 6], msg[fixed + 7]]);
        let rdlen = u16::from_be_bytes([msg[fixed + 8], msg[fixed + 9]]) as usize;
        let rdata = Rdata::read(rtype, msg, fixed + 10, rdlen)?;

        Ok((
            Self {
                name,
                class,
                ttl,
                rdata,
            },
            name_len + 10 + rdlen,
        ))
    }

    /// Appends the wire form to `buf`. Names are written uncompressed.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.name.write_to(buf);
        buf.extend_from_slice(&self.rtype().to_u16().to_be_bytes());
        buf.extend_from_slice(&self.class.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.ttl.to_be_bytes());
        buf.extend_from_slice(&(self.rdata.wire_len() as u16).to_be_bytes());
        self.rdata.write_to(buf);
    }

    /// Wire-format length.
    pub fn wire_len(&self) -> usize {
        self.name.wire_len() + 10 + self.rdata.wire_len()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.name,
            self.ttl,
            self.class,
            self.rtype(),
            self.rdata
        )
    }
}

/// A set of records sharing owner name, class and type.
///
/// The TTL of the set is the minimum TTL of its members; members with
/// duplicate rdata are kept once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rrset {
    /// Shared owner name.
    pub name: Name,
    /// Shared class.
    pub class: RecordClass,
    /// Shared type.
    pub rtype: RecordType,
    /// Set TTL (minimum over merged records).
    pub ttl: u32,
    /// The member rdata values.
    pub rdata: Vec<Rdata>,
}

impl Rrset {
    /// Creates an RRset seeded with one record.
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.name.clone(),
            class: record.class,
            rtype: record.rtype(),
            ttl: record.ttl,
            rdata: vec![record.rdata.clone()],
        }
    }

    /// True if `record` belongs in this set.
    pub fn owns(&self, record: &Record) -> bool {
        self.name == record.name && self.class == record.class && self.rtype == record.rtype()
    }

    /// Merges a record into this set: the TTL drops to the minimum and the
    /// rdata is added unless already present.
    pub fn merge(&mut self, record: &Record) {
        debug_assert!(self.owns(record));
        self.ttl = self.ttl.min(record.ttl);
        if !self.rdata.contains(&record.rdata) {
            self.rdata.push(record.rdata.clone());
        }
    }

    /// Groups a run of records into RRsets, merging equal sets.
    pub fn group(records: &[Record]) -> Vec<Rrset> {
        let mut sets: Vec<Rrset> = Vec::new();
        for record in records {
            match sets.iter_mut().find(|s| s.owns(record)) {
                Some(set) => set.merge(record),
                None => sets.push(Rrset::from_record(record)),
            }
        }
        sets
    }

    /// Expands the set back into individual records.
    pub fn to_records(&self) -> Vec<Record> {
        self.rdata
            .iter()
            .map(|rdata| Record::new(self.name.clone(), self.class, self.ttl, rdata.clone()))
            .collect()
    }

    /// Number of member rdata values.
    pub fn len(&self) -> usize {
        self.rdata.len()
    }

    /// True if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.rdata.is_empty()
    }
}

/// Reads `count` records starting at `offset`; returns them and the offset
/// just past the last one.
pub(crate) fn read_section(
    msg: &[u8],
    mut offset: usize,
    count: u16,
) -> Result<(Vec<Record>, usize)> {
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (record, used) = Record::read(msg, offset)?;
        offset += used;
        records.push(record);
    }
    Ok((records, offset))
}
