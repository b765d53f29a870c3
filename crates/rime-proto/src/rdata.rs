//! Record data variants.
//!
//! Only the types the resolver inspects get structured variants; everything
//! else is kept as opaque bytes and round-trips untouched.

use crate::error::{Error, Result};
use crate::name::Name;
use crate::rtype::RecordType;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Parsed record data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rdata {
    /// IPv4 address.
    A(Ipv4Addr),
    /// IPv6 address.
    Aaaa(Ipv6Addr),
    /// Nameserver host name.
    Ns(Name),
    /// Alias target.
    Cname(Name),
    /// Reverse-mapping target.
    Ptr(Name),
    /// Mail exchange.
    Mx {
        /// Lower is preferred.
        preference: u16,
        /// Exchange host name.
        exchange: Name,
    },
    /// One or more character strings.
    Txt(Vec<Vec<u8>>),
    /// Start of authority.
    Soa {
        /// Primary nameserver.
        mname: Name,
        /// Responsible mailbox.
        rname: Name,
        /// Zone serial.
        serial: u32,
        /// Secondary refresh interval.
        refresh: u32,
        /// Retry interval.
        retry: u32,
        /// Expiry limit.
        expire: u32,
        /// Minimum / negative-caching TTL.
        minimum: u32,
    },
    /// Any type without a structured variant, kept verbatim.
    Other {
        /// The wire type code.
        rtype: u16,
        /// Raw RDATA bytes.
        data: Vec<u8>,
    },
}

impl Rdata {
    /// Reads RDATA of the given type from a message. `offset` is the start
    /// of the RDATA, `rdlen` its on-wire length. The full message is needed
    /// because names inside RDATA may use compression pointers.
    pub fn read(rtype: RecordType, msg: &[u8], offset: usize, rdlen: usize) -> Result<Self> {
        let end = offset + rdlen;
        if end > msg.len() {
            return Err(Error::short(offset, rdlen, msg.len().saturating_sub(offset)));
        }
        let raw = &msg[offset..end];

        match rtype {
            RecordType::A => {
                let bytes: [u8; 4] = raw
                    .try_into()
                    .map_err(|_| Error::BadRdataLen { rtype: "A", len: rdlen })?;
                Ok(Self::A(Ipv4Addr::from(bytes)))
            }
            RecordType::Aaaa => {
                let bytes: [u8; 16] = raw
                    .try_into()
                    .map_err(|_| Error::BadRdataLen { rtype: "AAAA", len: rdlen })?;
                Ok(Self::Aaaa(Ipv6Addr::from(bytes)))
            }
            RecordType::Ns => Ok(Self::Ns(Self::read_bounded_name(msg, offset, end)?)),
            RecordType::Cname => Ok(Self::Cname(Self::read_bounded_name(msg, offset, end)?)),
            RecordType::Ptr => Ok(Self::Ptr(Self::read_bounded_name(msg, offset, end)?)),
            RecordType::Mx => {
                if rdlen < 3 {
                    return Err(Error::BadRdataLen { rtype: "MX", len: rdlen });
                }
                let preference = u16::from_be_bytes([raw[0], raw[1]]);
                let exchange = Self::read_bounded_name(msg, offset + 2, end)?;
                Ok(Self::Mx {
                    preference,
                    exchange,
                })
            }
            RecordType::Txt => {
                let mut strings = Vec::new();
                let mut pos = 0;
                while pos < raw.len() {
                    let len = raw[pos] as usize;
                    pos += 1;
                    if pos + len > raw.len() {
                        return Err(Error::BadRdataLen { rtype: "TXT", len: rdlen });
                    }
                    strings.push(raw[pos..pos + len].to_vec());
                    pos += len;
                }
                Ok(Self::Txt(strings))
            }
            RecordType::Soa => {
                let (mname, used1) = Name::read(msg, offset)?;
                let (rname, used2) = Name::read(msg, offset + used1)?;
                let fixed = offset + used1 + used2;
                if fixed + 20 > end {
                    return Err(Error::RdataOverrun);
                }
                let word = |i: usize| {
                    u32::from_be_bytes([msg[i], msg[i + 1], msg[i + 2], msg[i + 3]])
                };
                Ok(Self::Soa {
                    mname,
                    rname,
                    serial: word(fixed),
                    refresh: word(fixed + 4),
                    retry: word(fixed + 8),
                    expire: word(fixed + 12),
                    minimum: word(fixed + 16),
                })
            }
            other => Ok(Self::Other {
                rtype: other.to_u16(),
                data: raw.to_vec(),
            }),
        }
    }

    /// Reads a name that must start inside `[offset, end)`; the name itself
    /// may chase pointers to earlier parts of the message.
    fn read_bounded_name(msg: &[u8], offset: usize, end: usize) -> Result<Name> {
        let (name, used) = Name::read(msg, offset)?;
        if offset + used > end {
            return Err(Error::RdataOverrun);
        }
        Ok(name)
    }

    /// The record type this data belongs to.
    pub fn rtype(&self) -> RecordType {
        match self {
            Self::A(_) => RecordType::A,
            Self::Aaaa(_) => RecordType::Aaaa,
            Self::Ns(_) => RecordType::Ns,
            Self::Cname(_) => RecordType::Cname,
            Self::Ptr(_) => RecordType::Ptr,
            Self::Mx { .. } => RecordType::Mx,
            Self::Txt(_) => RecordType::Txt,
            Self::Soa { .. } => RecordType::Soa,
            Self::Other { rtype, .. } => RecordType::from_u16(*rtype),
        }
    }

    /// Wire-format length (names written uncompressed).
    pub fn wire_len(&self) -> usize {
        match self {
            Self::A(_) => 4,
            Self::Aaaa(_) => 16,
            Self::Ns(n) | Self::Cname(n) | Self::Ptr(n) => n.wire_len(),
            Self::Mx { exchange, .. } => 2 + exchange.wire_len(),
            Self::Txt(strings) => strings.iter().map(|s| 1 + s.len()).sum(),
            Self::Soa { mname, rname, .. } => mname.wire_len() + rname.wire_len() + 20,
            Self::Other { data, .. } => data.len(),
        }
    }

    /// Appends the wire form to `buf`.
    pub fn write_to(&self, buf: &mut BytesMut) {
        match self {
            Self::A(addr) => buf.extend_from_slice(&addr.octets()),
            Self::Aaaa(addr) => buf.extend_from_slice(&addr.octets()),
            Self::Ns(n) | Self::Cname(n) | Self::Ptr(n) => n.write_to(buf),
            Self::Mx {
                preference,
                exchange,
            } => {
                buf.extend_from_slice(&preference.to_be_bytes());
                exchange.write_to(buf);
            }
            Self::Txt(strings) => {
                for s in strings {
                    buf.extend_from_slice(&[s.len() as u8]);
                    buf.extend_from_slice(s);
                }
            }
            Self::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                mname.write_to(buf);
                rname.write_to(buf);
                for v in [serial, refresh, retry, expire, minimum] {
                    buf.extend_from_slice(&v.to_be_bytes());
                }
            }
            Self::Other { data, .. } => buf.extend_from_slice(data),
        }
    }

    /// The IPv4 address, for A data.
    pub fn as_a(&self) -> Option<Ipv4Addr> {
        match self {
            Self::A(addr) => Some(*addr),
            _ => None,
        }
    }

    /// The IPv6 address, for AAAA data.
    pub fn as_aaaa(&self) -> Option<Ipv6Addr> {
        match self {
            Self::Aaaa(addr) => Some(*addr),
            _ => None,
        }
    }

    /// The alias target, for CNAME data.
    pub fn as_cname(&self) -> Option<&Name> {
        match self {
            Self::Cname(target) => Some(target),
            _ => None,
        }
    }

    /// The nameserver name, for NS data.
    pub fn as_ns(&self) -> Option<&Name> {
        match self {
            Self::Ns(host) => Some(host),
            _ => None,
        }
    }
}

impl fmt::Display for Rdata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A(addr) => write!(f, "{addr}"),
            Self::Aaaa(addr) => write!(f, "{addr}"),
            Self::Ns(n) | Self::Cname(n) | Self::Ptr(n) => write!(f, "{n}"),
            Self::Mx {
                preference,
                exchange,
            } => write!(f, "{preference} {exchange}"),
            Self::Txt(strings) => {
                for (i, s) in strings.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "\"{}\"", String::from_utf8_lossy(s))?;
                }
                Ok(())
            }
            Self::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{mname} {rname} {serial} {refresh} {retry} {expire} {minimum}"
            ),
            Self::Other { data, .. } => write!(f, "\\# {}", data.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn round_trip(rdata: &Rdata) {
        let mut buf = BytesMut::new();
        rdata.write_to(&mut buf);
        assert_eq!(buf.len(), rdata.wire_len());
        let parsed = Rdata::read(rdata.rtype(), &buf, 0, buf.len()).unwrap();
        assert_eq!(&parsed, rdata);
    }

    #[test]
    fn address_round_trips() {
        round_trip(&Rdata::A(Ipv4Addr::new(192, 0, 2, 1)));
        round_trip(&Rdata::Aaaa("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn name_bearing_round_trips() {
        round_trip(&Rdata::Ns(Name::from_str("ns1.example.com").unwrap()));
        round_trip(&Rdata::Cname(Name::from_str("target.example.com").unwrap()));
        round_trip(&Rdata::Mx {
            preference: 10,
            exchange: Name::from_str("mail.example.com").unwrap(),
        });
        round_trip(&Rdata::Soa {
            mname: Name::from_str("ns1.example.com").unwrap(),
            rname: Name::from_str("hostmaster.example.com").unwrap(),
            serial: 2024010100,
            refresh: 7200,
            retry: 900,
            expire: 1209600,
            minimum: 300,
        });
    }

    #[test]
    fn txt_round_trips() {
        round_trip(&Rdata::Txt(vec![b"hello".to_vec(), b"world".to_vec()]));
    }

    #[test]
    fn unknown_kept_verbatim() {
        let rdata = Rdata::Other {
            rtype: 999,
            data: vec![1, 2, 3, 4],
        };
        round_trip(&rdata);
    }

    #[test]
    fn a_length_checked() {
        let raw = [1u8, 2, 3];
        assert!(matches!(
            Rdata::read(RecordType::A, &raw, 0, 3),
            Err(Error::BadRdataLen { rtype: "A", .. })
        ));
    }
}
