//! Domain names.
//!
//! A [`Name`] is stored in uncompressed wire form: a run of length-prefixed
//! labels terminated by the zero-length root label. Comparison and hashing
//! are case-insensitive, as DNS requires.

use crate::error::{Error, Result};
use crate::{MAX_LABEL_LEN, MAX_NAME_LEN};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Maximum number of compression-pointer jumps tolerated while reading a
/// single name out of a message.
const MAX_POINTER_JUMPS: usize = 32;

/// A DNS domain name.
///
/// Names compare equal ignoring ASCII case:
///
/// ```rust
/// use rime_proto::Name;
/// use std::str::FromStr;
///
/// let a = Name::from_str("Example.COM").unwrap();
/// let b = Name::from_str("example.com").unwrap();
/// assert_eq!(a, b);
/// ```
#[derive(Clone)]
pub struct Name {
    /// Uncompressed wire form, always ending with the root label.
    wire: SmallVec<[u8; 32]>,
}

impl Name {
    /// The root name, `.`.
    pub fn root() -> Self {
        let mut wire = SmallVec::new();
        wire.push(0);
        Self { wire }
    }

    /// Returns true for the root name.
    pub fn is_root(&self) -> bool {
        self.wire.len() == 1
    }

    /// The name's uncompressed wire form, including the terminating root
    /// label.
    pub fn as_wire(&self) -> &[u8] {
        &self.wire
    }

    /// Wire-format length in bytes.
    pub fn wire_len(&self) -> usize {
        self.wire.len()
    }

    /// Builds a name from uncompressed wire bytes.
    pub fn from_wire(bytes: &[u8]) -> Result<Self> {
        let mut pos = 0;
        loop {
            let len = *bytes
                .get(pos)
                .ok_or_else(|| Error::short(pos, 1, bytes.len().saturating_sub(pos)))?
                as usize;
            if len == 0 {
                pos += 1;
                break;
            }
            if len > MAX_LABEL_LEN {
                return Err(Error::LabelTooLong { len });
            }
            pos += 1 + len;
            if pos > bytes.len() {
                return Err(Error::short(pos, 0, bytes.len()));
            }
            if pos > MAX_NAME_LEN {
                return Err(Error::NameTooLong { len: pos });
            }
        }
        Ok(Self {
            wire: SmallVec::from_slice(&bytes[..pos]),
        })
    }

    /// Iterates over the labels, leftmost first, excluding the root label.
    pub fn labels(&self) -> Labels<'_> {
        Labels {
            wire: &self.wire,
            pos: 0,
        }
    }

    /// Number of labels, excluding the root label.
    pub fn label_count(&self) -> usize {
        self.labels().count()
    }

    /// The name with its leftmost label removed, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let first = self.wire[0] as usize;
        Some(Self {
            wire: SmallVec::from_slice(&self.wire[1 + first..]),
        })
    }

    /// True if `self` equals `other` or sits below it in the tree.
    pub fn is_subdomain_of(&self, other: &Name) -> bool {
        let mine: Vec<&[u8]> = self.labels().collect();
        let theirs: Vec<&[u8]> = other.labels().collect();
        if mine.len() < theirs.len() {
            return false;
        }
        mine.iter()
            .rev()
            .zip(theirs.iter().rev())
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    /// Lowercases the name in place.
    pub fn make_lowercase(&mut self) {
        self.wire.iter_mut().for_each(u8::make_ascii_lowercase);
    }

    /// Returns a lowercased copy.
    #[must_use]
    pub fn lowercased(&self) -> Self {
        let mut copy = self.clone();
        copy.make_lowercase();
        copy
    }

    /// Appends the wire form to `buf`.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.wire);
    }

    /// Reads a possibly-compressed name out of a full message.
    ///
    /// `start` is the offset of the first length byte. Returns the name and
    /// the number of bytes the name occupies at `start` (a pointer counts as
    /// two bytes; the jumped-to data counts for nothing).
    pub fn read(msg: &[u8], start: usize) -> Result<(Self, usize)> {
        let mut wire: SmallVec<[u8; 32]> = SmallVec::new();
        let mut pos = start;
        let mut consumed = None;
        let mut jumps = 0;

        loop {
            let byte = *msg
                .get(pos)
                .ok_or_else(|| Error::short(pos, 1, msg.len().saturating_sub(pos)))?;
            match byte {
                0 => {
                    wire.push(0);
                    if consumed.is_none() {
                        consumed = Some(pos + 1 - start);
                    }
                    break;
                }
                len @ 1..=63 => {
                    let len = len as usize;
                    let end = pos + 1 + len;
                    if end > msg.len() {
                        return Err(Error::short(pos + 1, len, msg.len() - pos - 1));
                    }
                    wire.push(byte);
                    wire.extend_from_slice(&msg[pos + 1..end]);
                    if wire.len() + 1 > MAX_NAME_LEN {
                        return Err(Error::NameTooLong { len: wire.len() + 1 });
                    }
                    pos = end;
                }
                byte if byte & 0xC0 == 0xC0 => {
                    let low = *msg
                        .get(pos + 1)
                        .ok_or_else(|| Error::short(pos + 1, 1, 0))?;
                    let target = usize::from(byte & 0x3F) << 8 | usize::from(low);
                    if target >= pos {
                        return Err(Error::BadPointer { offset: pos });
                    }
                    if consumed.is_none() {
                        consumed = Some(pos + 2 - start);
                    }
                    jumps += 1;
                    if jumps > MAX_POINTER_JUMPS {
                        return Err(Error::PointerChain);
                    }
                    pos = target;
                }
                byte => {
                    return Err(Error::ReservedLabelType { byte, offset: pos });
                }
            }
        }

        Ok((Self { wire }, consumed.expect("set on terminator")))
    }
}

impl FromStr for Name {
    type Err = Error;

    /// Parses dotted presentation format. A missing trailing dot is implied.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s == "." {
            return Ok(Self::root());
        }
        let s = s.strip_suffix('.').unwrap_or(s);

        let mut wire: SmallVec<[u8; 32]> = SmallVec::new();
        for label in s.split('.') {
            if label.len() > MAX_LABEL_LEN {
                return Err(Error::LabelTooLong { len: label.len() });
            }
            if let Some(ch) = label
                .chars()
                .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '*'))
            {
                return Err(Error::BadLabelChar { ch });
            }
            wire.push(label.len() as u8);
            wire.extend_from_slice(label.as_bytes());
        }
        wire.push(0);
        if wire.len() > MAX_NAME_LEN {
            return Err(Error::NameTooLong { len: wire.len() });
        }
        Ok(Self { wire })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for label in self.labels() {
            for &b in label {
                if b.is_ascii_graphic() && b != b'.' {
                    write!(f, "{}", b as char)?;
                } else {
                    write!(f, "\\{:03}", b)?;
                }
            }
            f.write_str(".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({self})")
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.wire.eq_ignore_ascii_case(&other.wire)
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for &b in self.wire.iter() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::root()
    }
}

impl Serialize for Name {
    fn serialize<S: serde::Serializer>(&self, ser: S) -> std::result::Result<S::Ok, S::Error> {
        ser.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(de)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Iterator over a name's labels as raw byte slices.
pub struct Labels<'a> {
    wire: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Labels<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let len = *self.wire.get(self.pos)? as usize;
        if len == 0 {
            return None;
        }
        let start = self.pos + 1;
        self.pos = start + len;
        Some(&self.wire[start..start + len])
    }
}
