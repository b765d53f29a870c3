//! # rime-proto
//!
//! DNS wire-format types for the rime resolver: domain names, messages,
//! questions, resource records and the record-data variants the resolver
//! actually touches. Parsing handles compression pointers; serialization
//! writes uncompressed names.
//!
//! The types here follow RFC 1035. EDNS(0) is not modeled: an OPT pseudo-RR
//! in the additional section parses as an opaque record and is otherwise
//! ignored.
//!
//! ## Example
//!
//! ```rust
//! use rime_proto::{Message, Name, Question, RecordClass, RecordType};
//! use std::str::FromStr;
//!
//! let question = Question::new(
//!     Name::from_str("example.com.").unwrap(),
//!     RecordType::A,
//!     RecordClass::In,
//! );
//! let query = Message::query(question);
//! let wire = query.to_wire();
//! let parsed = Message::parse(&wire).unwrap();
//! assert_eq!(parsed.id(), query.id());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod class;
pub mod error;
pub mod header;
pub mod message;
pub mod name;
pub mod question;
pub mod rcode;
pub mod rdata;
pub mod record;
pub mod rtype;

pub use class::RecordClass;
pub use error::{Error, Result};
pub use header::{Flags, Header, OpCode};
pub use message::Message;
pub use name::Name;
pub use question::Question;
pub use rcode::ResponseCode;
pub use rdata::Rdata;
pub use record::{Record, Rrset};
pub use rtype::RecordType;

/// Maximum length of a single label, per RFC 1035.
pub const MAX_LABEL_LEN: usize = 63;

/// Maximum wire-format length of a domain name, per RFC 1035.
pub const MAX_NAME_LEN: usize = 255;

/// Well-known DNS port.
pub const DNS_PORT: u16 = 53;
