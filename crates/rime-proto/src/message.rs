//! Whole DNS messages.

use crate::error::{Error, Result};
use crate::header::{Flags, Header, HEADER_LEN};
use crate::question::Question;
use crate::rcode::ResponseCode;
use crate::record::{read_section, Record};
use crate::rtype::RecordType;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A DNS message: header, question and the three record sections.
///
/// The section counts in the header are recomputed when the message is
/// written, so mutators do not need to keep them in sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    header: Header,
    questions: Vec<Question>,
    answers: Vec<Record>,
    authority: Vec<Record>,
    additional: Vec<Record>,
}

impl PartialEq for Message {
    /// Structural equality: ids, flags, codes and sections. The header's
    /// section counts are derived at write time and do not participate.
    fn eq(&self, other: &Self) -> bool {
        self.header.id == other.header.id
            && self.header.flags == other.header.flags
            && self.header.opcode == other.header.opcode
            && self.header.rcode == other.header.rcode
            && self.questions == other.questions
            && self.answers == other.answers
            && self.authority == other.authority
            && self.additional == other.additional
    }
}

impl Eq for Message {}

impl Message {
    /// A query message carrying one question, RD set, id zero (the
    /// transport assigns a random id at send time).
    pub fn query(question: Question) -> Self {
        Self {
            header: Header::query(0),
            questions: vec![question],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// An empty response mirroring `query`: same id, opcode and question.
    pub fn response_to(query: &Message) -> Self {
        Self {
            header: Header::response_to(&query.header),
            questions: query.questions.clone(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// An empty response to a bare question, used when assembling an answer
    /// that was never sent as a wire query.
    pub fn answer_shell(question: Question) -> Self {
        let mut header = Header::query(0);
        header.flags |= Flags::QR | Flags::RA;
        Self {
            header,
            questions: vec![question],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Header access
    // ------------------------------------------------------------------

    /// The header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Mutable header access.
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// The message id.
    pub fn id(&self) -> u16 {
        self.header.id
    }

    /// Sets the message id.
    pub fn set_id(&mut self, id: u16) {
        self.header.id = id;
    }

    /// The response code.
    pub fn rcode(&self) -> ResponseCode {
        self.header.rcode
    }

    /// Sets the response code.
    pub fn set_rcode(&mut self, rcode: ResponseCode) {
        self.header.rcode = rcode;
    }

    /// True for a response message.
    pub fn is_response(&self) -> bool {
        self.header.is_response()
    }

    /// True if the TC bit is set.
    pub fn is_truncated(&self) -> bool {
        self.header.is_truncated()
    }

    // ------------------------------------------------------------------
    // Sections
    // ------------------------------------------------------------------

    /// The question section.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// The first question, if any.
    pub fn question(&self) -> Option<&Question> {
        self.questions.first()
    }

    /// Replaces the question section with a single question.
    pub fn set_question(&mut self, question: Question) {
        self.questions = vec![question];
    }

    /// The answer section.
    pub fn answers(&self) -> &[Record] {
        &self.answers
    }

    /// The authority section.
    pub fn authority(&self) -> &[Record] {
        &self.authority
    }

    /// The additional section.
    pub fn additional(&self) -> &[Record] {
        &self.additional
    }

    /// Appends an answer record.
    pub fn add_answer(&mut self, record: Record) {
        self.answers.push(record);
    }

    /// Appends an authority record.
    pub fn add_authority(&mut self, record: Record) {
        self.authority.push(record);
    }

    /// Appends an additional record.
    pub fn add_additional(&mut self, record: Record) {
        self.additional.push(record);
    }

    /// Appends `other`'s answer section to this message's answer section.
    /// Used while accumulating a CNAME chain.
    pub fn append_answers(&mut self, other: &Message) {
        self.answers.extend(other.answers.iter().cloned());
    }

    /// Copies `other`'s rcode and record sections into this message,
    /// keeping this message's id and question. Records already present in
    /// the answer section (an accumulated CNAME prefix) stay in front.
    pub fn absorb_response(&mut self, other: &Message) {
        self.header.rcode = other.header.rcode;
        self.answers.extend(other.answers.iter().cloned());
        self.authority = other.authority.clone();
        self.additional = other.additional.clone();
    }

    /// Clears all record sections and sets an error rcode. The question is
    /// preserved so the caller still sees what was asked.
    pub fn make_error(&mut self, rcode: ResponseCode) {
        self.answers.clear();
        self.authority.clear();
        self.additional.clear();
        self.header.rcode = rcode;
    }

    /// Answer records of the given type.
    pub fn answers_of_type(&self, rtype: RecordType) -> impl Iterator<Item = &Record> {
        self.answers.iter().filter(move |r| r.rtype() == rtype)
    }

    // ------------------------------------------------------------------
    // Wire format
    // ------------------------------------------------------------------

    /// Parses a message from wire bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = Header::parse(data)?;

        let mut offset = HEADER_LEN;
        let mut questions = Vec::with_capacity(header.qd_count as usize);
        for _ in 0..header.qd_count {
            let (q, used) = Question::read(data, offset)?;
            offset += used;
            questions.push(q);
        }

        let (answers, offset) = read_section(data, offset, header.an_count)?;
        let (authority, offset) = read_section(data, offset, header.ns_count)?;
        let (additional, offset) = read_section(data, offset, header.ar_count)?;

        if offset != data.len() {
            return Err(Error::TrailingBytes {
                len: data.len() - offset,
            });
        }

        Ok(Self {
            header,
            questions,
            answers,
            authority,
            additional,
        })
    }

    /// Appends the wire form to `buf`, with section counts taken from the
    /// sections themselves.
    pub fn write_to(&self, buf: &mut BytesMut) {
        let mut header = self.header.clone();
        header.qd_count = self.questions.len() as u16;
        header.an_count = self.answers.len() as u16;
        header.ns_count = self.authority.len() as u16;
        header.ar_count = self.additional.len() as u16;
        header.write_to(buf);

        for q in &self.questions {
            q.write_to(buf);
        }
        for r in self
            .answers
            .iter()
            .chain(&self.authority)
            .chain(&self.additional)
        {
            r.write_to(buf);
        }
    }

    /// The message as wire bytes.
    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(
            HEADER_LEN
                + self.questions.iter().map(Question::wire_len).sum::<usize>()
                + self
                    .answers
                    .iter()
                    .chain(&self.authority)
                    .chain(&self.additional)
                    .map(Record::wire_len)
                    .sum::<usize>(),
        );
        self.write_to(&mut buf);
        buf.freeze()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ";; {}", self.header)?;
        for q in &self.questions {
            writeln!(f, ";; question: {q}")?;
        }
        for (label, section) in [
            ("answer", &self.answers),
            ("authority", &self.authority),
            ("additional", &self.additional),
        ] {
            for r in section.iter() {
                writeln!(f, ";; {label}: {r}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn question() -> Question {
        Question::a(Name::from_str("example.com").unwrap())
    }

    #[test]
    fn query_round_trip() {
        let mut query = Message::query(question());
        query.set_id(0x1234);

        let wire = query.to_wire();
        let parsed = Message::parse(&wire).unwrap();

        assert_eq!(parsed.id(), 0x1234);
        assert!(!parsed.is_response());
        assert_eq!(parsed.questions().len(), 1);
        assert_eq!(parsed.question().unwrap(), &question());
    }

    #[test]
    fn response_round_trip() {
        let query = Message::query(question());
        let mut response = Message::response_to(&query);
        response.add_answer(Record::a(
            Name::from_str("example.com").unwrap(),
            300,
            Ipv4Addr::new(192, 0, 2, 1),
        ));
        response.add_authority(Record::ns(
            Name::from_str("example.com").unwrap(),
            3600,
            Name::from_str("ns1.example.com").unwrap(),
        ));

        let wire = response.to_wire();
        let parsed = Message::parse(&wire).unwrap();

        assert!(parsed.is_response());
        assert_eq!(parsed.answers().len(), 1);
        assert_eq!(parsed.authority().len(), 1);
        assert_eq!(parsed, response);
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut wire = Message::query(question()).to_wire().to_vec();
        wire.push(0);
        assert!(matches!(
            Message::parse(&wire),
            Err(Error::TrailingBytes { len: 1 })
        ));
    }

    #[test]
    fn absorb_keeps_accumulated_answers() {
        let mut assembled = Message::answer_shell(question());
        assembled.add_answer(Record::cname(
            Name::from_str("example.com").unwrap(),
            60,
            Name::from_str("target.example.net").unwrap(),
        ));

        let mut upstream = Message::response_to(&Message::query(question()));
        upstream.add_answer(Record::a(
            Name::from_str("target.example.net").unwrap(),
            60,
            Ipv4Addr::new(192, 0, 2, 7),
        ));

        assembled.absorb_response(&upstream);
        assert_eq!(assembled.answers().len(), 2);
        assert_eq!(assembled.answers()[0].rtype(), RecordType::Cname);
    }

    #[test]
    fn make_error_clears_sections() {
        let mut msg = Message::answer_shell(question());
        msg.add_answer(Record::a(
            Name::from_str("example.com").unwrap(),
            300,
            Ipv4Addr::new(192, 0, 2, 1),
        ));
        msg.make_error(ResponseCode::ServFail);

        assert_eq!(msg.rcode(), ResponseCode::ServFail);
        assert!(msg.answers().is_empty());
        assert_eq!(msg.questions().len(), 1);
    }
}
