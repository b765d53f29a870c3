//! Response classification.
//!
//! Every response received while iterating is sorted into exactly one
//! category, which tells the state machine whether to finish, descend a
//! referral, keep following a CNAME chain, or give up. The walk over the
//! answer section follows CNAME links starting at the question name and
//! notes where the chain ends.

use rime_proto::{Message, Name, OpCode, Question, RecordType, ResponseCode, Rrset};
use std::collections::HashSet;

/// Longest CNAME chain followed before a resolution is abandoned.
pub const MAX_CNAME_CHAIN: u32 = 16;

/// What a response turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A direct answer to the question.
    Answer,
    /// An answer reached at the end of a CNAME chain contained in this
    /// same message.
    AnswerCname,
    /// A CNAME chain that ends without an answer; resolution continues at
    /// `target`. `hops` is the number of links walked in this message.
    Cname {
        /// Name the chain points at.
        target: Name,
        /// CNAME links consumed.
        hops: u32,
    },
    /// The name does not exist (RCODE NXDOMAIN).
    NxDomain,
    /// The name exists but has no data of the asked type (NOERROR, empty
    /// answer, SOA in authority).
    NxRrset,
    /// A delegation: no answer, NS records in authority.
    Referral,

    // Everything below is a protocol defect; the engine answers SERVFAIL.
    /// NOERROR with nothing in any useful section.
    Empty,
    /// Answer records unrelated to the question or left over after the
    /// chain walk.
    ExtraData,
    /// A record in the chain carries the wrong name or class.
    InvNameClass,
    /// A record at the chain head has an unexpected type.
    InvType,
    /// The echoed question differs from the one asked.
    MismatchedQuestion,
    /// Answer records span more than one class.
    MultiClass,
    /// The question section does not hold exactly one question.
    NotOneQuestion,
    /// The message is not a response at all.
    NotResponse,
    /// A CNAME RRset with more than one target.
    NotSingle,
    /// Unexpected opcode.
    OpCode,
    /// An error rcode other than NXDOMAIN.
    Rcode,
    /// The TC bit is set.
    Truncated,
}

impl Classification {
    /// True for the defect categories that terminate with SERVFAIL.
    pub fn is_error(&self) -> bool {
        !matches!(
            self,
            Self::Answer
                | Self::AnswerCname
                | Self::Cname { .. }
                | Self::NxDomain
                | Self::NxRrset
                | Self::Referral
        )
    }
}

/// Classifies `response` against `question`.
pub fn classify(question: &Question, response: &Message) -> Classification {
    if !response.is_response() {
        return Classification::NotResponse;
    }
    if response.header().opcode != OpCode::Query {
        return Classification::OpCode;
    }
    match response.rcode() {
        ResponseCode::NoError => {}
        ResponseCode::NxDomain => return Classification::NxDomain,
        _ => return Classification::Rcode,
    }
    if response.is_truncated() {
        return Classification::Truncated;
    }
    if response.questions().len() != 1 {
        return Classification::NotOneQuestion;
    }
    if !question.matches(&response.questions()[0]) {
        return Classification::MismatchedQuestion;
    }

    if response.answers().is_empty() {
        let authority = response.authority();
        if authority.is_empty() {
            return Classification::Empty;
        }
        if authority.iter().any(|r| r.rtype() == RecordType::Ns) {
            return Classification::Referral;
        }
        if authority.iter().any(|r| r.rtype() == RecordType::Soa) {
            return Classification::NxRrset;
        }
        // Authority data that is neither NS nor SOA; the engine's own NS
        // scan decides what to do with it.
        return Classification::Referral;
    }

    walk_answer(question, &Rrset::group(response.answers()))
}

/// Follows the CNAME chain through the answer RRsets.
fn walk_answer(question: &Question, sets: &[Rrset]) -> Classification {
    // One class across the whole answer section, and it must be the
    // question's.
    let mut classes: Vec<_> = sets.iter().map(|s| s.class).collect();
    classes.dedup();
    if classes.len() > 1 {
        return Classification::MultiClass;
    }
    if sets.iter().any(|s| s.class != question.qclass) {
        return Classification::InvNameClass;
    }

    let mut current = question.qname.clone();
    let mut hops = 0u32;
    let mut visited: HashSet<usize> = HashSet::new();

    loop {
        let here: Vec<usize> = sets
            .iter()
            .enumerate()
            .filter(|(_, s)| s.name == current)
            .map(|(i, _)| i)
            .collect();

        // The terminal answer: an RRset of the asked type (or anything,
        // for ANY) at the current chain position.
        let matching: Vec<usize> = here
            .iter()
            .copied()
            .filter(|&i| question.qtype == RecordType::Any || sets[i].rtype == question.qtype)
            .collect();
        if !matching.is_empty() {
            if visited.len() + matching.len() < sets.len() {
                return Classification::ExtraData;
            }
            return if hops == 0 {
                Classification::Answer
            } else {
                Classification::AnswerCname
            };
        }

        // Otherwise the chain may continue through a CNAME.
        let Some(&link) = here.iter().find(|&&i| sets[i].rtype == RecordType::Cname) else {
            if here.iter().any(|&i| !visited.contains(&i)) {
                // Data at this name, but neither the asked type nor a CNAME.
                return Classification::InvType;
            }
            return if hops == 0 {
                Classification::ExtraData
            } else {
                Classification::Cname {
                    target: current,
                    hops,
                }
            };
        };

        let set = &sets[link];
        if set.len() != 1 {
            return Classification::NotSingle;
        }
        if !visited.insert(link) || hops > MAX_CNAME_CHAIN {
            // A loop inside this one message; report the chain as
            // unfinished and let the engine's chain budget run out.
            return Classification::Cname {
                target: current,
                hops,
            };
        }

        current = set.rdata[0]
            .as_cname()
            .expect("cname rrset holds cname rdata")
            .clone();
        hops += 1;
    }
}
