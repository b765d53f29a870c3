//! Stored cache values.

use rime_proto::{Record, Rrset};
use std::time::{Duration, Instant};

/// A whole cached response: the three record sections of a message, plus
/// freshness bookkeeping.
#[derive(Debug, Clone)]
pub struct MessageEntry {
    answers: Vec<Record>,
    authority: Vec<Record>,
    additional: Vec<Record>,
    cached_at: Instant,
    ttl: Duration,
}

impl MessageEntry {
    /// Creates an entry; `ttl` should already be clamped by the cache.
    pub fn new(
        answers: Vec<Record>,
        authority: Vec<Record>,
        additional: Vec<Record>,
        ttl: Duration,
    ) -> Self {
        Self {
            answers,
            authority,
            additional,
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// True once the entry's TTL has run out.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.cached_at) >= self.ttl
    }

    /// Seconds of age, saturating at the TTL.
    fn age_secs(&self, now: Instant) -> u32 {
        now.duration_since(self.cached_at).as_secs().min(u64::from(u32::MAX)) as u32
    }

    /// The answer section with TTLs decremented by age.
    pub fn answers(&self, now: Instant) -> Vec<Record> {
        Self::aged(&self.answers, self.age_secs(now))
    }

    /// The authority section with TTLs decremented by age.
    pub fn authority(&self, now: Instant) -> Vec<Record> {
        Self::aged(&self.authority, self.age_secs(now))
    }

    /// The additional section with TTLs decremented by age.
    pub fn additional(&self, now: Instant) -> Vec<Record> {
        Self::aged(&self.additional, self.age_secs(now))
    }

    fn aged(records: &[Record], age: u32) -> Vec<Record> {
        records
            .iter()
            .map(|r| r.with_ttl(r.ttl.saturating_sub(age)))
            .collect()
    }
}

/// A single cached RRset.
#[derive(Debug, Clone)]
pub struct RrsetEntry {
    rrset: Rrset,
    cached_at: Instant,
    ttl: Duration,
}

impl RrsetEntry {
    /// Creates an entry; `ttl` should already be clamped by the cache.
    pub fn new(rrset: Rrset, ttl: Duration) -> Self {
        Self {
            rrset,
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// True once the entry's TTL has run out.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.cached_at) >= self.ttl
    }

    /// The stored set with its TTL decremented by age.
    pub fn rrset(&self, now: Instant) -> Rrset {
        let age = now
            .duration_since(self.cached_at)
            .as_secs()
            .min(u64::from(u32::MAX)) as u32;
        let mut set = self.rrset.clone();
        set.ttl = set.ttl.saturating_sub(age);
        set
    }
}
