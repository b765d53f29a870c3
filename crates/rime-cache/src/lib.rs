//! # rime-cache
//!
//! The shared resolver cache. Content is addressed by `(name, type, class)`
//! and comes in two shapes:
//!
//! - **whole messages** — a response's three record sections, stored under
//!   the question key, replayed into a caller-supplied message on a hit;
//! - **single RRsets** — every RRset seen in any section of an updated
//!   message, stored under the set's own key. This is the secondary probe
//!   the facade uses after a message miss, and it is what lets the
//!   nameserver address store find NS and glue data without its own fetches.
//!
//! Only `NOERROR` responses are stored; a stored entry therefore implies a
//! positive answer and carries no rcode of its own. Entries expire by the
//! minimum TTL of their records (clamped by [`CacheConfig`]) and are checked
//! for freshness at read time; capacity bounds are enforced by the
//! underlying `moka` caches.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entry;
pub mod key;

pub use entry::{MessageEntry, RrsetEntry};
pub use key::CacheKey;

use moka::sync::Cache;
use rime_proto::{Message, Name, RecordClass, RecordType, Rrset};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Cache sizing and TTL policy.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of stored whole messages.
    pub max_messages: u64,
    /// Maximum number of stored RRsets.
    pub max_rrsets: u64,
    /// Floor applied to entry lifetimes.
    pub min_ttl: Duration,
    /// Ceiling applied to entry lifetimes.
    pub max_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_messages: 100_000,
            max_rrsets: 250_000,
            min_ttl: Duration::from_secs(1),
            max_ttl: Duration::from_secs(86_400 * 7),
        }
    }
}

/// The process-wide resolver cache.
///
/// Shared by every running query via `Arc`; internally the maps are
/// concurrent, so no outer lock is needed.
pub struct ResolverCache {
    config: CacheConfig,
    messages: Cache<CacheKey, Arc<MessageEntry>>,
    rrsets: Cache<CacheKey, Arc<RrsetEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResolverCache {
    /// Creates a cache with the given policy.
    pub fn new(config: CacheConfig) -> Self {
        let messages = Cache::builder()
            .max_capacity(config.max_messages)
            .time_to_live(config.max_ttl)
            .build();
        let rrsets = Cache::builder()
            .max_capacity(config.max_rrsets)
            .time_to_live(config.max_ttl)
            .build();
        Self {
            config,
            messages,
            rrsets,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Creates a cache with default policy.
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Whole-message lookup. On a hit the stored sections are appended to
    /// `response` (TTLs decremented by age) and `true` is returned.
    pub fn fill_message(
        &self,
        name: &Name,
        rtype: RecordType,
        rclass: RecordClass,
        response: &mut Message,
    ) -> bool {
        let key = CacheKey::new(name, rtype, rclass);
        let Some(entry) = self.messages.get(&key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        let now = Instant::now();
        if entry.is_expired(now) {
            self.messages.invalidate(&key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        for r in entry.answers(now) {
            response.add_answer(r);
        }
        for r in entry.authority(now) {
            response.add_authority(r);
        }
        for r in entry.additional(now) {
            response.add_additional(r);
        }
        true
    }

    /// Single-RRset lookup, TTL decremented by age.
    pub fn rrset(&self, name: &Name, rtype: RecordType, rclass: RecordClass) -> Option<Rrset> {
        let key = CacheKey::new(name, rtype, rclass);
        let entry = self.rrsets.get(&key)?;

        let now = Instant::now();
        if entry.is_expired(now) {
            self.rrsets.invalidate(&key);
            return None;
        }
        Some(entry.rrset(now))
    }

    /// Inserts or refreshes from a response message.
    ///
    /// The whole message is stored under its question key, and every RRset
    /// from all three sections is stored under its own key. Overwrites are
    /// allowed; later data wins. Responses with an rcode other than
    /// `NOERROR` and responses with no records at all are not stored.
    pub fn update(&self, message: &Message) {
        if !message.rcode().is_no_error() {
            return;
        }
        let Some(question) = message.question() else {
            return;
        };

        let all: Vec<_> = message
            .answers()
            .iter()
            .chain(message.authority())
            .chain(message.additional())
            .cloned()
            .collect();
        if all.is_empty() {
            return;
        }

        let ttl = self.clamp_ttl(all.iter().map(|r| r.ttl).min().unwrap_or(0));
        trace!(question = %question, ttl = ?ttl, "cache update");

        let key = CacheKey::of_question(question);
        self.messages.insert(
            key,
            Arc::new(MessageEntry::new(
                message.answers().to_vec(),
                message.authority().to_vec(),
                message.additional().to_vec(),
                ttl,
            )),
        );

        for set in Rrset::group(&all) {
            let ttl = self.clamp_ttl(set.ttl);
            let key = CacheKey::new(&set.name, set.rtype, set.class);
            self.rrsets.insert(key, Arc::new(RrsetEntry::new(set, ttl)));
        }
    }

    /// Drops a stored message and RRset for the key, if present.
    pub fn evict(&self, name: &Name, rtype: RecordType, rclass: RecordClass) {
        let key = CacheKey::new(name, rtype, rclass);
        self.messages.invalidate(&key);
        self.rrsets.invalidate(&key);
    }

    /// Drops everything.
    pub fn clear(&self) {
        self.messages.invalidate_all();
        self.rrsets.invalidate_all();
    }

    /// Message-lookup hits so far.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Message-lookup misses so far.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn clamp_ttl(&self, ttl_secs: u32) -> Duration {
        Duration::from_secs(u64::from(ttl_secs))
            .max(self.config.min_ttl)
            .min(self.config.max_ttl)
    }
}

impl Default for ResolverCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}
