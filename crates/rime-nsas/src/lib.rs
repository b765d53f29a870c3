//! # rime-nsas
//!
//! The nameserver address store: resolves a zone name to a concrete server
//! address and remembers how each address has performed.
//!
//! The store is seeded with root server addresses and learns everything else
//! from the shared resolver cache — when the engine caches a referral, the
//! NS RRset and its glue become visible here on the next lookup for that
//! zone. The store keeps no reference back to any query; callers that lose
//! interest simply drop the `find` future.
//!
//! Every handed-out [`NameserverAddress`] shares the store's RTT slot for
//! that address, so `update_rtt` and `mark_unreachable` feed future server
//! selection across all queries.

#![warn(missing_docs)]
#![warn(clippy::all)]

use dashmap::DashMap;
use parking_lot::RwLock;
use rime_cache::{CacheKey, ResolverCache};
use rime_proto::{Name, RecordClass, RecordType};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// RTT value marking an address that failed to answer.
pub const RTT_UNREACHABLE: u32 = u32::MAX;

/// RTT value for an address that has never been tried.
const RTT_UNTRIED: u32 = 0;

/// One known server address with its RTT memory.
#[derive(Debug)]
pub struct AddressEntry {
    addr: SocketAddr,
    /// Smoothed RTT in milliseconds; 0 = untried, `RTT_UNREACHABLE` = dead.
    rtt: AtomicU32,
}

impl AddressEntry {
    fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            rtt: AtomicU32::new(RTT_UNTRIED),
        }
    }

    /// The server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The current smoothed RTT in milliseconds.
    pub fn rtt(&self) -> u32 {
        self.rtt.load(Ordering::Relaxed)
    }

    /// Folds a measured RTT into the smoothed value (7/8 old, 1/8 new).
    /// A first measurement, or one after the address was marked
    /// unreachable, replaces the stored value outright.
    pub fn update_rtt(&self, ms: u32) {
        let ms = ms.max(1);
        let current = self.rtt.load(Ordering::Relaxed);
        let next = if current == RTT_UNTRIED || current == RTT_UNREACHABLE {
            ms
        } else {
            ((u64::from(current) * 7 + u64::from(ms)) / 8) as u32
        };
        self.rtt.store(next, Ordering::Relaxed);
    }

    /// Marks the address as not answering.
    pub fn mark_unreachable(&self) {
        self.rtt.store(RTT_UNREACHABLE, Ordering::Relaxed);
    }

    /// True once [`mark_unreachable`](Self::mark_unreachable) was called and
    /// no successful RTT has been recorded since.
    pub fn is_unreachable(&self) -> bool {
        self.rtt.load(Ordering::Relaxed) == RTT_UNREACHABLE
    }
}

/// A selected nameserver address, handed to the engine for one fetch.
///
/// Cloneable handle; RTT updates land in the store's shared entry.
#[derive(Debug, Clone)]
pub struct NameserverAddress {
    entry: Arc<AddressEntry>,
}

impl NameserverAddress {
    /// The address to send to.
    pub fn addr(&self) -> SocketAddr {
        self.entry.addr()
    }

    /// Records a measured round trip, milliseconds.
    pub fn update_rtt(&self, ms: u32) {
        self.entry.update_rtt(ms);
    }

    /// Records that the address did not answer.
    pub fn mark_unreachable(&self) {
        self.entry.mark_unreachable();
    }
}

/// Addresses known for one zone.
#[derive(Debug, Default)]
struct ZoneServers {
    servers: RwLock<Vec<Arc<AddressEntry>>>,
}

impl ZoneServers {
    fn from_addrs(addrs: impl IntoIterator<Item = SocketAddr>) -> Self {
        Self {
            servers: RwLock::new(addrs.into_iter().map(|a| Arc::new(AddressEntry::new(a))).collect()),
        }
    }

    /// Picks the reachable entry with the lowest RTT; untried entries sort
    /// first because their RTT is zero.
    fn select(&self) -> Option<NameserverAddress> {
        let servers = self.servers.read();
        servers
            .iter()
            .filter(|e| !e.is_unreachable())
            .min_by_key(|e| e.rtt())
            .map(|entry| NameserverAddress {
                entry: Arc::clone(entry),
            })
    }
}

/// The process-wide nameserver address store.
pub struct NameserverAddressStore {
    cache: Arc<ResolverCache>,
    roots: ZoneServers,
    zones: DashMap<CacheKey, Arc<ZoneServers>>,
}

impl NameserverAddressStore {
    /// Creates a store reading NS and glue data from `cache`, seeded with
    /// the given root server addresses.
    pub fn new(cache: Arc<ResolverCache>, roots: impl IntoIterator<Item = SocketAddr>) -> Self {
        Self {
            cache,
            roots: ZoneServers::from_addrs(roots),
            zones: DashMap::new(),
        }
    }

    /// Resolves `zone` to one server address, or `None` when every known
    /// address is unreachable or nothing is known at all.
    ///
    /// At most one `find` should be outstanding per running query; dropping
    /// the future is the cancellation path.
    pub async fn find(&self, zone: &Name, class: RecordClass) -> Option<NameserverAddress> {
        if zone.is_root() {
            let picked = self.roots.select();
            trace!(zone = %zone, found = picked.is_some(), "root server selection");
            return picked;
        }

        let key = CacheKey::new(zone, RecordType::Ns, class);
        if let Some(known) = self.zones.get(&key) {
            if let Some(picked) = known.select() {
                return Some(picked);
            }
            // Everything we knew is dead; fall through and re-learn.
            drop(known);
            self.zones.remove(&key);
        }

        let learned = self.learn(zone, class)?;
        let picked = learned.select();
        debug!(zone = %zone, found = picked.is_some(), "learned nameservers from cache");
        self.zones.insert(key, learned);
        picked
    }

    /// Builds the server list for `zone` from cached NS and address data.
    fn learn(&self, zone: &Name, class: RecordClass) -> Option<Arc<ZoneServers>> {
        let ns_set = self.cache.rrset(zone, RecordType::Ns, class)?;

        let mut addrs = Vec::new();
        for rdata in &ns_set.rdata {
            let Some(host) = rdata.as_ns() else { continue };
            if let Some(a_set) = self.cache.rrset(host, RecordType::A, class) {
                addrs.extend(
                    a_set
                        .rdata
                        .iter()
                        .filter_map(|r| r.as_a())
                        .map(|ip| SocketAddr::from((ip, rime_proto::DNS_PORT))),
                );
            }
            if let Some(aaaa_set) = self.cache.rrset(host, RecordType::Aaaa, class) {
                addrs.extend(
                    aaaa_set
                        .rdata
                        .iter()
                        .filter_map(|r| r.as_aaaa())
                        .map(|ip| SocketAddr::from((ip, rime_proto::DNS_PORT))),
                );
            }
        }

        if addrs.is_empty() {
            return None;
        }
        Some(Arc::new(ZoneServers::from_addrs(addrs)))
    }

    /// Number of zones with learned server lists (excluding the root).
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rime_proto::{Message, Question, Record};
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn store_with_root(root: &str) -> NameserverAddressStore {
        let cache = Arc::new(ResolverCache::with_defaults());
        NameserverAddressStore::new(cache, vec![root.parse().unwrap()])
    }

    #[tokio::test]
    async fn root_selection_uses_seeds() {
        let store = store_with_root("198.41.0.4:53");
        let picked = store.find(&Name::root(), RecordClass::In).await.unwrap();
        assert_eq!(picked.addr(), "198.41.0.4:53".parse().unwrap());
    }

    #[tokio::test]
    async fn unknown_zone_is_unreachable() {
        let store = store_with_root("198.41.0.4:53");
        let zone = Name::from_str("example.com").unwrap();
        assert!(store.find(&zone, RecordClass::In).await.is_none());
    }

    #[tokio::test]
    async fn learns_from_cached_referral() {
        let cache = Arc::new(ResolverCache::with_defaults());
        let store =
            NameserverAddressStore::new(Arc::clone(&cache), vec!["198.41.0.4:53".parse().unwrap()]);

        // Cache a referral: com. NS a.gtld. with glue.
        let q = Question::a(Name::from_str("host.example.com").unwrap());
        let mut referral = Message::response_to(&Message::query(q));
        let zone = Name::from_str("com").unwrap();
        let ns_host = Name::from_str("a.gtld").unwrap();
        referral.add_authority(Record::ns(zone.clone(), 172800, ns_host.clone()));
        referral.add_additional(Record::a(ns_host, 172800, Ipv4Addr::new(192, 5, 6, 30)));
        cache.update(&referral);

        let picked = store.find(&zone, RecordClass::In).await.unwrap();
        assert_eq!(picked.addr(), "192.5.6.30:53".parse().unwrap());
        assert_eq!(store.zone_count(), 1);
    }

    #[tokio::test]
    async fn unreachable_addresses_skipped() {
        let cache = Arc::new(ResolverCache::with_defaults());
        let store =
            NameserverAddressStore::new(Arc::clone(&cache), vec!["198.41.0.4:53".parse().unwrap()]);

        let q = Question::a(Name::from_str("host.example.com").unwrap());
        let mut referral = Message::response_to(&Message::query(q));
        let zone = Name::from_str("example.com").unwrap();
        for (ns, ip) in [("ns1.example.com", [192, 0, 2, 1]), ("ns2.example.com", [192, 0, 2, 2])] {
            let host = Name::from_str(ns).unwrap();
            referral.add_authority(Record::ns(zone.clone(), 3600, host.clone()));
            referral.add_additional(Record::a(host, 3600, Ipv4Addr::from(ip)));
        }
        cache.update(&referral);

        let first = store.find(&zone, RecordClass::In).await.unwrap();
        first.mark_unreachable();

        let second = store.find(&zone, RecordClass::In).await.unwrap();
        assert_ne!(first.addr(), second.addr());

        second.mark_unreachable();
        // With both dead and the cache unchanged, relearning finds the same
        // dead pair as fresh entries.
        assert!(store.find(&zone, RecordClass::In).await.is_some());
    }

    #[tokio::test]
    async fn rtt_steers_selection() {
        let store = store_with_root("198.41.0.4:53");
        {
            let mut servers = store.roots.servers.write();
            servers.push(Arc::new(AddressEntry::new("199.9.14.201:53".parse().unwrap())));
        }

        // Make the first seed slow, the second fast.
        let slow = store.find(&Name::root(), RecordClass::In).await.unwrap();
        slow.update_rtt(500);
        let next = store.find(&Name::root(), RecordClass::In).await.unwrap();
        // Untried entry (rtt 0) wins over the measured 500ms one.
        assert_eq!(next.addr(), "199.9.14.201:53".parse().unwrap());
        next.update_rtt(10);

        let preferred = store.find(&Name::root(), RecordClass::In).await.unwrap();
        assert_eq!(preferred.addr(), "199.9.14.201:53".parse().unwrap());
    }

    #[test]
    fn rtt_moving_average() {
        let entry = AddressEntry::new("192.0.2.1:53".parse().unwrap());
        entry.update_rtt(100);
        assert_eq!(entry.rtt(), 100);
        entry.update_rtt(200);
        // (100*7 + 200) / 8 = 112
        assert_eq!(entry.rtt(), 112);

        entry.mark_unreachable();
        assert!(entry.is_unreachable());
        entry.update_rtt(50);
        assert_eq!(entry.rtt(), 50);
    }
}
