//! # rime-resolver
//!
//! A recursive DNS resolver engine. Given a question it answers from the
//! shared cache when it can, and otherwise walks the delegation tree from
//! the root (or hands the question to a configured upstream in forwarding
//! mode), honoring three timeout regimes and a bounded retry budget.
//!
//! ## Shape
//!
//! - [`Recursor`] is the entry point: [`Recursor::resolve`] for async
//!   callers, [`Recursor::resolve_into`] to deliver through an
//!   [`AnswerSink`].
//! - Each cache-missing question runs as its own task (the `query` module),
//!   multiplexed on the tokio runtime, sharing the cache and the nameserver
//!   address store with every other in-flight resolution.
//! - The caller sees exactly one delivery per question, even when the
//!   client deadline forces a provisional SERVFAIL before the real answer
//!   arrives; the late answer still updates the cache.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rime_cache::ResolverCache;
//! use rime_proto::{Name, Question};
//! use rime_resolver::{Recursor, RecursorConfig};
//! use std::str::FromStr;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), rime_resolver::ResolveError> {
//! let cache = Arc::new(ResolverCache::with_defaults());
//! let config = RecursorConfig {
//!     upstream: vec!["192.0.2.1:53".parse().unwrap()],
//!     ..RecursorConfig::default()
//! };
//! let recursor = Recursor::new(config, cache);
//!
//! let question = Question::a(Name::from_str("example.com.").unwrap());
//! let answer = recursor.resolve(&question).await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod fetch;
mod query;

pub use classify::{classify, Classification, MAX_CNAME_CHAIN};
pub use fetch::{FetchOutcome, Transport, UdpTransport};

use query::{drive, RunningQuery};
use rime_cache::ResolverCache;
use rime_nsas::NameserverAddressStore;
use rime_proto::{Message, Question, ResponseCode};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// Resolution failed with nothing to deliver.
///
/// Per the engine's error policy almost every internal failure is delivered
/// as a SERVFAIL *message*; this error is reserved for the paths that give
/// up without an answer (lookup deadline, no reachable nameserver).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The query was abandoned before any answer could be produced.
    #[error("resolution abandoned without an answer")]
    Abandoned,
}

/// Construction-time resolver options.
#[derive(Debug, Clone)]
pub struct RecursorConfig {
    /// Upstream resolvers. Non-empty switches the engine to forwarding
    /// mode: every query goes verbatim to a random entry.
    pub upstream: Vec<SocketAddr>,
    /// Root servers seeding recursive mode.
    pub upstream_root: Vec<SocketAddr>,
    /// Per-fetch deadline. `None` disables it.
    pub query_timeout: Option<Duration>,
    /// Deadline for delivering *some* answer to the caller; when it fires a
    /// provisional SERVFAIL is delivered and iteration continues. `None`
    /// disables it.
    pub client_timeout: Option<Duration>,
    /// Hard deadline for all work on a query. `None` disables it.
    pub lookup_timeout: Option<Duration>,
    /// Re-sends after a fetch timeout (0 = a single attempt).
    pub retries: u32,
}

impl Default for RecursorConfig {
    fn default() -> Self {
        Self {
            upstream: Vec::new(),
            upstream_root: Vec::new(),
            query_timeout: Some(Duration::from_secs(2)),
            client_timeout: Some(Duration::from_secs(4)),
            lookup_timeout: Some(Duration::from_secs(30)),
            retries: 3,
        }
    }
}

/// Forwarding or recursive, decided once at construction.
#[derive(Debug, Clone)]
pub(crate) enum Mode {
    /// Send every query to one of these, chosen at random.
    Forward(Arc<[SocketAddr]>),
    /// Iterate from the root via the nameserver address store.
    Recurse,
}

/// What a resolution delivered.
#[derive(Debug)]
pub enum Delivery {
    /// An assembled answer message (its rcode may be SERVFAIL).
    Answer(Message),
    /// The query was abandoned.
    Failed,
}

/// The delivery handle for one resolution.
///
/// The first call to [`answer`](Self::answer) or [`fail`](Self::fail) wins;
/// later calls are ignored, which is what lets the client-deadline path
/// deliver early without risking a double delivery.
pub struct AnswerSink {
    tx: Option<oneshot::Sender<Delivery>>,
}

impl AnswerSink {
    /// Creates a sink and the receiver its delivery arrives on.
    pub fn channel() -> (Self, oneshot::Receiver<Delivery>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Delivers an answer message, if nothing was delivered yet.
    pub fn answer(&mut self, message: Message) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Delivery::Answer(message));
        }
    }

    /// Reports failure, if nothing was delivered yet.
    pub fn fail(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Delivery::Failed);
        }
    }

    /// True once a delivery has been made.
    pub fn is_spent(&self) -> bool {
        self.tx.is_none()
    }
}

/// Facade-level counters.
#[derive(Debug, Default)]
pub struct RecursorStats {
    queries: AtomicU64,
    cache_answers: AtomicU64,
}

impl RecursorStats {
    /// Questions accepted.
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Questions answered synchronously from the cache.
    pub fn cache_answers(&self) -> u64 {
        self.cache_answers.load(Ordering::Relaxed)
    }
}

/// The resolver entry point.
///
/// Cheap to share behind an `Arc`; every accepted question beyond the cache
/// runs as its own task against the shared cache and address store.
pub struct Recursor {
    config: RecursorConfig,
    mode: Mode,
    cache: Arc<ResolverCache>,
    nsas: Arc<NameserverAddressStore>,
    transport: Arc<dyn Transport>,
    stats: RecursorStats,
}

impl Recursor {
    /// Creates a resolver over UDP. The nameserver address store is built
    /// internally, seeded from `config.upstream_root`.
    pub fn new(config: RecursorConfig, cache: Arc<ResolverCache>) -> Self {
        let nsas = Arc::new(NameserverAddressStore::new(
            Arc::clone(&cache),
            config.upstream_root.iter().copied(),
        ));
        Self::with_parts(config, cache, nsas, Arc::new(UdpTransport))
    }

    /// Creates a resolver from externally built collaborators. This is
    /// also the seam tests use to substitute the transport.
    pub fn with_parts(
        config: RecursorConfig,
        cache: Arc<ResolverCache>,
        nsas: Arc<NameserverAddressStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let mode = if config.upstream.is_empty() {
            Mode::Recurse
        } else {
            Mode::Forward(Arc::from(config.upstream.as_slice()))
        };
        Self {
            config,
            mode,
            cache,
            nsas,
            transport,
            stats: RecursorStats::default(),
        }
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<ResolverCache> {
        &self.cache
    }

    /// Facade counters.
    pub fn stats(&self) -> &RecursorStats {
        &self.stats
    }

    /// Resolves `question`, delivering through `sink`.
    ///
    /// Full cache hits deliver synchronously; everything else spawns a
    /// per-query task that drives itself to exactly one delivery.
    pub fn resolve_into(&self, question: &Question, mut sink: AnswerSink) {
        self.stats.queries.fetch_add(1, Ordering::Relaxed);
        debug!(question = %question, "asked to resolve");

        // Whole-message probe; only a hit with actual answer records is
        // served directly.
        let mut answer = Message::answer_shell(question.clone());
        if self
            .cache
            .fill_message(&question.qname, question.qtype, question.qclass, &mut answer)
            && !answer.answers().is_empty()
        {
            debug!(question = %question, "answering from message cache");
            self.stats.cache_answers.fetch_add(1, Ordering::Relaxed);
            answer.set_rcode(ResponseCode::NoError);
            sink.answer(answer);
            return;
        }

        // Perhaps a single RRset is enough.
        if let Some(set) = self
            .cache
            .rrset(&question.qname, question.qtype, question.qclass)
        {
            debug!(question = %question, "answering from rrset cache");
            self.stats.cache_answers.fetch_add(1, Ordering::Relaxed);
            let mut answer = Message::answer_shell(question.clone());
            for record in set.to_records() {
                answer.add_answer(record);
            }
            answer.set_rcode(ResponseCode::NoError);
            sink.answer(answer);
            return;
        }

        debug!(question = %question, "cache miss, starting running query");
        let running = RunningQuery::new(
            question.clone(),
            self.mode.clone(),
            self.config.retries,
            self.config.query_timeout,
            Arc::clone(&self.cache),
            Arc::clone(&self.nsas),
            Arc::clone(&self.transport),
        );
        tokio::spawn(drive(
            running,
            sink,
            self.config.client_timeout,
            self.config.lookup_timeout,
        ));
    }

    /// Resolves `question` and waits for the one observable delivery.
    pub async fn resolve(&self, question: &Question) -> Result<Message, ResolveError> {
        let (sink, rx) = AnswerSink::channel();
        self.resolve_into(question, sink);
        match rx.await {
            Ok(Delivery::Answer(message)) => Ok(message),
            Ok(Delivery::Failed) | Err(_) => Err(ResolveError::Abandoned),
        }
    }
}
