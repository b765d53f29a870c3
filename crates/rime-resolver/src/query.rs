//! The per-resolution state machine.
//!
//! One [`RunningQuery`] drives a single client question to completion:
//! probe the cache, pick a server (a random upstream when forwarding, an
//! address-store lookup when recursing), fetch, classify, then finish,
//! descend a referral, or restart at the cache with a new CNAME target.
//!
//! [`drive`] wraps the iteration with the two outer deadlines. The client
//! deadline delivers a provisional SERVFAIL and lets iteration continue so
//! a late answer still lands in the cache; the lookup deadline abandons the
//! iteration outright. Dropping the iteration future cancels whatever fetch
//! or address-store lookup is in flight, so teardown needs no further
//! bookkeeping: when this task returns, nothing of the query remains.

use crate::classify::{classify, Classification, MAX_CNAME_CHAIN};
use crate::fetch::{FetchOutcome, Transport};
use crate::{AnswerSink, Mode};
use rand::Rng;
use rime_cache::ResolverCache;
use rime_nsas::{NameserverAddress, NameserverAddressStore};
use rime_proto::{Message, Name, Question, RecordType, ResponseCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// How an iteration ended.
enum Verdict {
    /// Deliver this message (possibly a synthesized SERVFAIL) and cache it.
    Deliver(Message),
    /// Nothing to deliver; report failure.
    Abandon,
}

/// What to do after absorbing one response.
enum Disposition {
    /// The assembled answer is complete.
    Finished,
    /// The question was retargeted at a CNAME; restart at the cache.
    FollowCname,
    /// A referral moved the zone cut down; dispatch again, skipping the
    /// cache (had the cache held the final answer we would not have been
    /// referred here).
    Descend,
}

/// The server chosen for one fetch.
struct FetchTarget {
    addr: SocketAddr,
    /// Present in recursive mode; receives the RTT verdict.
    server: Option<NameserverAddress>,
}

/// State of one in-flight resolution.
pub(crate) struct RunningQuery {
    /// The current question; replaced when following a CNAME.
    question: Question,
    /// The answer being assembled for the caller.
    answer: Message,
    mode: Mode,
    /// Zone cut currently being queried (recursive mode only).
    cur_zone: Name,
    /// CNAME links followed so far, over all messages.
    cname_count: u32,
    /// Re-sends left after fetch timeouts.
    retries_left: u32,
    query_timeout: Option<Duration>,
    cache: Arc<ResolverCache>,
    nsas: Arc<NameserverAddressStore>,
    transport: Arc<dyn Transport>,
}

impl RunningQuery {
    pub(crate) fn new(
        question: Question,
        mode: Mode,
        retries: u32,
        query_timeout: Option<Duration>,
        cache: Arc<ResolverCache>,
        nsas: Arc<NameserverAddressStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            answer: Message::answer_shell(question.clone()),
            question,
            mode,
            cur_zone: Name::root(),
            cname_count: 0,
            retries_left: retries,
            query_timeout,
            cache,
            nsas,
            transport,
        }
    }

    fn recursive(&self) -> bool {
        matches!(self.mode, Mode::Recurse)
    }

    /// Runs the resolution to a terminal verdict.
    async fn iterate(&mut self) -> Verdict {
        'chain: loop {
            // Cache first. A hit is handled exactly like a received
            // response, so a cached CNAME continues the chain and a cached
            // delegation starts iteration below the root.
            let mut cached = Message::answer_shell(self.question.clone());
            if self.cache.fill_message(
                &self.question.qname,
                self.question.qtype,
                self.question.qclass,
                &mut cached,
            ) {
                trace!(question = %self.question, "cache hit during iteration");
                match self.handle_response(&cached) {
                    Disposition::Finished => return Verdict::Deliver(self.answer.clone()),
                    Disposition::FollowCname => continue 'chain,
                    Disposition::Descend => {}
                }
            } else {
                self.cur_zone = Name::root();
            }

            loop {
                let Some(target) = self.pick_target().await else {
                    debug!(zone = %self.cur_zone, "no reachable nameserver");
                    self.answer.make_error(ResponseCode::ServFail);
                    return Verdict::Abandon;
                };

                let query = Message::query(self.question.clone());
                let sent_at = Instant::now();
                trace!(question = %self.question, server = %target.addr, "dispatching fetch");

                match self
                    .transport
                    .fetch(&query, target.addr, self.query_timeout)
                    .await
                {
                    FetchOutcome::Reply(incoming) => {
                        let rtt = sent_at.elapsed().as_millis().max(1).min(u128::from(u32::MAX))
                            as u32;
                        if let Some(server) = &target.server {
                            server.update_rtt(rtt);
                        }
                        trace!(rtt_ms = rtt, server = %target.addr, "reply");

                        // Forwarded queries and error rcodes are passed
                        // through as-is.
                        if !self.recursive() || !incoming.rcode().is_no_error() {
                            self.answer.absorb_response(&incoming);
                            return Verdict::Deliver(self.answer.clone());
                        }

                        match self.handle_response(&incoming) {
                            Disposition::Finished => {
                                return Verdict::Deliver(self.answer.clone())
                            }
                            Disposition::FollowCname => continue 'chain,
                            Disposition::Descend => continue,
                        }
                    }
                    outcome @ (FetchOutcome::TimedOut | FetchOutcome::Failed) => {
                        if self.recursive() {
                            if let Some(server) = &target.server {
                                server.mark_unreachable();
                            }
                        }
                        if self.retries_left > 0 {
                            self.retries_left -= 1;
                            debug!(
                                question = %self.question,
                                server = %target.addr,
                                ?outcome,
                                retries_left = self.retries_left,
                                "fetch failed, resending"
                            );
                            continue;
                        }
                        debug!(
                            question = %self.question,
                            server = %target.addr,
                            "fetch failed, out of retries"
                        );
                        self.answer.make_error(ResponseCode::ServFail);
                        return Verdict::Deliver(self.answer.clone());
                    }
                }
            }
        }
    }

    /// Chooses where the next fetch goes.
    async fn pick_target(&self) -> Option<FetchTarget> {
        match &self.mode {
            Mode::Forward(upstreams) => {
                let addr = upstreams[rand::thread_rng().gen_range(0..upstreams.len())];
                debug!(question = %self.question, %addr, "forwarding upstream");
                Some(FetchTarget { addr, server: None })
            }
            Mode::Recurse => {
                trace!(zone = %self.cur_zone, "asking address store");
                let server = self
                    .nsas
                    .find(&self.cur_zone, self.question.qclass)
                    .await?;
                Some(FetchTarget {
                    addr: server.addr(),
                    server: Some(server),
                })
            }
        }
    }

    /// Absorbs one NOERROR response (from the network or the cache).
    fn handle_response(&mut self, incoming: &Message) -> Disposition {
        let category = classify(&self.question, incoming);
        trace!(question = %self.question, ?category, "classified response");

        match category {
            Classification::Answer | Classification::AnswerCname => {
                self.cache.update(incoming);
                self.answer.absorb_response(incoming);
                Disposition::Finished
            }
            Classification::Cname { target, hops } => {
                self.cache.update(incoming);
                self.cname_count += hops;
                if self.cname_count >= MAX_CNAME_CHAIN {
                    warn!(question = %self.question, count = self.cname_count, "cname chain too long");
                    self.answer.make_error(ResponseCode::ServFail);
                    return Disposition::Finished;
                }
                self.answer.append_answers(incoming);
                debug!(from = %self.question.qname, to = %target, "following cname");
                self.question = self.question.retarget(target);
                self.cur_zone = Name::root();
                Disposition::FollowCname
            }
            Classification::NxDomain | Classification::NxRrset => {
                // A negative answer still means the transport worked.
                self.answer.absorb_response(incoming);
                Disposition::Finished
            }
            Classification::Referral => {
                self.cache.update(incoming);
                let delegated = incoming
                    .authority()
                    .iter()
                    .find(|r| r.rtype() == RecordType::Ns)
                    .map(|r| r.name.clone());
                match delegated {
                    Some(zone) => {
                        debug!(zone = %zone, "referred down");
                        self.cur_zone = zone;
                        Disposition::Descend
                    }
                    None => {
                        debug!("referral without ns rrset, passing through");
                        self.answer.absorb_response(incoming);
                        Disposition::Finished
                    }
                }
            }
            defect => {
                debug!(?defect, "defective response");
                self.answer.make_error(ResponseCode::ServFail);
                Disposition::Finished
            }
        }
    }
}

/// Sleeps for `timeout`, or forever when disabled.
async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(after) => tokio::time::sleep(after).await,
        None => std::future::pending().await,
    }
}

/// Runs a query to completion under the client and lookup deadlines,
/// delivering through `sink` exactly once as seen by the caller.
pub(crate) async fn drive(
    mut query: RunningQuery,
    mut sink: AnswerSink,
    client_timeout: Option<Duration>,
    lookup_timeout: Option<Duration>,
) {
    let original = query.question.clone();
    let cache = Arc::clone(&query.cache);

    let client = deadline(client_timeout);
    let lookup = deadline(lookup_timeout);
    let work = query.iterate();
    tokio::pin!(client, lookup, work);

    let mut client_fired = false;

    loop {
        tokio::select! {
            verdict = work.as_mut() => {
                match verdict {
                    Verdict::Deliver(message) => {
                        // Cache before the caller hears anything.
                        cache.update(&message);
                        sink.answer(message);
                    }
                    Verdict::Abandon => sink.fail(),
                }
                return;
            }
            () = client.as_mut(), if !client_fired => {
                client_fired = true;
                debug!(question = %original, "client deadline, provisional servfail");
                let mut provisional = Message::answer_shell(original.clone());
                provisional.make_error(ResponseCode::ServFail);
                sink.answer(provisional);
                // Keep iterating; a late answer still updates the cache.
            }
            () = lookup.as_mut() => {
                debug!(question = %original, "lookup deadline, abandoning");
                sink.fail();
                return;
            }
        }
    }
}
