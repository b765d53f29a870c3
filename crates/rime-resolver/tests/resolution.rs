//! End-to-end resolution tests over a scripted transport.
//!
//! Time-sensitive tests run on a paused clock, so deadlines and delayed
//! replies are deterministic.

use async_trait::async_trait;
use parking_lot::Mutex;
use rime_cache::ResolverCache;
use rime_nsas::NameserverAddressStore;
use rime_proto::{Message, Name, Question, Record, RecordClass, RecordType, ResponseCode};
use rime_resolver::{FetchOutcome, Recursor, RecursorConfig, ResolveError, Transport};
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const UPSTREAM: &str = "192.0.2.1:53";
const ROOT: &str = "198.41.0.4:53";
const GTLD: &str = "192.5.6.30:53";

fn name(s: &str) -> Name {
    Name::from_str(s).unwrap()
}

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

/// What the scripted server does with one query.
enum Step {
    Reply(Message),
    ReplyAfter(Duration, Message),
    Timeout,
}

/// A transport that answers from a script instead of the network.
struct ScriptedTransport {
    script: Box<dyn Fn(&Message, SocketAddr) -> Step + Send + Sync>,
    log: Mutex<Vec<(Question, SocketAddr)>>,
}

impl ScriptedTransport {
    fn new(script: impl Fn(&Message, SocketAddr) -> Step + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            log: Mutex::new(Vec::new()),
        })
    }

    fn fetches(&self) -> usize {
        self.log.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(
        &self,
        query: &Message,
        server: SocketAddr,
        _timeout: Option<Duration>,
    ) -> FetchOutcome {
        self.log
            .lock()
            .push((query.question().unwrap().clone(), server));
        match (self.script)(query, server) {
            Step::Reply(reply) => FetchOutcome::Reply(reply),
            Step::ReplyAfter(delay, reply) => {
                tokio::time::sleep(delay).await;
                FetchOutcome::Reply(reply)
            }
            Step::Timeout => FetchOutcome::TimedOut,
        }
    }
}

/// A NOERROR reply answering the query with one A record.
fn a_reply(query: &Message, ip: Ipv4Addr) -> Message {
    let mut reply = Message::response_to(query);
    let qname = query.question().unwrap().qname.clone();
    reply.add_answer(Record::a(qname, 300, ip));
    reply
}

fn forwarding_config() -> RecursorConfig {
    RecursorConfig {
        upstream: vec![addr(UPSTREAM)],
        ..RecursorConfig::default()
    }
}

fn recursive_config() -> RecursorConfig {
    RecursorConfig {
        upstream_root: vec![addr(ROOT)],
        ..RecursorConfig::default()
    }
}

fn build(config: RecursorConfig, transport: Arc<ScriptedTransport>) -> Recursor {
    let cache = Arc::new(ResolverCache::with_defaults());
    let nsas = Arc::new(NameserverAddressStore::new(
        Arc::clone(&cache),
        config.upstream_root.iter().copied(),
    ));
    Recursor::with_parts(config, cache, nsas, transport)
}

// ---------------------------------------------------------------------------
// Cache fast path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn answers_synchronously_from_primed_cache() {
    let transport = ScriptedTransport::new(|_, _| Step::Timeout);
    let recursor = build(forwarding_config(), Arc::clone(&transport));

    // Prime the cache with a full response.
    let question = Question::a(name("example.com"));
    let primed = a_reply(&Message::query(question.clone()), Ipv4Addr::new(93, 184, 216, 34));
    recursor.cache().update(&primed);

    let answer = recursor.resolve(&question).await.unwrap();
    assert_eq!(answer.rcode(), ResponseCode::NoError);
    assert!(!answer.answers().is_empty());
    assert_eq!(transport.fetches(), 0, "no fetch may leave the process");
    assert_eq!(recursor.stats().cache_answers(), 1);
}

#[tokio::test]
async fn resolving_twice_hits_the_cache() {
    let transport =
        ScriptedTransport::new(|query, _| Step::Reply(a_reply(query, Ipv4Addr::new(192, 0, 2, 7))));
    let recursor = build(forwarding_config(), Arc::clone(&transport));

    let question = Question::a(name("twice.example.com"));
    let first = recursor.resolve(&question).await.unwrap();
    let second = recursor.resolve(&question).await.unwrap();

    assert_eq!(transport.fetches(), 1, "second answer must come from cache");
    assert_eq!(first.answers(), second.answers());
}

#[tokio::test]
async fn evicting_and_resolving_again_refetches() {
    let transport =
        ScriptedTransport::new(|query, _| Step::Reply(a_reply(query, Ipv4Addr::new(192, 0, 2, 7))));
    let recursor = build(forwarding_config(), Arc::clone(&transport));

    let question = Question::a(name("evicted.example.com"));
    let first = recursor.resolve(&question).await.unwrap();

    recursor
        .cache()
        .evict(&question.qname, question.qtype, question.qclass);

    let second = recursor.resolve(&question).await.unwrap();
    assert_eq!(transport.fetches(), 2);
    assert_eq!(first.answers(), second.answers());
}

// ---------------------------------------------------------------------------
// Forwarding mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_hop_forward() {
    let transport = ScriptedTransport::new(|query, server| {
        assert_eq!(server, addr(UPSTREAM));
        Step::Reply(a_reply(query, Ipv4Addr::new(192, 0, 2, 42)))
    });
    let recursor = build(forwarding_config(), Arc::clone(&transport));

    let question = Question::a(name("fwd.example.com"));
    let answer = recursor.resolve(&question).await.unwrap();

    assert_eq!(answer.rcode(), ResponseCode::NoError);
    assert_eq!(answer.answers().len(), 1);
    assert_eq!(transport.fetches(), 1);

    // The answer made it into the cache.
    let mut cached = Message::answer_shell(question.clone());
    assert!(recursor.cache().fill_message(
        &question.qname,
        question.qtype,
        question.qclass,
        &mut cached
    ));
}

#[tokio::test]
async fn forwarding_copies_error_rcodes_verbatim() {
    let transport = ScriptedTransport::new(|query, _| {
        let mut reply = Message::response_to(query);
        reply.set_rcode(ResponseCode::Refused);
        Step::Reply(reply)
    });
    let recursor = build(forwarding_config(), transport);

    let answer = recursor
        .resolve(&Question::a(name("refused.example.com")))
        .await
        .unwrap();
    assert_eq!(answer.rcode(), ResponseCode::Refused);
}

// ---------------------------------------------------------------------------
// Retries and timeouts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn no_retries_single_fetch_then_servfail() {
    let transport = ScriptedTransport::new(|_, _| Step::Timeout);
    let recursor = build(
        RecursorConfig {
            retries: 0,
            ..forwarding_config()
        },
        Arc::clone(&transport),
    );

    let answer = recursor
        .resolve(&Question::a(name("dead.example.com")))
        .await
        .unwrap();
    assert_eq!(answer.rcode(), ResponseCode::ServFail);
    assert_eq!(transport.fetches(), 1);
}

#[tokio::test]
async fn retry_budget_spent_then_servfail() {
    let transport = ScriptedTransport::new(|_, _| Step::Timeout);
    let recursor = build(
        RecursorConfig {
            retries: 2,
            ..forwarding_config()
        },
        Arc::clone(&transport),
    );

    let answer = recursor
        .resolve(&Question::a(name("dead.example.com")))
        .await
        .unwrap();
    assert_eq!(answer.rcode(), ResponseCode::ServFail);
    assert_eq!(transport.fetches(), 3, "one send plus two retries");
}

#[tokio::test(start_paused = true)]
async fn client_deadline_then_late_answer_updates_cache() {
    let transport = ScriptedTransport::new(|query, _| {
        Step::ReplyAfter(
            Duration::from_millis(200),
            a_reply(query, Ipv4Addr::new(192, 0, 2, 99)),
        )
    });
    let recursor = build(
        RecursorConfig {
            client_timeout: Some(Duration::from_millis(50)),
            lookup_timeout: Some(Duration::from_millis(500)),
            query_timeout: Some(Duration::from_secs(1)),
            ..forwarding_config()
        },
        Arc::clone(&transport),
    );

    // The caller gets a provisional SERVFAIL at the client deadline.
    let question = Question::a(name("slow.example.com"));
    let provisional = recursor.resolve(&question).await.unwrap();
    assert_eq!(provisional.rcode(), ResponseCode::ServFail);

    // The real reply lands later and still reaches the cache; no second
    // delivery is observable anywhere.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let mut cached = Message::answer_shell(question.clone());
    assert!(recursor.cache().fill_message(
        &question.qname,
        question.qtype,
        question.qclass,
        &mut cached
    ));
    assert_eq!(
        cached.answers()[0].rdata.as_a(),
        Some(Ipv4Addr::new(192, 0, 2, 99))
    );
}

#[tokio::test(start_paused = true)]
async fn lookup_deadline_abandons_outstanding_fetch() {
    let transport = ScriptedTransport::new(|query, _| {
        Step::ReplyAfter(
            Duration::from_secs(10),
            a_reply(query, Ipv4Addr::new(192, 0, 2, 1)),
        )
    });
    let recursor = build(
        RecursorConfig {
            client_timeout: None,
            lookup_timeout: Some(Duration::from_millis(500)),
            query_timeout: None,
            ..forwarding_config()
        },
        transport,
    );

    let got = recursor.resolve(&Question::a(name("stuck.example.com"))).await;
    assert_eq!(got, Err(ResolveError::Abandoned));
}

#[tokio::test(start_paused = true)]
async fn lookup_deadline_after_client_deadline_delivers_once() {
    let transport = ScriptedTransport::new(|query, _| {
        Step::ReplyAfter(
            Duration::from_secs(10),
            a_reply(query, Ipv4Addr::new(192, 0, 2, 1)),
        )
    });
    let recursor = build(
        RecursorConfig {
            client_timeout: Some(Duration::from_millis(100)),
            lookup_timeout: Some(Duration::from_millis(500)),
            query_timeout: None,
            ..forwarding_config()
        },
        transport,
    );

    // The provisional SERVFAIL is the one observable delivery; the lookup
    // deadline later tears the query down silently.
    let answer = recursor
        .resolve(&Question::a(name("stuck.example.com")))
        .await
        .unwrap();
    assert_eq!(answer.rcode(), ResponseCode::ServFail);
    tokio::time::sleep(Duration::from_secs(1)).await;
}

// ---------------------------------------------------------------------------
// Recursive descent
// ---------------------------------------------------------------------------

/// Root refers to com., com. answers. The classic two-step walk.
#[tokio::test]
async fn recursive_descent_through_referral() {
    let transport = ScriptedTransport::new(|query, server| {
        if server == addr(ROOT) {
            let mut referral = Message::response_to(query);
            referral.add_authority(Record::ns(name("com"), 172_800, name("a.gtld")));
            referral.add_additional(Record::a(name("a.gtld"), 172_800, Ipv4Addr::new(192, 5, 6, 30)));
            Step::Reply(referral)
        } else {
            assert_eq!(server, addr(GTLD));
            Step::Reply(a_reply(query, Ipv4Addr::new(93, 184, 216, 34)))
        }
    });
    let recursor = build(recursive_config(), Arc::clone(&transport));

    let question = Question::a(name("host.example.com"));
    let answer = recursor.resolve(&question).await.unwrap();

    assert_eq!(answer.rcode(), ResponseCode::NoError);
    assert_eq!(answer.answers().len(), 1);
    assert_eq!(transport.fetches(), 2);

    // Both the referral and the final answer are cached.
    let cache = recursor.cache();
    assert!(cache.rrset(&name("com"), RecordType::Ns, RecordClass::In).is_some());
    assert!(cache
        .rrset(&question.qname, RecordType::A, RecordClass::In)
        .is_some());
}

#[tokio::test]
async fn referral_without_ns_passes_through() {
    let transport = ScriptedTransport::new(|query, _| {
        let mut odd = Message::response_to(query);
        odd.add_authority(Record::new(
            name("example.com"),
            RecordClass::In,
            300,
            rime_proto::Rdata::Txt(vec![b"not a delegation".to_vec()]),
        ));
        Step::Reply(odd)
    });
    let recursor = build(recursive_config(), transport);

    let answer = recursor
        .resolve(&Question::a(name("odd.example.com")))
        .await
        .unwrap();
    assert_eq!(answer.rcode(), ResponseCode::NoError);
    assert_eq!(answer.authority().len(), 1);
}

#[tokio::test]
async fn nxdomain_is_a_successful_delivery() {
    let transport = ScriptedTransport::new(|query, _| {
        let mut reply = Message::response_to(query);
        reply.set_rcode(ResponseCode::NxDomain);
        Step::Reply(reply)
    });
    let recursor = build(recursive_config(), transport);

    let answer = recursor
        .resolve(&Question::a(name("nowhere.example.com")))
        .await
        .unwrap();
    assert_eq!(answer.rcode(), ResponseCode::NxDomain);
}

#[tokio::test]
async fn defective_response_becomes_servfail() {
    // NOERROR with nothing in it at all.
    let transport = ScriptedTransport::new(|query, _| Step::Reply(Message::response_to(query)));
    let recursor = build(recursive_config(), Arc::clone(&transport));

    let answer = recursor
        .resolve(&Question::a(name("empty.example.com")))
        .await
        .unwrap();
    assert_eq!(answer.rcode(), ResponseCode::ServFail);
    // Defects are not retried against another target.
    assert_eq!(transport.fetches(), 1);
}

#[tokio::test]
async fn unreachable_nameservers_abandon_the_query() {
    // Recursive mode with no root seeds: the address store knows nothing.
    let transport = ScriptedTransport::new(|_, _| Step::Timeout);
    let recursor = build(
        RecursorConfig::default(), // no upstream, no upstream_root
        Arc::clone(&transport),
    );

    let got = recursor.resolve(&Question::a(name("lost.example.com"))).await;
    assert_eq!(got, Err(ResolveError::Abandoned));
    assert_eq!(transport.fetches(), 0);
}

// ---------------------------------------------------------------------------
// CNAME chains
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cname_chain_accumulates_both_records() {
    let transport = ScriptedTransport::new(|query, _| {
        let qname = query.question().unwrap().qname.clone();
        let mut reply = Message::response_to(query);
        if qname == name("a.example") {
            reply.add_answer(Record::cname(qname, 300, name("b.example")));
        } else {
            assert_eq!(qname, name("b.example"));
            reply.add_answer(Record::a(qname, 300, Ipv4Addr::new(192, 0, 2, 55)));
        }
        Step::Reply(reply)
    });
    let recursor = build(recursive_config(), Arc::clone(&transport));

    let answer = recursor.resolve(&Question::a(name("a.example"))).await.unwrap();

    assert_eq!(answer.rcode(), ResponseCode::NoError);
    let types: Vec<_> = answer.answers().iter().map(Record::rtype).collect();
    assert_eq!(types, vec![RecordType::Cname, RecordType::A]);
    assert_eq!(transport.fetches(), 2);
}

#[tokio::test]
async fn cname_to_self_terminates_with_servfail() {
    let transport = ScriptedTransport::new(|query, _| {
        let qname = query.question().unwrap().qname.clone();
        let mut reply = Message::response_to(query);
        reply.add_answer(Record::cname(qname.clone(), 300, qname));
        Step::Reply(reply)
    });
    let recursor = build(recursive_config(), Arc::clone(&transport));

    let answer = recursor
        .resolve(&Question::a(name("loop.example.com")))
        .await
        .unwrap();
    assert_eq!(answer.rcode(), ResponseCode::ServFail);
}

#[tokio::test]
async fn cname_answer_in_one_message_is_terminal() {
    let transport = ScriptedTransport::new(|query, _| {
        let qname = query.question().unwrap().qname.clone();
        let mut reply = Message::response_to(query);
        reply.add_answer(Record::cname(qname, 300, name("real.example.com")));
        reply.add_answer(Record::a(name("real.example.com"), 300, Ipv4Addr::new(192, 0, 2, 8)));
        Step::Reply(reply)
    });
    let recursor = build(recursive_config(), Arc::clone(&transport));

    let answer = recursor
        .resolve(&Question::a(name("alias.example.com")))
        .await
        .unwrap();
    assert_eq!(answer.rcode(), ResponseCode::NoError);
    assert_eq!(answer.answers().len(), 2);
    assert_eq!(transport.fetches(), 1, "the chain resolved in one message");
}
