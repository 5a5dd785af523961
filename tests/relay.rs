//! End-to-end tests: a client talks to the UDP transport, which relays
//! allowed queries to a fake upstream on localhost.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::join_all;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use dnswall::filter::{FilterEngine, FilterRules, PatternSet, Verdict};
use dnswall::resolver::{Disposition, RelaySettings, Resolver};
use dnswall::transport::udp::UdpTransport;

const WAIT: Duration = Duration::from_secs(2);

fn build_query(query_id: u16, domain: &str) -> Vec<u8> {
    let mut packet = Vec::with_capacity(512);
    packet.extend_from_slice(&query_id.to_be_bytes());
    packet.extend_from_slice(&[0x01, 0x00]); // Flags: standard query, RD
    packet.extend_from_slice(&[0x00, 0x01]); // Questions: 1
    packet.extend_from_slice(&[0x00, 0x00]); // Answer RRs: 0
    packet.extend_from_slice(&[0x00, 0x00]); // Authority RRs: 0
    packet.extend_from_slice(&[0x00, 0x00]); // Additional RRs: 0
    for label in domain.split('.') {
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0x00);
    packet.extend_from_slice(&[0x00, 0x01]); // Type: A
    packet.extend_from_slice(&[0x00, 0x01]); // Class: IN
    packet
}

/// What the fake upstream answers: the query with response flags and one
/// A record pointing at 192.0.2.1.
fn upstream_answer(query: &[u8]) -> Vec<u8> {
    let mut response = query.to_vec();
    response[2] = 0x81;
    response[3] = 0x80;
    response[7] = 1;
    response.extend_from_slice(&[0xC0, 0x0C, 0, 1, 0, 1, 0, 0, 0x0E, 0x10, 0, 4, 192, 0, 2, 1]);
    response
}

struct FakeUpstream {
    addr: SocketAddr,
    received: Arc<AtomicUsize>,
}

async fn spawn_upstream(delay: Duration) -> FakeUpstream {
    let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let addr = socket.local_addr().unwrap();
    let received = Arc::new(AtomicUsize::new(0));

    let counter = received.clone();
    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        loop {
            let (len, src) = socket.recv_from(&mut buf).await.unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
            let answer = upstream_answer(&buf[..len]);
            let socket = socket.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                socket.send_to(&answer, src).await.unwrap();
            });
        }
    });

    FakeUpstream { addr, received }
}

fn engine(whitelist: &[&str], blacklist: &[&str]) -> Arc<FilterEngine> {
    Arc::new(FilterEngine::new(FilterRules::new(
        PatternSet::compile(whitelist).unwrap(),
        PatternSet::compile(blacklist).unwrap(),
    )))
}

async fn start_relay(engine: Arc<FilterEngine>, settings: RelaySettings) -> SocketAddr {
    let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = transport.local_addr().unwrap();
    transport.start(Arc::new(Resolver::new(engine, settings)));
    addr
}

async fn exchange(relay: SocketAddr, query: &[u8]) -> Option<Vec<u8>> {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(query, relay).await.unwrap();
    let mut buf = [0u8; 2048];
    match timeout(WAIT, client.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => Some(buf[..len].to_vec()),
        _ => None,
    }
}

#[tokio::test]
async fn blocked_domain_gets_nxdomain_without_upstream() {
    let upstream = spawn_upstream(Duration::ZERO).await;
    let relay = start_relay(engine(&[], &[r".*\.ru$"]), RelaySettings::new(upstream.addr)).await;

    let query = build_query(0x305c, "www.foo.ru");
    let reply = exchange(relay, &query).await.expect("no reply");

    assert_eq!(&reply[..2], &[0x30, 0x5c]);
    assert_eq!(reply[2] & 0x80, 0x80);
    assert_eq!(reply[3] & 0x0F, 3);
    assert_eq!(reply[2] & 0x01, 0x01, "RD bit preserved");
    assert_eq!(&reply[4..], &query[4..]);
    assert_eq!(upstream.received.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn allowed_domain_relays_upstream_bytes() {
    let upstream = spawn_upstream(Duration::ZERO).await;
    let relay = start_relay(engine(&[], &[r".*\.ru$"]), RelaySettings::new(upstream.addr)).await;

    let query = build_query(0x1234, "www.google.com");
    let reply = exchange(relay, &query).await.expect("no reply");

    assert_eq!(reply, upstream_answer(&query));
    assert_eq!(upstream.received.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn whitelist_beats_blacklist_end_to_end() {
    let upstream = spawn_upstream(Duration::ZERO).await;
    let relay = start_relay(
        engine(&[r"^www\.yandex\.ru$"], &[r".*\.ru$"]),
        RelaySettings::new(upstream.addr),
    )
    .await;

    let query = build_query(7, "www.yandex.ru");
    let reply = exchange(relay, &query).await.expect("no reply");

    assert_eq!(reply, upstream_answer(&query));
    assert_eq!(upstream.received.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn no_filter_forwards_blacklisted_domain() {
    let upstream = spawn_upstream(Duration::ZERO).await;
    let mut settings = RelaySettings::new(upstream.addr);
    settings.no_filter = true;
    let relay = start_relay(engine(&[], &[r".*\.ru$"]), settings).await;

    let query = build_query(9, "www.foo.ru");
    let reply = exchange(relay, &query).await.expect("no reply");

    assert_eq!(reply, upstream_answer(&query));
    assert_eq!(upstream.received.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn malformed_query_gets_no_reply() {
    let upstream = spawn_upstream(Duration::ZERO).await;
    let relay = start_relay(engine(&[], &[]), RelaySettings::new(upstream.addr)).await;

    let query = build_query(1, "example.com");
    let reply = exchange(relay, &query[..query.len() - 2]).await;

    assert!(reply.is_none());
    assert_eq!(upstream.received.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn silent_upstream_drops_query() {
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let settings = RelaySettings {
        upstream: silent.local_addr().unwrap(),
        upstream_timeout: Duration::from_millis(100),
        no_filter: false,
    };
    let relay = start_relay(engine(&[], &[]), settings).await;

    assert!(exchange(relay, &build_query(3, "example.com")).await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_upstream_does_not_block_other_queries() {
    let upstream = spawn_upstream(Duration::from_millis(300)).await;
    let relay = start_relay(engine(&[], &["^blocked"]), RelaySettings::new(upstream.addr)).await;

    let slow = tokio::spawn(async move {
        let query = build_query(100, "slow.example");
        (exchange(relay, &query).await, query)
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = tokio::time::Instant::now();
    let fast = exchange(relay, &build_query(101, "blocked.example")).await;
    assert!(fast.is_some());
    assert!(started.elapsed() < Duration::from_millis(300));

    let (slow_reply, slow_query) = slow.await.unwrap();
    assert_eq!(slow_reply, Some(upstream_answer(&slow_query)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_queries_each_get_their_own_answer() {
    let upstream = spawn_upstream(Duration::from_millis(10)).await;
    let relay = start_relay(engine(&[], &[]), RelaySettings::new(upstream.addr)).await;

    let queries: Vec<Vec<u8>> = (0..20u16)
        .map(|i| build_query(0x4000 + i, &format!("host{i}.example")))
        .collect();
    let replies = join_all(queries.iter().map(|q| exchange(relay, q))).await;

    for (query, reply) in queries.iter().zip(replies) {
        assert_eq!(reply, Some(upstream_answer(query)));
    }
    assert_eq!(upstream.received.load(Ordering::SeqCst), 20);
}

#[tokio::test]
async fn reload_applies_to_following_queries() {
    let upstream = spawn_upstream(Duration::ZERO).await;
    let engine = engine(&[], &[]);
    let resolver = Resolver::new(engine.clone(), RelaySettings::new(upstream.addr));
    let requester: SocketAddr = "127.0.0.1:40000".parse().unwrap();
    let query = build_query(55, "news.example.ru");

    let before = resolver.handle_query(&query, requester).await.unwrap();
    assert_eq!(before.disposition, Disposition::Forwarded);

    engine.reload(PatternSet::empty(), PatternSet::compile([r"\.ru$"]).unwrap());
    assert_eq!(engine.classify("news.example.ru"), Verdict::Blocked);

    let after = resolver.handle_query(&query, requester).await.unwrap();
    assert_eq!(after.disposition, Disposition::Blocked);
    assert_eq!(upstream.received.load(Ordering::SeqCst), 1);
}
