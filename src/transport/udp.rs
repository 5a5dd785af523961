//! UDP transport for DNS queries.
//!
//! A single receive loop reads datagrams and spawns one task per query,
//! so a slow upstream answer never holds up the next client. Each task
//! writes its reply back through the shared listening socket.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::QueryError;
use crate::resolver::{Disposition, Resolver};

use super::{MAX_DNS_PACKET_SIZE, QueryLogger};

/// UDP transport for the relay.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);

        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Start the receive loop.
    pub fn start(self, resolver: Arc<Resolver>) -> JoinHandle<()> {
        tokio::spawn(run(self.socket, resolver))
    }
}

/// Receive loop: never waits on a query being processed.
async fn run(socket: Arc<UdpSocket>, resolver: Arc<Resolver>) {
    let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

    loop {
        let (len, src) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                warn!("UDP recv error: {}", e);
                continue;
            }
        };
        debug!(bytes = len, requester = %src, "datagram received");

        tokio::spawn(serve_query(
            socket.clone(),
            resolver.clone(),
            buf[..len].to_vec(),
            src,
        ));
    }
}

/// Handle one query end to end and reply to `requester` if there is
/// anything to say.
async fn serve_query(
    socket: Arc<UdpSocket>,
    resolver: Arc<Resolver>,
    query: Vec<u8>,
    requester: SocketAddr,
) {
    let start_time = Instant::now();
    let log = QueryLogger::new(requester);

    let reply = match resolver.handle_query(&query, requester).await {
        Ok(reply) => reply,
        Err(e) => {
            resolver.stats().record_dropped();
            log.dropped(&e);
            return;
        }
    };

    match socket.send_to(&reply.response, requester).await {
        Ok(n) => debug!(bytes = n, %requester, "reply written"),
        Err(source) => log.reply_failed(&QueryError::ReplyWrite {
            peer: requester,
            source,
        }),
    }

    let elapsed_ms = start_time.elapsed().as_secs_f64() * 1000.0;
    let stats = resolver.stats();
    match reply.disposition {
        Disposition::Blocked => {
            stats.record_blocked(elapsed_ms);
            log.blocked(&reply.question, elapsed_ms);
        }
        Disposition::Forwarded => {
            stats.record_forwarded(elapsed_ms);
            log.forwarded(&reply.question, elapsed_ms);
        }
        Disposition::Bypassed => {
            stats.record_bypassed(elapsed_ms);
            log.bypassed(&reply.question, elapsed_ms);
        }
    }
}
