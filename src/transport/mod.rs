//! Transport layer for the relay.
//!
//! Receives DNS queries from clients over UDP and hands each one to the
//! resolver in its own task.

pub mod udp;

use std::net::SocketAddr;

use tracing::{info, warn};

use crate::dns::Question;
use crate::error::QueryError;

/// Maximum size of a received query (with some headroom).
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

/// Logger for the outcome of one query.
pub struct QueryLogger {
    requester: SocketAddr,
}

impl QueryLogger {
    pub fn new(requester: SocketAddr) -> Self {
        Self { requester }
    }

    pub fn blocked(&self, question: &Question, elapsed_ms: f64) {
        info!(
            requester = %self.requester,
            qtype = %question.type_name(),
            "{} BLOCKED total={:.3}ms",
            question.domain,
            elapsed_ms
        );
    }

    pub fn forwarded(&self, question: &Question, elapsed_ms: f64) {
        info!(
            requester = %self.requester,
            qtype = %question.type_name(),
            "{} FORWARDED total={:.3}ms",
            question.domain,
            elapsed_ms
        );
    }

    pub fn bypassed(&self, question: &Question, elapsed_ms: f64) {
        info!(
            requester = %self.requester,
            qtype = %question.type_name(),
            "{} BYPASSED total={:.3}ms",
            question.domain,
            elapsed_ms
        );
    }

    pub fn dropped(&self, err: &QueryError) {
        warn!(requester = %self.requester, "query dropped: {}", err);
    }

    pub fn reply_failed(&self, err: &QueryError) {
        warn!(requester = %self.requester, "{}", err);
    }
}
