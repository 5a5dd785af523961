//! DNS query resolution logic.
//!
//! Handles the per-query pipeline:
//! 1. Decode the header and first question
//! 2. Classify the domain (unless filtering is bypassed)
//! 3. Answer NXDOMAIN for blocked domains, otherwise relay upstream
//!
//! Transports handle the socket I/O, the resolver makes the decisions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::dns::{self, DnsQuery, Question};
use crate::error::{ProtocolError, QueryError};
use crate::filter::{FilterEngine, Verdict};
use crate::stats::{Stats, StatsSnapshot};
use crate::upstream;

/// The only settings query handling depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    /// Resolver that receives allowed queries.
    pub upstream: SocketAddr,
    pub upstream_timeout: Duration,
    /// Log queries but never block them.
    pub no_filter: bool,
}

impl RelaySettings {
    pub fn new(upstream: SocketAddr) -> Self {
        Self {
            upstream,
            upstream_timeout: upstream::DEFAULT_TIMEOUT,
            no_filter: false,
        }
    }
}

/// Action to take for a decoded query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryAction {
    /// Domain is blacklisted, send this response immediately.
    Blocked {
        response: Vec<u8>,
        question: Question,
    },
    /// Relay to upstream. `bypassed` is set when filtering is disabled.
    Forward { question: Question, bypassed: bool },
}

/// How an answered query was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Blocked,
    Forwarded,
    Bypassed,
}

/// A response ready to be written back to the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub response: Vec<u8>,
    pub question: Question,
    pub disposition: Disposition,
}

/// Resolver handles DNS query processing decisions.
///
/// Shared by every query task; the filter engine inside it is the only
/// state that changes at runtime.
pub struct Resolver {
    filter: Arc<FilterEngine>,
    settings: RelaySettings,
    stats: Stats,
}

impl Resolver {
    pub fn new(filter: Arc<FilterEngine>, settings: RelaySettings) -> Self {
        Self {
            filter,
            settings,
            stats: Stats::new(),
        }
    }

    /// Decode a raw query and decide what to do with it.
    pub fn process_query(&self, query: &[u8]) -> Result<QueryAction, ProtocolError> {
        let DnsQuery { header, question } = DnsQuery::parse(query)?;
        debug!(?header, flags = ?header.flags(), "decoded header");
        debug!(?question, "decoded question");

        if header.question_count != 1 {
            warn!(
                count = header.question_count,
                id = header.id,
                "unexpected question count, only the first question is used"
            );
        }
        self.stats.record_query_type(question.qtype);

        if self.settings.no_filter {
            return Ok(QueryAction::Forward {
                question,
                bypassed: true,
            });
        }

        match self.filter.classify(&question.domain) {
            Verdict::Blocked => Ok(QueryAction::Blocked {
                response: dns::negative_answer(query),
                question,
            }),
            Verdict::Allowed => Ok(QueryAction::Forward {
                question,
                bypassed: false,
            }),
        }
    }

    /// Produce the reply for `query`, relaying upstream when allowed.
    ///
    /// An error means the query is dropped and nothing is sent back.
    pub async fn handle_query(
        &self,
        query: &[u8],
        requester: SocketAddr,
    ) -> Result<Reply, QueryError> {
        match self.process_query(query)? {
            QueryAction::Blocked { response, question } => Ok(Reply {
                response,
                question,
                disposition: Disposition::Blocked,
            }),
            QueryAction::Forward { question, bypassed } => {
                debug!(%requester, upstream = %self.settings.upstream, "forwarding query");
                let response = upstream::forward(
                    query,
                    self.settings.upstream,
                    self.settings.upstream_timeout,
                )
                .await?;

                Ok(Reply {
                    response,
                    question,
                    disposition: if bypassed {
                        Disposition::Bypassed
                    } else {
                        Disposition::Forwarded
                    },
                })
            }
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn stats_snapshot_and_reset(&self) -> StatsSnapshot {
        self.stats.snapshot_and_reset()
    }
}
