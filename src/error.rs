//! Error types for the relay.
//!
//! Per-query errors (`ProtocolError`, `UpstreamError`, `QueryError`) are
//! handled inside the query task. `ConfigError` only surfaces while loading
//! configuration or filter rules.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Malformed or short input while decoding a DNS message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message truncated at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

/// Failure while relaying a query to the upstream resolver.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("failed to connect to upstream: {0}")]
    Connect(#[source] io::Error),

    #[error("failed to write query to upstream: {0}")]
    Write(#[source] io::Error),

    #[error("failed to read response from upstream: {0}")]
    Read(#[source] io::Error),

    #[error("no response from upstream within {0:?}")]
    Timeout(Duration),
}

/// Everything that can end a single query without a normal reply.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("failed to write reply to {peer}: {source}")]
    ReplyWrite {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Configuration and filter loading errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("pattern `{pattern}` does not compile: {source}")]
    PatternCompile {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("cannot read {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid resolver address `{0}`")]
    InvalidResolver(String),

    #[error("invalid listen address `{0}`")]
    InvalidListen(String),

    #[error("reload interval must be at least one second")]
    ZeroReloadInterval,
}
