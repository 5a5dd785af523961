//! dnswall - a DNS relay that answers NXDOMAIN for blacklisted domains.
//!
//! Queries are decoded just far enough to read the first question, the
//! domain is checked against regex whitelists and blacklists, and allowed
//! queries are relayed verbatim to an upstream resolver.

pub mod config;
pub mod dns;
pub mod error;
pub mod filter;
pub mod proxy;
pub mod resolver;
pub mod stats;
pub mod transport;
pub mod upstream;
