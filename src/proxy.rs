//! Relay orchestration.
//!
//! Loads the filter, binds the UDP transport, and runs the background
//! reload and statistics tasks until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::dns::qtype_name;
use crate::error::ConfigError;
use crate::filter::{FilterEngine, FilterSources};
use crate::resolver::{RelaySettings, Resolver};
use crate::transport::udp::UdpTransport;

/// How often the statistics summary is logged.
const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Local address to bind (e.g., 127.0.0.1:53)
    pub bind_addr: SocketAddr,
    pub relay: RelaySettings,
    /// Pattern files, re-read on every reload.
    pub sources: FilterSources,
    pub reload_interval: Duration,
}

/// Run the relay until Ctrl-C.
///
/// A pattern that fails to compile at startup is fatal. Later reload
/// failures keep the rules already installed.
pub async fn run(config: ProxyConfig) -> anyhow::Result<()> {
    let engine = Arc::new(FilterEngine::new(config.sources.load()?));
    let (whitelisted, blacklisted) = engine.rule_counts();
    let resolver = Arc::new(Resolver::new(engine.clone(), config.relay));

    let udp = UdpTransport::bind(config.bind_addr).await?;
    let listen = udp.local_addr()?;
    info!(
        %listen,
        resolver = %config.relay.upstream,
        whitelisted,
        blacklisted,
        no_filter = config.relay.no_filter,
        "listening to DNS requests"
    );

    let reload = spawn_reload_task(engine, config.sources, config.reload_interval);
    let stats = spawn_stats_task(resolver.clone());
    let transport = udp.start(resolver);

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    transport.abort();
    reload.abort();
    stats.abort();

    Ok(())
}

/// Rebuild the rules from `sources` every `interval` and install them.
///
/// Files are read and compiled on the blocking pool, before the engine
/// lock is touched. A failed load is logged and the current rules stay
/// in place.
pub fn spawn_reload_task(
    engine: Arc<FilterEngine>,
    sources: FilterSources,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // Skip first immediate tick
        loop {
            ticker.tick().await;
            info!("updating blocklists");
            let engine = engine.clone();
            let sources = sources.clone();
            match tokio::task::spawn_blocking(move || reload_once(&engine, &sources)).await {
                Ok(Ok((whitelisted, blacklisted))) => {
                    info!(whitelisted, blacklisted, "blocklists updated")
                }
                Ok(Err(e)) => error!("blocklist update failed, keeping previous rules: {}", e),
                Err(e) => error!("blocklist update task failed: {}", e),
            }
        }
    })
}

/// Load `sources` and install the result.
pub fn reload_once(
    engine: &FilterEngine,
    sources: &FilterSources,
) -> Result<(usize, usize), ConfigError> {
    let rules = sources.load()?;
    let counts = (rules.whitelist().len(), rules.blacklist().len());
    engine.install(rules);
    Ok(counts)
}

fn spawn_stats_task(resolver: Arc<Resolver>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let stats = resolver.stats_snapshot_and_reset();
            let top_types: Vec<String> = stats
                .top_query_types
                .iter()
                .map(|(code, count)| match qtype_name(*code) {
                    Some(name) => format!("{name}={count}"),
                    None => format!("TYPE{code}={count}"),
                })
                .collect();
            info!(
                "[stats] requests={} forwarded={} blocked={} bypassed={} dropped={} avg_response={:.2}ms types=[{}]",
                stats.requests,
                stats.forwarded,
                stats.blocked,
                stats.bypassed,
                stats.dropped,
                stats.avg_response_ms,
                top_types.join(" ")
            );
        }
    })
}
