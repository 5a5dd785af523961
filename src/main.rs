use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use dnswall::config::Config;
use dnswall::proxy;

#[derive(Parser)]
#[command(name = "dnswall")]
#[command(about = "DNS relay that blocks domains matching regex blacklists", long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "dnswall.toml")]
    config: PathBuf,

    /// Upstream DNS resolver (ip or ip:port)
    #[arg(short, long)]
    resolver: Option<String>,

    /// Local address to listen on
    #[arg(short, long)]
    bind: Option<String>,

    /// Seconds between two blocklist reloads
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Seconds to wait for the upstream resolver
    #[arg(long)]
    upstream_timeout: Option<u64>,

    /// Don't filter DNS requests, just log them
    #[arg(short, long)]
    no_filter: bool,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log file (defaults to stderr)
    #[arg(short, long)]
    log_file: Option<PathBuf>,
}

impl Args {
    /// Command line values win over the configuration file.
    fn apply(&self, config: &mut Config) {
        if let Some(resolver) = &self.resolver {
            config.resolver = resolver.clone();
        }
        if let Some(bind) = &self.bind {
            config.listen = bind.clone();
        }
        if let Some(secs) = self.timeout {
            config.reload_interval_secs = secs;
        }
        if let Some(secs) = self.upstream_timeout {
            config.upstream_timeout_secs = secs;
        }
        if self.no_filter {
            config.no_filter = true;
        }
    }
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(path) = &args.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file: {}", path.display()))?;
        registry
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    args.apply(&mut config);
    let proxy_config = config.proxy_config()?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(proxy::run(proxy_config))
}
