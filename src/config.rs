//! TOML configuration.
//!
//! ```toml
//! resolver = "1.1.1.1"
//! listen = "127.0.0.1:53"
//! upstream_timeout_secs = 5
//! reload_interval_secs = 300
//! no_filter = false
//!
//! [filters]
//! whitelist = ["whitelist.txt"]
//! blacklist = ["blacklist.txt"]
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::filter::FilterSources;
use crate::proxy::ProxyConfig;
use crate::resolver::RelaySettings;

/// Port used when the resolver is given without one.
pub const DNS_PORT: u16 = 53;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Upstream resolver, `ip` or `ip:port`.
    pub resolver: String,
    /// Local address to listen on.
    pub listen: String,
    pub upstream_timeout_secs: u64,
    /// Seconds between two pattern file reloads.
    pub reload_interval_secs: u64,
    pub no_filter: bool,
    pub filters: FiltersConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FiltersConfig {
    pub whitelist: Vec<PathBuf>,
    pub blacklist: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resolver: "1.1.1.1".to_string(),
            listen: "127.0.0.1:53".to_string(),
            upstream_timeout_secs: 5,
            reload_interval_secs: 300,
            no_filter: false,
            filters: FiltersConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn resolver_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_resolver(&self.resolver)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen
            .parse()
            .map_err(|_| ConfigError::InvalidListen(self.listen.clone()))
    }

    pub fn filter_sources(&self) -> FilterSources {
        FilterSources {
            whitelist: self.filters.whitelist.clone(),
            blacklist: self.filters.blacklist.clone(),
        }
    }

    pub fn relay_settings(&self) -> Result<RelaySettings, ConfigError> {
        Ok(RelaySettings {
            upstream: self.resolver_addr()?,
            upstream_timeout: Duration::from_secs(self.upstream_timeout_secs),
            no_filter: self.no_filter,
        })
    }

    /// Everything the proxy needs to run.
    pub fn proxy_config(&self) -> Result<ProxyConfig, ConfigError> {
        if self.reload_interval_secs == 0 {
            return Err(ConfigError::ZeroReloadInterval);
        }
        Ok(ProxyConfig {
            bind_addr: self.listen_addr()?,
            relay: self.relay_settings()?,
            sources: self.filter_sources(),
            reload_interval: Duration::from_secs(self.reload_interval_secs),
        })
    }
}

/// Parse `ip` or `ip:port`; a bare address gets port 53.
pub fn parse_resolver(value: &str) -> Result<SocketAddr, ConfigError> {
    let value = value.trim();
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }
    value
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .map_err(|_| ConfigError::InvalidResolver(value.to_string()))
}
