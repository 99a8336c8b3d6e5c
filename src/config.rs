use clap::Parser;
use serde::{Deserialize, Deserializer};
use std::{
    io,
    net::Ipv4Addr,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

pub const DHCP_SERVER_PORT: u16 = 67;
pub const DHCP_CLIENT_PORT: u16 = 68;
pub const DEFAULT_LEASE_SECONDS: u32 = 3600;

/// Addresses that fit in a single option 6 instance (255 / 4).
pub const MAX_DNS_SERVERS: usize = 63;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Network interface to bind to (e.g., 'eth1'), overrides the config file
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file")]
    Parse(#[from] serde_json::Error),

    #[error("Pool start {start} is above pool end {end}")]
    InvertedPool { start: Ipv4Addr, end: Ipv4Addr },

    #[error("Lease time must be at least one second")]
    ZeroLeaseTime,

    #[error("Server address must not be 0.0.0.0")]
    UnspecifiedServerAddress,

    #[error("Server address {0} lies inside the address pool")]
    ServerAddressInPool(Ipv4Addr),

    #[error("{0} DNS servers configured; at most 63 fit in one option")]
    TooManyDnsServers(usize),
}

/// Everything the responder needs to know, fixed for the process lifetime.
///
/// Field names of the older deployment format (`bind_ip`, `server_ip`,
/// `lease_time_seconds`) are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    #[serde(alias = "bind_ip", default = "default_bind_address")]
    pub bind_address: Ipv4Addr,
    #[serde(alias = "server_ip")]
    pub server_address: Ipv4Addr,
    pub pool_start: Ipv4Addr,
    pub pool_end: Ipv4Addr,
    #[serde(default = "default_subnet_mask")]
    pub subnet_mask: Ipv4Addr,
    #[serde(default)]
    pub router: Option<Ipv4Addr>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub dns: Vec<Ipv4Addr>,
    #[serde(alias = "lease_time_seconds", default = "default_lease_seconds")]
    pub lease_seconds: u32,
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_client_port")]
    pub client_port: u16,
}

fn default_bind_address() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_subnet_mask() -> Ipv4Addr {
    Ipv4Addr::new(255, 255, 255, 0)
}

fn default_lease_seconds() -> u32 {
    DEFAULT_LEASE_SECONDS
}

fn default_server_port() -> u16 {
    DHCP_SERVER_PORT
}

fn default_client_port() -> u16 {
    DHCP_CLIENT_PORT
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Ipv4Addr>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Ipv4Addr),
        Many(Vec<Ipv4Addr>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(ip) => vec![ip],
        OneOrMany::Many(ips) => ips,
    })
}

impl ServerConfig {
    pub fn new(server_address: Ipv4Addr, pool_start: Ipv4Addr, pool_end: Ipv4Addr) -> Self {
        Self {
            bind_address: default_bind_address(),
            server_address,
            pool_start,
            pool_end,
            subnet_mask: default_subnet_mask(),
            router: None,
            dns: Vec::new(),
            lease_seconds: DEFAULT_LEASE_SECONDS,
            interface: None,
            server_port: DHCP_SERVER_PORT,
            client_port: DHCP_CLIENT_PORT,
        }
    }

    /// Reads, parses and validates a JSON config file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if u32::from(self.pool_start) > u32::from(self.pool_end) {
            return Err(ConfigError::InvertedPool {
                start: self.pool_start,
                end: self.pool_end,
            });
        }
        if self.lease_seconds == 0 {
            return Err(ConfigError::ZeroLeaseTime);
        }
        if self.server_address.is_unspecified() {
            return Err(ConfigError::UnspecifiedServerAddress);
        }
        if (self.pool_start..=self.pool_end).contains(&self.server_address) {
            return Err(ConfigError::ServerAddressInPool(self.server_address));
        }
        if self.dns.len() > MAX_DNS_SERVERS {
            return Err(ConfigError::TooManyDnsServers(self.dns.len()));
        }
        Ok(())
    }

    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.lease_seconds))
    }
}
