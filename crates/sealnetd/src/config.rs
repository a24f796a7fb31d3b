//! Configuration for sealnetd

use clap::{Parser, ValueEnum};
use sealnet_core::{CapabilityLimits, RoutingKey};
use sealnet_net::{ServerSettings, TransportConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default inbox ceiling
pub const DEFAULT_MAX_INBOX: usize = 10_000;

/// sealnetd - SealNet storage node
#[derive(Parser, Debug, Clone)]
#[command(name = "sealnetd")]
#[command(about = "SealNet storage node: HTTPS message and fragment endpoint")]
pub struct Config {
    /// Listen address for HTTPS connections
    #[arg(short, long, env = "SEALNET_LISTEN", default_value = "0.0.0.0:8443")]
    pub listen: SocketAddr,

    /// Data directory for persistent storage
    #[arg(short, long, env = "SEALNET_DATA_DIR", default_value = "./data/sealnetd")]
    pub data_dir: PathBuf,

    /// PEM certificate chain presented to peers
    #[arg(long, env = "SEALNET_TLS_CERT")]
    pub tls_cert: PathBuf,

    /// PEM private key for the certificate
    #[arg(long, env = "SEALNET_TLS_KEY")]
    pub tls_key: PathBuf,

    /// PEM bundle of peer certificates to trust for outbound calls
    #[arg(long, env = "SEALNET_TRUST_ROOTS")]
    pub trust_roots: Option<PathBuf>,

    /// Identity file (defaults to <data_dir>/identity.hex)
    #[arg(long, env = "SEALNET_IDENTITY")]
    pub identity: Option<PathBuf>,

    /// Connections served concurrently
    #[arg(long, default_value = "100")]
    pub workers: usize,

    /// Pending connection queue length
    #[arg(long, default_value = "100")]
    pub backlog: u32,

    /// TLS handshake timeout in seconds
    #[arg(long, default_value = "10")]
    pub handshake_timeout_secs: u64,

    /// Outbound connect timeout in seconds
    #[arg(long, default_value = "5")]
    pub connect_timeout_secs: u64,

    /// Request timeout in seconds, inbound and outbound
    #[arg(long, default_value = "30")]
    pub request_timeout_secs: u64,

    /// Maximum username length in capabilities
    #[arg(long, default_value_t = sealnet_core::limits::MAX_USERNAME_SIZE)]
    pub max_username_len: usize,

    /// Maximum serialized resource pointer length
    #[arg(long, default_value_t = sealnet_core::limits::MAX_POINTER_SIZE)]
    pub max_pointer_len: usize,

    /// Maximum readers or writers per capability
    #[arg(long, default_value_t = sealnet_core::limits::MAX_SET_SIZE)]
    pub max_set_len: usize,

    /// Maximum encoded protocol message size
    #[arg(long, default_value_t = sealnet_net::message::DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,

    /// Maximum fragment size
    #[arg(long, default_value_t = sealnet_net::fragment::DEFAULT_MAX_FRAGMENT_SIZE)]
    pub max_fragment_size: usize,

    /// Messages held in the inbox before new ones are refused
    #[arg(long, env = "SEALNET_MAX_INBOX", default_value_t = DEFAULT_MAX_INBOX)]
    pub max_inbox: usize,

    /// Static route, `<routing-key-hex>=<host:port>` (repeatable)
    #[arg(long)]
    pub route: Vec<Route>,

    /// Peer for keys without a static route
    #[arg(long)]
    pub fallback: Option<SocketAddr>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log format
    #[arg(long, value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// A static routing table entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Route {
    pub key: RoutingKey,
    pub addr: SocketAddr,
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, addr) = s
            .split_once('=')
            .ok_or_else(|| format!("route must be <key-hex>=<host:port>, got {:?}", s))?;
        let key = RoutingKey::from_hex(key.trim())
            .ok_or_else(|| format!("routing key must be 64 hex characters, got {:?}", key))?;
        let addr = addr
            .trim()
            .parse()
            .map_err(|e| format!("bad route address {:?}: {}", addr, e))?;
        Ok(Route { key, addr })
    }
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            anyhow::bail!("workers must be non-zero");
        }
        if self.backlog == 0 {
            anyhow::bail!("backlog must be non-zero");
        }
        if self.max_inbox == 0 {
            anyhow::bail!("max_inbox must be non-zero");
        }
        if self.handshake_timeout_secs == 0
            || self.connect_timeout_secs == 0
            || self.request_timeout_secs == 0
        {
            anyhow::bail!("timeouts must be non-zero");
        }
        self.capability_limits().validate()?;
        self.server_settings().validate()?;
        self.transport_config().validate()?;
        Ok(())
    }

    pub fn identity_path(&self) -> PathBuf {
        self.identity
            .clone()
            .unwrap_or_else(|| self.data_dir.join("identity.hex"))
    }

    pub fn capability_limits(&self) -> CapabilityLimits {
        CapabilityLimits {
            max_username_len: self.max_username_len,
            max_pointer_len: self.max_pointer_len,
            max_set_len: self.max_set_len,
        }
    }

    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            listen: self.listen,
            workers: self.workers,
            backlog: self.backlog,
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_message_size: self.max_message_size,
            max_fragment_size: self.max_fragment_size,
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_message_size: self.max_message_size,
            max_fragment_size: self.max_fragment_size,
        }
    }
}
