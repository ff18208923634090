//! Proxy configuration types.
//!
//! The configuration is read-only after startup. It holds the listen address,
//! the optional shared encryption key for `auth` parameters, and limits for
//! upstream waits and concurrent connections.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;
use zeroize::Zeroizing;

/// Default port, matching the usual deployment of the relay.
pub const DEFAULT_PORT: u16 = 3000;

/// Default bound on the wait for upstream response headers.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Configuration for the proxy server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Bind address (default: 0.0.0.0)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: IpAddr,

    /// Bind port (0 = OS-assigned ephemeral port)
    #[serde(default = "default_port")]
    pub bind_port: u16,

    /// Shared secret for decrypting `auth` parameters.
    /// `None` disables decryption; only URL-embedded credentials are used.
    #[serde(skip)]
    pub encryption_key: Option<Zeroizing<String>>,

    /// Seconds to wait for upstream response headers (0 = no bound).
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    /// Maximum concurrent connections (0 = unlimited).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            bind_port: DEFAULT_PORT,
            encryption_key: None,
            upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            max_connections: default_max_connections(),
        }
    }
}

impl ProxyConfig {
    /// Set the encryption key, treating an empty string as "not configured".
    #[must_use]
    pub fn with_encryption_key(mut self, key: Option<String>) -> Self {
        self.encryption_key = key.filter(|k| !k.is_empty()).map(Zeroizing::new);
        self
    }

    /// Upstream header wait bound, if any.
    #[must_use]
    pub fn upstream_timeout(&self) -> Option<Duration> {
        match self.upstream_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn default_bind_addr() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_upstream_timeout_secs() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

fn default_max_connections() -> usize {
    256
}
