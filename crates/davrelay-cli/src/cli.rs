//! CLI argument definitions for davrelay
//!
//! Every `serve` option can also come from the environment, so container
//! deployments configure the relay without flags.

use clap::{Args, Parser, Subcommand};
use davrelay_proxy::config::{DEFAULT_PORT, DEFAULT_UPSTREAM_TIMEOUT_SECS};
use std::net::IpAddr;

/// davrelay - keep WebDAV passwords out of media players
///
/// Relays media downloads and adds HTTP Basic credentials on the way out,
/// taken from the target URL or from an encrypted `auth` parameter.
#[derive(Parser, Debug)]
#[command(name = "davrelay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay server
    #[command(after_help = "EXAMPLES:
    # Listen on 0.0.0.0:3000
    davrelay serve

    # Accept encrypted auth parameters
    ENCRYPTION_KEY=s3cret davrelay serve --port 8080
")]
    Serve(ServeArgs),

    /// Turn a WebDAV download link into a relay link
    #[command(after_help = "EXAMPLES:
    # Credentials stay inside the url parameter
    davrelay link --proxy-url https://relay.example.com https://u:p@dav.example.com/a.mp3

    # Credentials move into an encrypted auth parameter
    davrelay link --proxy-url https://relay.example.com --encryption-key s3cret \\
        https://u:p@dav.example.com/a.mp3
")]
    Link(LinkArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long = "bind", env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: IpAddr,

    /// Port to listen on (0 = OS-assigned)
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Shared secret for decrypting `auth` parameters (empty = disabled)
    #[arg(long, env = "ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: Option<String>,

    /// Seconds to wait for upstream response headers (0 = no limit)
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = DEFAULT_UPSTREAM_TIMEOUT_SECS)]
    pub upstream_timeout_secs: u64,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 256)]
    pub max_connections: usize,
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Base URL of the relay
    #[arg(long, env = "PROXY_URL")]
    pub proxy_url: String,

    /// Shared secret; when set, credentials are encrypted into `auth`
    #[arg(long, env = "ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: Option<String>,

    /// Download URL to rewrite (read from stdin when omitted)
    pub url: Option<String>,
}
