//! davrelay CLI - credential-shielding relay for WebDAV media
//!
//! `serve` runs the standalone relay; `link` is the producer side, turning
//! a credentialed download URL into a relay link.

mod cli;

use clap::Parser;
use cli::{Cli, Commands, LinkArgs, ServeArgs};
use davrelay_proxy::{CredentialCipher, ProxyConfig, ProxyError};
use davrelay_source::link::relay_link;
use std::future::Future;
use std::io::BufRead;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to read URL from stdin: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

type Result<T> = std::result::Result<T, CliError>;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    if let Err(e) = run() {
        error!("{}", e);
        eprintln!("davrelay: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => run_serve(args),
        Commands::Link(args) => run_link(args),
    }
}

fn build_proxy_config(args: ServeArgs) -> ProxyConfig {
    ProxyConfig {
        bind_addr: args.bind_addr,
        bind_port: args.port,
        upstream_timeout_secs: args.upstream_timeout_secs,
        max_connections: args.max_connections,
        ..ProxyConfig::default()
    }
    .with_encryption_key(args.encryption_key)
}

fn run_serve(args: ServeArgs) -> Result<()> {
    let config = build_proxy_config(args);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| ProxyError::Config(format!("Failed to start runtime: {}", e)))?;

    rt.block_on(async {
        let stop = shutdown_signal().map_err(CliError::Signal)?;
        let handle = davrelay_proxy::start(config).await?;
        let signal = stop.await;
        info!("{} received, stopping relay", signal);
        handle.shutdown();
        Ok::<(), CliError>(())
    })
}

/// Resolves with the name of the first termination signal received.
/// Handlers are installed before this returns.
#[cfg(unix)]
fn shutdown_signal() -> std::io::Result<impl Future<Output = &'static str>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> std::io::Result<impl Future<Output = &'static str>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        "Ctrl-C"
    })
}

fn run_link(args: LinkArgs) -> Result<()> {
    let raw = match args.url {
        Some(url) => url,
        None => read_stdin_line()?,
    };
    let raw_url = parse_url(raw.trim())?;
    parse_url(&args.proxy_url)?;

    let cipher = args
        .encryption_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .map(CredentialCipher::new);

    println!(
        "{}",
        relay_link(Some(args.proxy_url.as_str()), &raw_url, cipher.as_ref())
    );
    Ok(())
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|source| CliError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

fn read_stdin_line() -> Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(CliError::Stdin)?;
    Ok(line)
}
