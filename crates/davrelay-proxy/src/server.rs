//! Standalone relay server: TCP listener, request parsing, and lifecycle.
//!
//! The server binds to `config.bind_addr:config.bind_port`, accepts TCP
//! connections, and spawns one task per connection. Each connection carries
//! a single request: the handler reads the request line and headers, runs
//! the shared [`ProxyService`], and writes the reply with
//! `Connection: close`, so bodies without a `Content-Length` are delimited
//! by closing the socket.

use crate::audit;
use crate::cipher::CredentialCipher;
use crate::config::ProxyConfig;
use crate::error::{ProxyError, Rejection, Result};
use crate::request::InboundRequest;
use crate::service::{ProxyReply, ProxyService};
use crate::upstream::HttpFetcher;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Maximum total size of HTTP headers (64 KiB). Prevents OOM from
/// malicious clients sending unbounded header data.
const MAX_HEADER_SIZE: usize = 64 * 1024;

/// Bounds on discarding client input after an early error reply.
const MAX_DRAIN_BYTES: usize = 1024 * 1024;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle returned when the proxy server starts.
///
/// Drop the handle or call [`ProxyHandle::shutdown`] to stop accepting.
pub struct ProxyHandle {
    /// The actual port the proxy is listening on
    pub port: u16,
    /// Send `true` to trigger graceful shutdown
    shutdown_tx: watch::Sender<bool>,
    state: Arc<ProxyState>,
}

impl ProxyHandle {
    /// Signal the proxy to shut down gracefully.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Connections currently being served.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.state.active_connections.load(Ordering::Relaxed)
    }
}

/// Shared state for the proxy server. Read-only after startup.
struct ProxyState {
    service: ProxyService<HttpFetcher>,
    max_connections: usize,
    /// Active connection count for connection limiting.
    active_connections: AtomicUsize,
}

/// Start the proxy server.
///
/// Binds to `config.bind_addr:config.bind_port` (port 0 = OS-assigned)
/// and begins accepting connections on the current runtime.
pub async fn start(config: ProxyConfig) -> Result<ProxyHandle> {
    let bind_addr = SocketAddr::new(config.bind_addr, config.bind_port);
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| ProxyError::Bind {
            addr: bind_addr.to_string(),
            source: e,
        })?;

    let local_addr = listener.local_addr().map_err(|e| ProxyError::Bind {
        addr: bind_addr.to_string(),
        source: e,
    })?;
    let port = local_addr.port();

    info!("Relay listening on {}", local_addr);
    info!("Usage: http://{}/?url=<target URL>", local_addr);

    let cipher = config
        .encryption_key
        .as_deref()
        .map(|key| CredentialCipher::new(key));
    if cipher.is_some() {
        info!("Encrypted auth parameters enabled");
    } else {
        info!("No encryption key configured, only URL credentials are used");
    }

    let service = ProxyService::new(HttpFetcher::new()?)
        .with_cipher(cipher)
        .with_upstream_timeout(config.upstream_timeout());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let state = Arc::new(ProxyState {
        service,
        max_connections: config.max_connections,
        active_connections: AtomicUsize::new(0),
    });

    // The caller must keep the runtime driven for the accept loop to run.
    tokio::spawn(accept_loop(listener, Arc::clone(&state), shutdown_rx));

    Ok(ProxyHandle {
        port,
        shutdown_tx,
        state,
    })
}

/// Accept loop: listen for connections until shutdown.
async fn accept_loop(
    listener: TcpListener,
    state: Arc<ProxyState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let max = state.max_connections;
                        if max > 0 {
                            let current = state.active_connections.load(Ordering::Relaxed);
                            if current >= max {
                                warn!("Connection limit reached ({}/{}), rejecting {}", current, max, addr);
                                drop(stream);
                                continue;
                            }
                        }
                        state.active_connections.fetch_add(1, Ordering::Relaxed);

                        debug!("Accepted connection from {}", addr);
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, &state).await {
                                debug!("Connection handler error: {}", e);
                            }
                            state.active_connections.fetch_sub(1, Ordering::Relaxed);
                        });
                    }
                    Err(e) => {
                        warn!("Accept error: {}", e);
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Relay server shutting down");
                    return;
                }
            }
        }
    }
}

/// Request head as read from the socket.
enum Head {
    Request { line: String, headers: HeaderMap },
    /// Connection closed before a complete head arrived
    Closed,
    /// Head exceeds `MAX_HEADER_SIZE`, with or without a line terminator
    TooLarge,
    /// Head is not valid UTF-8
    Malformed,
}

/// Read the request line and headers, never buffering more than
/// `MAX_HEADER_SIZE` bytes in total.
async fn read_head<R: AsyncBufRead + Unpin>(reader: R) -> std::io::Result<Head> {
    let mut reader = reader.take(MAX_HEADER_SIZE as u64);
    let mut request_line: Option<String> = None;
    let mut headers = HeaderMap::new();
    let mut raw = Vec::new();
    loop {
        raw.clear();
        reader.read_until(b'\n', &mut raw).await?;
        if !raw.ends_with(b"\n") {
            if reader.limit() == 0 {
                return Ok(Head::TooLarge);
            }
            return Ok(Head::Closed);
        }
        let Ok(line) = std::str::from_utf8(&raw) else {
            return Ok(Head::Malformed);
        };
        let line = line.trim_end_matches(['\r', '\n']);
        match request_line {
            None => request_line = Some(line.to_string()),
            Some(_) if line.is_empty() => break,
            Some(_) => {
                if let Some((name, value)) = parse_header_line(line) {
                    headers.append(name, value);
                }
            }
        }
    }
    Ok(match request_line {
        Some(line) => Head::Request { line, headers },
        None => Head::Closed,
    })
}

/// Handle a single client connection carrying one request.
async fn handle_connection(mut stream: TcpStream, state: &ProxyState) -> Result<()> {
    let head = read_head(BufReader::new(&mut stream)).await?;
    let (request_line, headers) = match head {
        Head::Request { line, headers } => (line, headers),
        Head::Closed => return Ok(()), // Client disconnected
        Head::TooLarge => {
            let rejection = Rejection::HeadersTooLarge;
            audit::log_rejected("-", rejection.status().as_u16(), &rejection.to_string());
            write_reply(&mut stream, ProxyReply::rejected(&rejection)).await?;
            drain_before_close(&mut stream).await;
            return Ok(());
        }
        Head::Malformed => {
            write_reply(&mut stream, ProxyReply::plain(StatusCode::BAD_REQUEST, "Bad Request")).await?;
            drain_before_close(&mut stream).await;
            return Err(ProxyError::HttpParse("request head is not valid UTF-8".to_string()));
        }
    };

    let (method, target) = match parse_request_line(&request_line) {
        Ok(parts) => parts,
        Err(e) => {
            write_reply(&mut stream, ProxyReply::plain(StatusCode::BAD_REQUEST, "Bad Request")).await?;
            return Err(e);
        }
    };

    let inbound = InboundRequest {
        method,
        query: target.split_once('?').map(|(_, query)| query),
        headers: &headers,
    };
    let reply = state.service.handle(&inbound).await;
    write_reply(&mut stream, reply).await
}

/// After an early error reply, read and discard what the client is still
/// sending (bounded in size and time). Closing with unread input would
/// reset the connection and could destroy the reply before it is read.
async fn drain_before_close(stream: &mut TcpStream) {
    let mut scratch = [0u8; 8192];
    let mut drained = 0usize;
    let deadline = tokio::time::sleep(DRAIN_TIMEOUT);
    tokio::pin!(deadline);
    while drained < MAX_DRAIN_BYTES {
        tokio::select! {
            read = stream.read(&mut scratch) => match read {
                Ok(0) | Err(_) => return,
                Ok(n) => drained += n,
            },
            _ = &mut deadline => return,
        }
    }
}

/// Parse an HTTP request line into (method, request-target).
fn parse_request_line(line: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 || !parts[2].starts_with("HTTP/") {
        return Err(ProxyError::HttpParse(format!(
            "malformed request line: {}",
            line
        )));
    }
    Ok((parts[0], parts[1]))
}

/// Parse a `Name: value` header line. Invalid names or values are skipped.
fn parse_header_line(line: &str) -> Option<(HeaderName, HeaderValue)> {
    let (name, value) = line.split_once(':')?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).ok()?;
    let value = HeaderValue::from_str(value.trim()).ok()?;
    Some((name, value))
}

/// Serialize the reply head, then stream the body.
async fn write_reply(stream: &mut TcpStream, reply: ProxyReply) -> Result<()> {
    let ProxyReply {
        status,
        headers,
        mut body,
    } = reply;

    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
    .into_bytes();
    for (name, value) in &headers {
        head.extend_from_slice(name.as_str().as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }
    head.extend_from_slice(b"Connection: close\r\n\r\n");
    stream.write_all(&head).await?;

    // Stream the body without buffering. A write error or a reset from the
    // client ends the relay; returning drops the body, which releases the
    // upstream connection. EOF on the read side only means the client
    // half-closed and is still reading.
    let (mut reader, mut writer) = stream.split();
    let mut scratch = [0u8; 512];
    let mut client_sending = true;
    loop {
        tokio::select! {
            chunk = body.next_chunk() => match chunk {
                Some(Ok(data)) => writer.write_all(&data).await?,
                Some(Err(e)) => {
                    debug!("Upstream body ended early: {}", e);
                    break;
                }
                None => break,
            },
            read = reader.read(&mut scratch), if client_sending => match read {
                Ok(0) => client_sending = false,
                Ok(_) => {}
                Err(e) => {
                    debug!("Client disconnected mid-stream, dropping upstream body: {}", e);
                    return Ok(());
                }
            },
        }
    }
    drop(body);
    writer.flush().await?;
    let _ = stream.shutdown().await;
    Ok(())
}
