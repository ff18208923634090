//! Outbound fetch capability.
//!
//! [`UpstreamFetch`] is the seam between the shared relay logic and whatever
//! performs the actual outbound call. The standalone server uses
//! [`HttpFetcher`] (reqwest over rustls); an edge host can plug in its own
//! fetch primitive, and tests plug in a recording fake.

use crate::error::FetchError;
use crate::request::ProxyMethod;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use http::{HeaderMap, StatusCode};
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Maximum number of redirects followed for one request.
const MAX_REDIRECTS: usize = 10;

/// Timeout for upstream TCP connect.
const UPSTREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upstream response body as a stream of chunks.
pub type BodyStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// Request sent to the upstream.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: ProxyMethod,
    /// Target without user-info
    pub url: Url,
    /// Allow-listed headers plus the sensitive `Authorization`, if any
    pub headers: HeaderMap,
}

/// Response head and streaming body from the upstream.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Performs the outbound call.
///
/// The returned future resolves once response headers are available; the
/// body is then pulled chunk by chunk. Dropping the future or the body
/// aborts the call.
pub trait UpstreamFetch: Send + Sync {
    fn fetch(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, FetchError>> + Send;
}

/// Production fetcher backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher that follows redirects and never decompresses bodies,
    /// so `Content-Length` and `Content-Range` stay byte-accurate. Proxy
    /// environment variables are ignored.
    pub fn new() -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .connect_timeout(UPSTREAM_CONNECT_TIMEOUT)
            .tcp_nodelay(true)
            .no_proxy()
            .build()
            .map_err(|e| crate::ProxyError::Config(format!("HTTP client error: {}", e)))?;
        Ok(Self { client })
    }
}

impl UpstreamFetch for HttpFetcher {
    async fn fetch(&self, request: OutboundRequest) -> Result<UpstreamResponse, FetchError> {
        debug!("Fetching upstream: {} {}", request.method, request.url.host_str().unwrap_or(""));
        let response = self
            .client
            .request(request.method.to_http(), request.url)
            .headers(request.headers)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Connect(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map_err(|e| FetchError::Body(e.without_url().to_string()))
            .boxed();

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
