//! Shared relay logic used by every deployment variant.
//!
//! [`ProxyService::handle`] validates the inbound request, resolves the
//! credential, performs the outbound call through an [`UpstreamFetch`], and
//! produces a [`ProxyReply`] for the variant to write out. Client errors
//! never reach the fetcher; upstream errors become 502/504. Nothing here
//! returns an error to the caller.

use crate::audit;
use crate::body::RelayBody;
use crate::cipher::CredentialCipher;
use crate::cors;
use crate::credential;
use crate::error::{FetchError, Rejection};
use crate::request::{InboundRequest, ProxyMethod, ProxyRequest};
use crate::upstream::{OutboundRequest, UpstreamFetch, UpstreamResponse};
use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

/// Upstream headers that describe the upstream connection rather than the
/// payload. The variants re-frame the body themselves.
const HOP_BY_HOP_HEADERS: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

/// Status, headers and body to send back to the client.
#[derive(Debug)]
pub struct ProxyReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: RelayBody,
}

impl ProxyReply {
    /// Plain-text reply with CORS headers.
    #[must_use]
    pub fn plain(status: StatusCode, message: impl Into<Bytes>) -> Self {
        let message = message.into();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(message.len()));
        cors::apply(&mut headers);
        Self {
            status,
            headers,
            body: RelayBody::Full(Some(message)),
        }
    }

    /// Reply for a rejected request. The body is the rejection's message.
    #[must_use]
    pub fn rejected(rejection: &Rejection) -> Self {
        Self::plain(rejection.status(), rejection.to_string())
    }

    /// Reply for a failed upstream call.
    #[must_use]
    pub fn upstream_failed(error: &FetchError) -> Self {
        match error.status() {
            StatusCode::GATEWAY_TIMEOUT => Self::plain(StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout"),
            status => Self::plain(status, "Bad Gateway"),
        }
    }

    /// `204 No Content` with CORS headers, for preflight requests.
    #[must_use]
    pub fn preflight() -> Self {
        let mut headers = HeaderMap::new();
        cors::apply(&mut headers);
        Self {
            status: StatusCode::NO_CONTENT,
            headers,
            body: RelayBody::Empty,
        }
    }

    /// Convert into an `http::Response` for hosts that speak the `http` types.
    #[must_use]
    pub fn into_response(self) -> http::Response<RelayBody> {
        let mut response = http::Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// The relay, parameterized by its outbound fetch capability.
#[derive(Debug)]
pub struct ProxyService<F> {
    fetcher: F,
    cipher: Option<CredentialCipher>,
    upstream_timeout: Option<Duration>,
}

impl<F: UpstreamFetch> ProxyService<F> {
    /// Create a service with no decryption key and no upstream wait bound.
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            cipher: None,
            upstream_timeout: None,
        }
    }

    /// Enable decryption of `auth` parameters.
    #[must_use]
    pub fn with_cipher(mut self, cipher: Option<CredentialCipher>) -> Self {
        self.cipher = cipher;
        self
    }

    /// Bound the wait for upstream response headers.
    #[must_use]
    pub fn with_upstream_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    #[must_use]
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Handle one inbound request end to end.
    pub async fn handle(&self, inbound: &InboundRequest<'_>) -> ProxyReply {
        let request = match ProxyRequest::parse(inbound) {
            Ok(request) => request,
            Err(rejection) => {
                audit::log_rejected(inbound.method, rejection.status().as_u16(), &rejection.to_string());
                return ProxyReply::rejected(&rejection);
            }
        };

        let host = request.target.host_str().unwrap_or_default().to_string();
        if request.method == ProxyMethod::Options {
            audit::log_preflight(&host);
            return ProxyReply::preflight();
        }

        let ProxyRequest {
            method,
            mut target,
            forwarded_headers,
            auth_param,
        } = request;

        let mut headers = forwarded_headers;
        let authenticated = {
            let credential =
                credential::resolve(&mut target, auth_param.as_deref(), self.cipher.as_ref());
            match credential {
                Some(credential) => match HeaderValue::from_str(&credential.basic_header()) {
                    Ok(mut value) => {
                        value.set_sensitive(true);
                        headers.insert(header::AUTHORIZATION, value);
                        true
                    }
                    Err(_) => {
                        warn!("Credential produced an invalid Authorization header, skipping");
                        false
                    }
                },
                None => false,
            }
        };

        let path = target.path().to_string();
        debug!("Relaying {} to {}{}", method, host, path);
        let outbound = OutboundRequest {
            method,
            url: target,
            headers,
        };

        match self.fetch(outbound).await {
            Ok(response) => {
                audit::log_relayed(
                    method.as_str(),
                    &host,
                    &path,
                    response.status.as_u16(),
                    authenticated,
                );
                relay_response(method, response)
            }
            Err(error) => {
                warn!("Upstream request to {} failed: {}", host, error);
                let reply = ProxyReply::upstream_failed(&error);
                audit::log_upstream_failure(method.as_str(), &host, error.kind(), reply.status.as_u16());
                reply
            }
        }
    }

    /// Run the fetch, dropping it if the upstream does not answer in time.
    async fn fetch(&self, outbound: OutboundRequest) -> Result<UpstreamResponse, FetchError> {
        let fetch = self.fetcher.fetch(outbound);
        match self.upstream_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .unwrap_or(Err(FetchError::Timeout)),
            None => fetch.await,
        }
    }
}

/// Build the client reply from an upstream response.
///
/// Status and payload headers (including `Content-Range`, `Accept-Ranges` and
/// `Content-Length`) are kept as-is; hop-by-hop headers are dropped; CORS
/// headers are applied last so upstream values never shadow them.
fn relay_response(method: ProxyMethod, response: UpstreamResponse) -> ProxyReply {
    let UpstreamResponse {
        status,
        headers: upstream_headers,
        body,
    } = response;

    let mut headers = HeaderMap::with_capacity(upstream_headers.len() + cors::CORS_HEADERS.len());
    let mut current: Option<HeaderName> = None;
    for (name, value) in upstream_headers {
        // HeaderMap iteration yields the name only on its first value.
        if let Some(name) = name {
            current = Some(name);
        }
        let Some(name) = current.as_ref() else {
            continue;
        };
        if is_hop_by_hop(name) {
            continue;
        }
        headers.append(name.clone(), value);
    }
    cors::apply(&mut headers);

    let body = if method == ProxyMethod::Head || !status_has_body(status) {
        RelayBody::Empty
    } else {
        RelayBody::Stream(body)
    };

    ProxyReply {
        status,
        headers,
        body,
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

fn status_has_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::credential::Credential;
    use crate::testing::{FakeFetcher, FakeResponse};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(*value));
        }
        map
    }

    async fn body_text(mut body: RelayBody) -> String {
        let mut out = Vec::new();
        while let Some(chunk) = body.next_chunk().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        String::from_utf8(out).unwrap()
    }

    fn assert_cors(headers: &HeaderMap) {
        assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
        assert_eq!(headers.get("access-control-allow-headers").unwrap(), "*");
        assert_eq!(
            headers.get("access-control-allow-methods").unwrap(),
            "GET,HEAD,OPTIONS"
        );
        assert_eq!(headers.get("access-control-expose-headers").unwrap(), "*");
    }

    #[tokio::test]
    async fn test_post_rejected_without_fetch() {
        let service = ProxyService::new(FakeFetcher::ok(FakeResponse::default()));
        let inbound_headers = HeaderMap::new();
        let reply = service
            .handle(&InboundRequest {
                method: "POST",
                query: Some("url=http%3A%2F%2Fexample.com%2F"),
                headers: &inbound_headers,
            })
            .await;
        assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_text(reply.body).await, "Method Not Allowed");
        assert_eq!(service.fetcher().call_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_body_matches_rejection_message() {
        for rejection in [
            Rejection::MethodNotAllowed,
            Rejection::MissingUrl,
            Rejection::InvalidTarget,
            Rejection::HeadersTooLarge,
        ] {
            let reply = ProxyReply::rejected(&rejection);
            let message = rejection.to_string();
            assert_eq!(reply.status, rejection.status());
            assert_eq!(
                reply.headers.get(header::CONTENT_LENGTH).unwrap(),
                message.len().to_string().as_str()
            );
            assert_cors(&reply.headers);
            assert_eq!(body_text(reply.body).await, message);
        }
    }

    #[tokio::test]
    async fn test_missing_and_invalid_url_rejected() {
        let service = ProxyService::new(FakeFetcher::ok(FakeResponse::default()));
        let inbound_headers = HeaderMap::new();
        for (query, message) in [
            (None, "Missing url param"),
            (Some("url=ftp%3A%2F%2Fhost%2Fx"), "Invalid url"),
        ] {
            let reply = service
                .handle(&InboundRequest {
                    method: "GET",
                    query,
                    headers: &inbound_headers,
                })
                .await;
            assert_eq!(reply.status, StatusCode::BAD_REQUEST);
            assert_cors(&reply.headers);
            assert_eq!(body_text(reply.body).await, message);
        }
        assert_eq!(service.fetcher().call_count(), 0);
    }

    #[tokio::test]
    async fn test_options_preflight() {
        let service = ProxyService::new(FakeFetcher::ok(FakeResponse::default()));
        let inbound_headers = HeaderMap::new();
        let reply = service
            .handle(&InboundRequest {
                method: "OPTIONS",
                query: Some("url=http%3A%2F%2Fuser%3Apass%40example.com%2Fa.mp3"),
                headers: &inbound_headers,
            })
            .await;
        assert_eq!(reply.status, StatusCode::NO_CONTENT);
        assert_cors(&reply.headers);
        assert!(matches!(reply.body, RelayBody::Empty));
        assert_eq!(service.fetcher().call_count(), 0);
    }

    #[tokio::test]
    async fn test_userinfo_becomes_basic_auth() {
        let service = ProxyService::new(FakeFetcher::ok(FakeResponse::default()));
        let inbound_headers = headers(&[
            ("range", "bytes=100-"),
            ("user-agent", "player/2"),
            ("accept", "audio/mpeg"),
            ("cookie", "sid=1"),
            ("x-forwarded-for", "10.0.0.1"),
        ]);
        let reply = service
            .handle(&InboundRequest {
                method: "GET",
                query: Some("url=http%3A%2F%2Fuser%3Asecret%40example.com%2Fa.mp3"),
                headers: &inbound_headers,
            })
            .await;
        assert_eq!(reply.status, StatusCode::OK);

        let calls = service.fetcher().calls();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.url.as_str(), "http://example.com/a.mp3");
        assert_eq!(
            call.headers.get(header::AUTHORIZATION).unwrap(),
            "Basic dXNlcjpzZWNyZXQ="
        );
        assert!(call.headers.get(header::AUTHORIZATION).unwrap().is_sensitive());
        assert_eq!(call.headers.get(header::RANGE).unwrap(), "bytes=100-");
        assert_eq!(call.headers.get(header::USER_AGENT).unwrap(), "player/2");
        assert_eq!(call.headers.get(header::ACCEPT).unwrap(), "audio/mpeg");
        assert!(call.headers.get(header::COOKIE).is_none());
        assert!(call.headers.get("x-forwarded-for").is_none());
        assert_eq!(call.headers.len(), 4);
    }

    #[tokio::test]
    async fn test_encrypted_auth_param() {
        let cipher = CredentialCipher::new("k");
        let wire = cipher.encrypt(&Credential::new("u", "p")).unwrap();
        let query = format!(
            "url={}&auth={}",
            urlencoding::encode("http://example.com/a.mp3"),
            urlencoding::encode(&wire)
        );

        let service = ProxyService::new(FakeFetcher::ok(FakeResponse::default()))
            .with_cipher(Some(CredentialCipher::new("k")));
        let inbound_headers = HeaderMap::new();
        service
            .handle(&InboundRequest {
                method: "GET",
                query: Some(&query),
                headers: &inbound_headers,
            })
            .await;

        let calls = service.fetcher().calls();
        assert_eq!(calls[0].headers.get(header::AUTHORIZATION).unwrap(), "Basic dTpw");
    }

    #[tokio::test]
    async fn test_undecryptable_auth_param_forwards_unauthenticated() {
        let service = ProxyService::new(FakeFetcher::ok(FakeResponse::default()))
            .with_cipher(Some(CredentialCipher::new("k")));
        let inbound_headers = HeaderMap::new();
        let reply = service
            .handle(&InboundRequest {
                method: "GET",
                query: Some("url=http%3A%2F%2Fexample.com%2Fa.mp3&auth=deadbeef%3A00"),
                headers: &inbound_headers,
            })
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        let calls = service.fetcher().calls();
        assert!(calls[0].headers.get(header::AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_relay_preserves_status_and_range_headers() {
        let upstream = FakeResponse {
            status: StatusCode::PARTIAL_CONTENT,
            headers: headers(&[
                ("content-range", "bytes 100-104/105"),
                ("accept-ranges", "bytes"),
                ("content-length", "5"),
                ("content-type", "audio/mpeg"),
                ("connection", "keep-alive"),
                ("transfer-encoding", "chunked"),
                ("access-control-allow-origin", "https://dav.example.com"),
                ("set-cookie", "a=1"),
                ("set-cookie", "b=2"),
            ]),
            chunks: vec!["hel", "lo"],
        };
        let service = ProxyService::new(FakeFetcher::ok(upstream));
        let inbound_headers = headers(&[("range", "bytes=100-")]);
        let reply = service
            .handle(&InboundRequest {
                method: "GET",
                query: Some("url=https%3A%2F%2Fexample.com%2Fa.mp3"),
                headers: &inbound_headers,
            })
            .await;

        assert_eq!(reply.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(reply.headers.get("content-range").unwrap(), "bytes 100-104/105");
        assert_eq!(reply.headers.get("accept-ranges").unwrap(), "bytes");
        assert_eq!(reply.headers.get("content-length").unwrap(), "5");
        assert!(reply.headers.get("connection").is_none());
        assert!(reply.headers.get("transfer-encoding").is_none());
        assert_eq!(reply.headers.get_all("set-cookie").iter().count(), 2);
        assert_cors(&reply.headers);
        assert_eq!(body_text(reply.body).await, "hello");
    }

    #[tokio::test]
    async fn test_head_has_no_body() {
        let upstream = FakeResponse {
            headers: headers(&[("content-length", "1000")]),
            chunks: vec!["ignored"],
            ..FakeResponse::default()
        };
        let service = ProxyService::new(FakeFetcher::ok(upstream));
        let inbound_headers = HeaderMap::new();
        let reply = service
            .handle(&InboundRequest {
                method: "HEAD",
                query: Some("url=http%3A%2F%2Fexample.com%2Fa.mp3"),
                headers: &inbound_headers,
            })
            .await;
        assert_eq!(reply.headers.get("content-length").unwrap(), "1000");
        assert!(matches!(reply.body, RelayBody::Empty));
        assert_eq!(service.fetcher().calls()[0].method, ProxyMethod::Head);
    }

    #[tokio::test]
    async fn test_connect_failure_is_bad_gateway() {
        let service = ProxyService::new(FakeFetcher::err(FetchError::Connect(
            "connection refused".to_string(),
        )));
        let inbound_headers = HeaderMap::new();
        let reply = service
            .handle(&InboundRequest {
                method: "GET",
                query: Some("url=http%3A%2F%2Fexample.com%2Fa.mp3"),
                headers: &inbound_headers,
            })
            .await;
        assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
        assert_cors(&reply.headers);
        assert_eq!(body_text(reply.body).await, "Bad Gateway");
        assert_eq!(service.fetcher().call_count(), 1);
    }

    #[tokio::test]
    async fn test_slow_upstream_is_gateway_timeout() {
        let service = ProxyService::new(FakeFetcher::hang())
            .with_upstream_timeout(Some(Duration::from_millis(50)));
        let inbound_headers = HeaderMap::new();
        let reply = service
            .handle(&InboundRequest {
                method: "GET",
                query: Some("url=http%3A%2F%2Fexample.com%2Fa.mp3"),
                headers: &inbound_headers,
            })
            .await;
        assert_eq!(reply.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_text(reply.body).await, "Gateway Timeout");
    }

    #[test]
    fn test_into_response() {
        let response = ProxyReply::preflight().into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_cors(response.headers());
    }
}
