//! Edge adapter: one request in, one response out.
//!
//! For hosts that invoke a handler per request and own the connection,
//! timeouts and concurrency themselves. The adapter keeps no state between
//! invocations and sets no upstream wait bound; the host's own limits apply.

use crate::body::RelayBody;
use crate::cipher::CredentialCipher;
use crate::request::InboundRequest;
use crate::service::ProxyService;
use crate::upstream::UpstreamFetch;

/// Stateless per-request handler over the shared relay logic.
#[derive(Debug)]
pub struct EdgeHandler<F> {
    service: ProxyService<F>,
}

impl<F: UpstreamFetch> EdgeHandler<F> {
    /// Create a handler. `secret` enables decryption of `auth` parameters.
    pub fn new(fetcher: F, secret: Option<&str>) -> Self {
        let cipher = secret.filter(|s| !s.is_empty()).map(CredentialCipher::new);
        Self {
            service: ProxyService::new(fetcher).with_cipher(cipher),
        }
    }

    /// Handle one request. The request body, if any, is ignored.
    pub async fn handle<B>(&self, request: &http::Request<B>) -> http::Response<RelayBody> {
        let inbound = InboundRequest {
            method: request.method().as_str(),
            query: request.uri().query(),
            headers: request.headers(),
        };
        self.service.handle(&inbound).await.into_response()
    }

    #[must_use]
    pub fn service(&self) -> &ProxyService<F> {
        &self.service
    }
}
