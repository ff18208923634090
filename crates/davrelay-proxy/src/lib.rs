//! Credential-shielding HTTP relay for WebDAV media downloads.
//!
//! A client asks for `/?url=<target>[&auth=<token>]`. The relay validates
//! the request, turns credentials from the target's user-info or from an
//! encrypted `auth` token into a `Basic` `Authorization` header, fetches the
//! target, and streams the response back with permissive CORS headers.
//!
//! Two deployment variants share [`service::ProxyService`]:
//!
//! 1. **Standalone** (`server`) - a long-running TCP listener with a
//!    bounded upstream wait (504 on expiry) and a connection limit.
//!
//! 2. **Edge** (`edge`) - a stateless per-request handler for hosts that
//!    own the connection and its time limits.
//!
//! Encrypted tokens are produced by [`cipher::CredentialCipher::encrypt`]
//! with the same shared secret the relay is configured with.

pub mod audit;
pub mod body;
pub mod cipher;
pub mod config;
pub mod cors;
pub mod credential;
pub mod edge;
pub mod error;
pub mod request;
pub mod server;
pub mod service;
pub mod upstream;

#[cfg(test)]
pub(crate) mod testing;

pub use body::RelayBody;
pub use cipher::CredentialCipher;
pub use config::ProxyConfig;
pub use credential::Credential;
pub use edge::EdgeHandler;
pub use error::{FetchError, ProxyError, Rejection, Result};
pub use server::{start, ProxyHandle};
pub use service::{ProxyReply, ProxyService};
pub use upstream::{HttpFetcher, OutboundRequest, UpstreamFetch, UpstreamResponse};
