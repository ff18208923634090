//! Error types for the davrelay-proxy crate.
//!
//! Three families live here:
//! - [`ProxyError`]: failures of the proxy itself (bind, config, I/O).
//! - [`Rejection`]: client errors answered with a 4xx before any upstream I/O.
//! - [`FetchError`]: upstream failures answered with a 5xx.

use http::StatusCode;
use thiserror::Error;

/// Errors that can occur while running the proxy.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Proxy bind failed on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP parse error: {0}")]
    HttpParse(String),

    #[error("Cipher error: {0}")]
    Cipher(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// A request refused by the validator. No upstream call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("Missing url param")]
    MissingUrl,

    #[error("Invalid url")]
    InvalidTarget,

    #[error("Request Header Fields Too Large")]
    HeadersTooLarge,
}

impl Rejection {
    /// HTTP status sent back to the client.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Rejection::MissingUrl | Rejection::InvalidTarget => StatusCode::BAD_REQUEST,
            Rejection::HeadersTooLarge => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
        }
    }
}

/// Failure of the outbound call.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("Upstream connection failed: {0}")]
    Connect(String),

    #[error("Upstream did not respond in time")]
    Timeout,

    #[error("Upstream body error: {0}")]
    Body(String),
}

impl FetchError {
    /// HTTP status sent back to the client when the call fails before any
    /// response headers were relayed.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            FetchError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            FetchError::Connect(_) | FetchError::Body(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short label used in audit records.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Connect(_) => "connect",
            FetchError::Timeout => "timeout",
            FetchError::Body(_) => "body",
        }
    }
}
