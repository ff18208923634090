//! Error types for the davrelay-source crate.

use thiserror::Error;

/// Errors raised by the media-source adapter.
#[derive(Error, Debug)]
pub enum SourceError {
    /// A required user variable is missing or empty.
    #[error("Source not configured: missing {0}")]
    NotConfigured(&'static str),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("WebDAV error: {0}")]
    WebDav(String),

    #[error("Cipher error: {0}")]
    Cipher(#[from] davrelay_proxy::ProxyError),
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, SourceError>;
