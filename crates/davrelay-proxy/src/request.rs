//! Inbound request validation.
//!
//! Turns the method, query string and headers of an inbound request into a
//! [`ProxyRequest`], or a [`Rejection`] that is answered without touching the
//! upstream. Checks run in a fixed order: method, presence of `url`, then
//! the URL itself.

use crate::error::Rejection;
use http::header::{self, HeaderMap, HeaderName};
use url::Url;

/// Inbound headers copied to the outbound request. Everything else is dropped.
pub static FORWARDED_HEADERS: [HeaderName; 3] = [header::RANGE, header::ACCEPT, header::USER_AGENT];

/// Query parameter holding the upstream URL.
pub const URL_PARAM: &str = "url";

/// Query parameter holding the encrypted credential.
pub const AUTH_PARAM: &str = "auth";

/// Methods the relay accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMethod {
    Get,
    Head,
    Options,
}

impl ProxyMethod {
    /// Parse a method token as it appears on the wire.
    #[must_use]
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "GET" => Some(ProxyMethod::Get),
            "HEAD" => Some(ProxyMethod::Head),
            "OPTIONS" => Some(ProxyMethod::Options),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyMethod::Get => "GET",
            ProxyMethod::Head => "HEAD",
            ProxyMethod::Options => "OPTIONS",
        }
    }

    #[must_use]
    pub fn to_http(self) -> http::Method {
        match self {
            ProxyMethod::Get => http::Method::GET,
            ProxyMethod::Head => http::Method::HEAD,
            ProxyMethod::Options => http::Method::OPTIONS,
        }
    }
}

impl std::fmt::Display for ProxyMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound request as handed over by a deployment variant.
#[derive(Debug)]
pub struct InboundRequest<'a> {
    /// Method token, e.g. `GET`
    pub method: &'a str,
    /// Raw query string without the leading `?`
    pub query: Option<&'a str>,
    /// Inbound headers
    pub headers: &'a HeaderMap,
}

/// A validated relay request.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: ProxyMethod,
    /// Absolute http(s) URL. May still carry user-info at this point.
    pub target: Url,
    /// Allow-listed inbound headers
    pub forwarded_headers: HeaderMap,
    /// Encrypted credential, still in wire form
    pub auth_param: Option<String>,
}

impl ProxyRequest {
    /// Validate an inbound request.
    pub fn parse(inbound: &InboundRequest<'_>) -> Result<Self, Rejection> {
        let method = ProxyMethod::parse(inbound.method).ok_or(Rejection::MethodNotAllowed)?;

        let raw_url = query_param(inbound.query, URL_PARAM)
            .filter(|u| !u.is_empty())
            .ok_or(Rejection::MissingUrl)?;
        let target = parse_target(&raw_url)?;

        Ok(Self {
            method,
            target,
            forwarded_headers: forwarded_headers(inbound.headers),
            auth_param: query_param(inbound.query, AUTH_PARAM),
        })
    }
}

/// Parse the upstream URL, accepting only absolute http/https URLs.
pub fn parse_target(raw: &str) -> Result<Url, Rejection> {
    let url = Url::parse(raw).map_err(|_| Rejection::InvalidTarget)?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(Rejection::InvalidTarget),
    }
}

/// First value of a query parameter, form-decoded.
#[must_use]
pub fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Copy the allow-listed headers. Header names compare case-insensitively.
#[must_use]
pub fn forwarded_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in &FORWARDED_HEADERS {
        if let Some(value) = inbound.get(name) {
            headers.insert(name.clone(), value.clone());
        }
    }
    headers
}
