//! Adapter configuration.
//!
//! The host hands over its user variables as loose JSON. They are parsed
//! into [`UserVariables`] and validated once into a [`SourceConfig`].

use crate::error::{Result, SourceError};
use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

/// Path listed when no search path is configured.
pub const ROOT_PATH: &str = "/";

/// Raw user variables as the host stores them. Every field is optional and
/// an empty string counts as unset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserVariables {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub search_path: Option<String>,
    pub proxy_url: Option<String>,
    pub encryption_key: Option<String>,
}

/// Validated adapter configuration.
#[derive(Clone)]
pub struct SourceConfig {
    /// WebDAV endpoint
    pub endpoint: Url,
    pub username: String,
    pub password: Zeroizing<String>,
    /// Configured search paths, blank entries removed
    pub search_paths: Vec<String>,
    /// Relay base URL, without trailing slash
    pub proxy_url: Option<String>,
    /// Shared secret for encrypting relay `auth` parameters
    pub encryption_key: Option<Zeroizing<String>>,
}

impl SourceConfig {
    /// Validate user variables.
    pub fn from_variables(vars: &UserVariables) -> Result<Self> {
        let endpoint = required(&vars.url, "url")?;
        let username = required(&vars.username, "username")?;
        let password = required(&vars.password, "password")?;

        let endpoint = parse_url(endpoint)?;

        let search_paths = vars
            .search_path
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(str::to_string)
            .collect();

        let proxy_url = match optional(&vars.proxy_url) {
            Some(proxy) => {
                parse_url(proxy)?;
                Some(proxy.trim_end_matches('/').to_string())
            }
            None => None,
        };

        Ok(Self {
            endpoint,
            username: username.to_string(),
            password: Zeroizing::new(password.to_string()),
            search_paths,
            proxy_url,
            encryption_key: optional(&vars.encryption_key)
                .map(|key| Zeroizing::new(key.to_string())),
        })
    }

    /// Paths to list when building the cache: the configured ones, or the
    /// root when none are configured.
    #[must_use]
    pub fn listing_paths(&self) -> Vec<&str> {
        if self.search_paths.is_empty() {
            vec![ROOT_PATH]
        } else {
            self.search_paths.iter().map(String::as_str).collect()
        }
    }
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("search_paths", &self.search_paths)
            .field("proxy_url", &self.proxy_url)
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str> {
    optional(value).ok_or(SourceError::NotConfigured(field))
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| SourceError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}
