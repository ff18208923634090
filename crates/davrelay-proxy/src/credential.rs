//! Credential extraction for outbound requests.
//!
//! A [`Credential`] is built once per request, either from user-info embedded
//! in the target URL or from a decrypted `auth` parameter, and dropped as
//! soon as the `Authorization` header value has been produced. Both fields
//! live in `Zeroizing<String>` and the `Debug` output is redacted so the
//! values cannot end up in logs by accident.

use crate::cipher::CredentialCipher;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

/// Username/password pair for HTTP Basic authentication.
pub struct Credential {
    username: Zeroizing<String>,
    password: Zeroizing<String>,
}

impl Credential {
    /// Create a credential from its parts.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Zeroizing::new(username.into()),
            password: Zeroizing::new(password.into()),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Both parts present. Empty parts never produce an Authorization header.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    /// `Authorization` header value: `Basic base64(username:password)`.
    #[must_use]
    pub fn basic_header(&self) -> Zeroizing<String> {
        let joined = Zeroizing::new(format!("{}:{}", &*self.username, &*self.password));
        Zeroizing::new(format!("Basic {}", STANDARD.encode(joined.as_bytes())))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        *self.username == *other.username && *self.password == *other.password
    }
}

impl Eq for Credential {}

/// Read the user-info of `url`, percent-decoded.
///
/// Returns `None` unless both username and password are non-empty.
#[must_use]
pub fn from_userinfo(url: &Url) -> Option<Credential> {
    let password = url.password()?;
    let username = urlencoding::decode(url.username()).ok()?;
    let password = urlencoding::decode(password).ok()?;
    let credential = Credential::new(username.into_owned(), password.into_owned());
    credential.is_complete().then_some(credential)
}

/// Remove any user-info from `url`.
pub fn strip_userinfo(url: &mut Url) {
    // Both setters only fail for cannot-be-a-base URLs, which never carry
    // user-info in the first place.
    let _ = url.set_username("");
    let _ = url.set_password(None);
}

/// Resolve the credential for an outbound call and scrub the target URL.
///
/// Precedence: URL user-info first, then the encrypted `auth` parameter when
/// a cipher is configured. Decryption failure is not an error: the request
/// simply goes out without an `Authorization` header.
pub fn resolve(
    target: &mut Url,
    auth_param: Option<&str>,
    cipher: Option<&CredentialCipher>,
) -> Option<Credential> {
    let embedded = from_userinfo(target);
    strip_userinfo(target);
    if embedded.is_some() {
        return embedded;
    }

    let (param, cipher) = match (auth_param, cipher) {
        (Some(param), Some(cipher)) if !param.is_empty() => (param, cipher),
        _ => return None,
    };

    // The query parser has already decoded the value once; decode again so
    // producers that double-encode are still understood.
    let wire = urlencoding::decode(param).unwrap_or_else(|_| param.into());
    match cipher.decrypt(&wire) {
        Some(credential) if credential.is_complete() => Some(credential),
        Some(_) => {
            debug!("Decrypted auth parameter has empty username or password, ignoring");
            None
        }
        None => {
            debug!("Failed to decrypt auth parameter, forwarding without credentials");
            None
        }
    }
}
