//! Relay links for media playback.
//!
//! A download link from the WebDAV client carries the account in its
//! user-info. Handed to a player as-is, the password travels with it. The
//! relay form moves the credentials out of the player's reach: either the
//! whole link rides inside `url=` (the relay strips the user-info before
//! fetching), or the credentials are encrypted into `auth=` and the link
//! is sent clean.

use crate::error::Result;
use davrelay_proxy::credential::strip_userinfo;
use davrelay_proxy::{Credential, CredentialCipher};
use tracing::warn;
use url::Url;

/// `{proxy}/?url=enc(raw)`.
#[must_use]
pub fn plain_relay_link(proxy: &str, raw: &Url) -> String {
    format!(
        "{}/?url={}",
        proxy.trim_end_matches('/'),
        urlencoding::encode(raw.as_str())
    )
}

/// `{proxy}/?url=enc(clean)&auth=enc(token)` where `clean` is `raw` without
/// user-info and `token` encrypts the user-info with `cipher`.
pub fn encrypted_relay_link(proxy: &str, raw: &Url, cipher: &CredentialCipher) -> Result<String> {
    let credential = Credential::new(
        urlencoding::decode(raw.username()).unwrap_or_default(),
        urlencoding::decode(raw.password().unwrap_or_default()).unwrap_or_default(),
    );
    let mut clean = raw.clone();
    strip_userinfo(&mut clean);

    let token = cipher.encrypt(&credential)?;
    Ok(format!(
        "{}/?url={}&auth={}",
        proxy.trim_end_matches('/'),
        urlencoding::encode(clean.as_str()),
        urlencoding::encode(&token)
    ))
}

/// Rewrite a download link for playback.
///
/// Without a proxy the raw link is returned. With a proxy and a cipher the
/// encrypted form is used, falling back to the plain relay form if
/// encryption fails.
#[must_use]
pub fn relay_link(proxy: Option<&str>, raw: &Url, cipher: Option<&CredentialCipher>) -> String {
    let Some(proxy) = proxy else {
        return raw.to_string();
    };
    if let Some(cipher) = cipher {
        match encrypted_relay_link(proxy, raw, cipher) {
            Ok(link) => return link,
            Err(e) => warn!("Falling back to plain relay link: {}", e),
        }
    }
    plain_relay_link(proxy, raw)
}
