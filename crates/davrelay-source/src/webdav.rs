//! WebDAV access seam.
//!
//! The adapter never speaks PROPFIND itself. Hosts plug in a client that
//! lists directories and produces download links; [`credentialed_link`] is
//! the standard way to build such a link with the account embedded.

use crate::error::{Result, SourceError};
use std::future::Future;
use url::Url;

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name without directory
    pub basename: String,
    /// Full path on the server, used as the item id
    pub filename: String,
    pub is_file: bool,
    pub mime: Option<String>,
}

impl DirEntry {
    /// A regular file with an `audio*` content type.
    #[must_use]
    pub fn is_audio(&self) -> bool {
        self.is_file
            && self
                .mime
                .as_deref()
                .is_some_and(|mime| mime.starts_with("audio"))
    }
}

/// Directory listing and link generation against a WebDAV server.
pub trait WebDavClient: Send + Sync {
    /// List the direct children of `path`.
    fn list_directory(&self, path: &str) -> impl Future<Output = Result<Vec<DirEntry>>> + Send;

    /// Download URL for `file_id`. The URL may carry credentials.
    fn download_link(&self, file_id: &str) -> Result<Url>;
}

/// Build `endpoint/<file_id>` with `username:password` as user-info.
///
/// Path segments of `file_id` are percent-encoded; the endpoint's own path
/// is kept as a prefix.
pub fn credentialed_link(
    endpoint: &Url,
    username: &str,
    password: &str,
    file_id: &str,
) -> Result<Url> {
    let invalid = |reason: &str| SourceError::InvalidUrl {
        url: endpoint.as_str().to_string(),
        reason: reason.to_string(),
    };

    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|()| invalid("endpoint cannot carry a path"))?
        .pop_if_empty()
        .extend(file_id.split('/').filter(|segment| !segment.is_empty()));
    url.set_username(username)
        .map_err(|()| invalid("endpoint cannot carry a username"))?;
    url.set_password(Some(password))
        .map_err(|()| invalid("endpoint cannot carry a password"))?;
    Ok(url)
}
