//! Directory cache for search.
//!
//! Listing every search path is slow, so the audio files found are kept
//! until the configuration that produced them changes. The cache is an
//! explicit object shared by whoever builds [`crate::MediaSource`] values;
//! the lock is held while the cache is filled, so concurrent callers wait for
//! one refresh instead of listing the server in parallel.

use crate::config::SourceConfig;
use crate::webdav::{DirEntry, WebDavClient};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Configuration fields the cached listing depends on.
#[derive(Clone)]
struct CacheKey {
    endpoint: String,
    username: String,
    password: Zeroizing<String>,
    search_paths: Vec<String>,
}

impl CacheKey {
    fn from_config(config: &SourceConfig) -> Self {
        Self {
            endpoint: config.endpoint.as_str().to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            search_paths: config.search_paths.clone(),
        }
    }

    fn matches(&self, other: &CacheKey) -> bool {
        self.endpoint == other.endpoint
            && self.username == other.username
            && self.password.as_str() == other.password.as_str()
            && self.search_paths == other.search_paths
    }
}

#[derive(Default)]
struct CacheState {
    key: Option<CacheKey>,
    files: Option<Arc<Vec<DirEntry>>>,
}

/// Cached audio files across all search paths.
#[derive(Default)]
pub struct DirectoryCache {
    state: Mutex<CacheState>,
}

impl std::fmt::Debug for DirectoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryCache").finish_non_exhaustive()
    }
}

impl DirectoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Audio files for `config`, listing the server only when nothing is
    /// cached for this configuration yet.
    pub async fn audio_files<C: WebDavClient>(
        &self,
        config: &SourceConfig,
        client: &C,
    ) -> Arc<Vec<DirEntry>> {
        let key = CacheKey::from_config(config);
        let mut state = self.state.lock().await;

        if !state.key.as_ref().is_some_and(|cached| cached.matches(&key)) {
            if state.key.is_some() {
                debug!("Source configuration changed, dropping cached listing");
            }
            state.key = Some(key);
            state.files = None;
        }

        if let Some(files) = &state.files {
            return Arc::clone(files);
        }

        let mut files = Vec::new();
        for path in config.listing_paths() {
            match list_audio(client, path).await {
                Ok(found) => files.extend(found),
                Err(e) => warn!("Skipping search path {}: {}", path, e),
            }
        }
        debug!("Cached {} audio files", files.len());

        let files = Arc::new(files);
        state.files = Some(Arc::clone(&files));
        files
    }

    /// Drop the cached listing.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.files = None;
    }
}

/// Audio files directly inside `path`.
pub async fn list_audio<C: WebDavClient>(
    client: &C,
    path: &str,
) -> crate::Result<Vec<DirEntry>> {
    let entries = client.list_directory(path).await?;
    Ok(entries.into_iter().filter(DirEntry::is_audio).collect())
}
