//! Media-source operations exposed to the host player.

use crate::cache::{list_audio, DirectoryCache};
use crate::config::SourceConfig;
use crate::error::Result;
use crate::link::relay_link;
use crate::webdav::{DirEntry, WebDavClient};
use davrelay_proxy::CredentialCipher;
use serde::Serialize;
use std::sync::Arc;

pub const UNKNOWN_ARTIST: &str = "Unknown artist";
pub const UNKNOWN_ALBUM: &str = "Unknown album";
/// Title of the single top-list group.
pub const ALL_SONGS: &str = "All songs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MusicItem {
    /// Full path on the server
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
}

impl From<&DirEntry> for MusicItem {
    fn from(entry: &DirEntry) -> Self {
        Self {
            id: entry.filename.clone(),
            title: entry.basename.clone(),
            artist: UNKNOWN_ARTIST.to_string(),
            album: UNKNOWN_ALBUM.to_string(),
        }
    }
}

/// Search results. Everything is returned in one page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub is_end: bool,
    #[serde(rename = "data")]
    pub items: Vec<MusicItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopListItem {
    /// Search path listed by this entry
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopListGroup {
    pub title: String,
    pub data: Vec<TopListItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopListDetail {
    pub music_list: Vec<MusicItem>,
}

/// Playable location of a track.
#[derive(Debug, Clone, Serialize)]
pub struct MediaSourceInfo {
    pub url: String,
}

/// A configured WebDAV media source.
pub struct MediaSource<C> {
    config: SourceConfig,
    client: C,
    cache: Arc<DirectoryCache>,
    cipher: Option<CredentialCipher>,
}

impl<C: WebDavClient> MediaSource<C> {
    /// Create a source over `client`. `cache` may be shared between sources;
    /// it is rebuilt whenever it sees a different configuration.
    pub fn new(config: SourceConfig, client: C, cache: Arc<DirectoryCache>) -> Self {
        let cipher = config
            .encryption_key
            .as_deref()
            .map(|key| CredentialCipher::new(key));
        Self {
            config,
            client,
            cache,
            cipher,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Cached audio files whose name contains `query`.
    pub async fn search(&self, query: &str) -> SearchPage {
        let files = self.cache.audio_files(&self.config, &self.client).await;
        SearchPage {
            is_end: true,
            items: files
                .iter()
                .filter(|entry| entry.basename.contains(query))
                .map(MusicItem::from)
                .collect(),
        }
    }

    /// One group with an entry per configured search path.
    #[must_use]
    pub fn top_lists(&self) -> Vec<TopListGroup> {
        vec![TopListGroup {
            title: ALL_SONGS.to_string(),
            data: self
                .config
                .search_paths
                .iter()
                .map(|path| TopListItem {
                    id: path.clone(),
                    title: path.clone(),
                })
                .collect(),
        }]
    }

    /// Audio files directly inside `path`. Not cached.
    pub async fn top_list_detail(&self, path: &str) -> Result<TopListDetail> {
        let files = list_audio(&self.client, path).await?;
        Ok(TopListDetail {
            music_list: files.iter().map(MusicItem::from).collect(),
        })
    }

    /// Playback URL for the track `file_id`, routed through the relay when
    /// one is configured.
    pub fn media_source(&self, file_id: &str) -> Result<MediaSourceInfo> {
        let raw = self.client.download_link(file_id)?;
        Ok(MediaSourceInfo {
            url: relay_link(self.config.proxy_url.as_deref(), &raw, self.cipher.as_ref()),
        })
    }
}

impl<C> std::fmt::Debug for MediaSource<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSource")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
