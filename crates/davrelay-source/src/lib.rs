//! WebDAV media source that hands out relay links.
//!
//! The source lists audio files on a WebDAV server and turns their download
//! links into links through a `davrelay` relay, so the account never reaches
//! the player. With an encryption key shared with the relay, the account
//! travels encrypted in the `auth` parameter instead of in the URL.
//!
//! The WebDAV protocol itself is behind [`WebDavClient`].

pub mod cache;
pub mod config;
pub mod error;
pub mod link;
pub mod media;
pub mod webdav;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::DirectoryCache;
pub use config::{SourceConfig, UserVariables};
pub use error::{Result, SourceError};
pub use media::{MediaSource, MediaSourceInfo, MusicItem, SearchPage};
pub use webdav::{credentialed_link, DirEntry, WebDavClient};
