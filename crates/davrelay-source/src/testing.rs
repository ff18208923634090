//! Test doubles shared by unit tests.

#![allow(clippy::unwrap_used)]

use crate::error::{Result, SourceError};
use crate::webdav::{credentialed_link, DirEntry, WebDavClient};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use url::Url;

/// In-memory WebDAV server that records every listing request.
pub(crate) struct FakeDav {
    endpoint: Url,
    dirs: HashMap<String, Vec<DirEntry>>,
    failing: HashSet<String>,
    listings: Mutex<Vec<String>>,
}

impl FakeDav {
    pub fn new() -> Self {
        Self {
            endpoint: Url::parse("https://dav.example.com/").unwrap(),
            dirs: HashMap::new(),
            failing: HashSet::new(),
            listings: Mutex::new(Vec::new()),
        }
    }

    /// Add a directory of files given as `(basename, mime)`.
    pub fn with_dir(mut self, path: &str, files: &[(&str, &str)]) -> Self {
        let prefix = path.trim_end_matches('/');
        let entries = files
            .iter()
            .map(|(name, mime)| DirEntry {
                basename: (*name).to_string(),
                filename: format!("{}/{}", prefix, name),
                is_file: true,
                mime: Some((*mime).to_string()),
            })
            .collect();
        self.dirs.insert(path.to_string(), entries);
        self
    }

    pub fn failing(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    pub fn listings(&self) -> Vec<String> {
        self.listings.lock().unwrap().clone()
    }
}

impl WebDavClient for FakeDav {
    async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>> {
        self.listings.lock().unwrap().push(path.to_string());
        if self.failing.contains(path) {
            return Err(SourceError::WebDav(format!("PROPFIND {} failed: 503", path)));
        }
        Ok(self.dirs.get(path).cloned().unwrap_or_default())
    }

    fn download_link(&self, file_id: &str) -> Result<Url> {
        credentialed_link(&self.endpoint, "alice", "hunter2", file_id)
    }
}
