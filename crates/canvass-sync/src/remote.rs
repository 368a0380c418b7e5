//! Remote file store contract
//!
//! The cloud file store is addressed by `/`-separated paths. The sync engine
//! only needs overwrite-upload, download, single-level folder listing and
//! delete. Downloads of individual participant files are best-effort:
//! [`download_nodes`] turns any failure into "no nodes".

use async_trait::async_trait;
use canvass_graph::{codec, Node};
use std::fmt::Debug;

/// Remote file store failure
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// No file or folder at this path
    #[error("remote path not found: {0}")]
    NotFound(String),

    /// I/O failure talking to the backend
    #[error("remote I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Backend-specific failure
    #[error("remote backend error: {0}")]
    Backend(String),
}

impl RemoteError {
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_string())
        } else {
            Self::Io {
                path: path.to_string(),
                source,
            }
        }
    }
}

/// Kind of a listed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
}

/// One entry of a folder listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Last path segment
    pub name: String,
    /// Full path, usable for download/delete
    pub path: String,
    pub kind: EntryKind,
}

impl RemoteEntry {
    #[must_use]
    pub fn file(path: impl Into<String>) -> Self {
        Self::new(path.into(), EntryKind::File)
    }

    #[must_use]
    pub fn folder(path: impl Into<String>) -> Self {
        Self::new(path.into(), EntryKind::Folder)
    }

    fn new(path: String, kind: EntryKind) -> Self {
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self { name, path, kind }
    }

    #[inline]
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    /// File entry whose name ends with `suffix`
    #[must_use]
    pub fn is_file_with_suffix(&self, suffix: &str) -> bool {
        self.kind == EntryKind::File && self.name.ends_with(suffix)
    }
}

/// Folder/filename addressed cloud storage
#[async_trait]
pub trait RemoteFileStore: Send + Sync + Debug {
    /// Write `contents` to `path`, replacing any existing file
    async fn upload(&self, path: &str, contents: Vec<u8>) -> Result<(), RemoteError>;

    /// Read the file at `path`
    async fn download(&self, path: &str) -> Result<Vec<u8>, RemoteError>;

    /// Direct children of the folder at `path`
    async fn list_folder(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError>;

    /// Delete the file at `path`
    async fn delete(&self, path: &str) -> Result<(), RemoteError>;
}

/// Join a folder path and a file name
#[must_use]
pub fn join(folder: &str, name: &str) -> String {
    format!("{}/{}", folder.trim_end_matches('/'), name)
}

/// Download and decode a node file; any failure yields no nodes
pub async fn download_nodes(remote: &dyn RemoteFileStore, path: &str) -> Vec<Node> {
    match remote.download(path).await {
        Ok(bytes) => {
            let nodes = codec::decode_nodes(&bytes);
            tracing::debug!(path, nodes = nodes.len(), "downloaded node file");
            nodes
        }
        Err(e) if e.is_not_found() => {
            tracing::debug!(path, "node file absent");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(path, error = %e, "skipping unreadable node file");
            Vec::new()
        }
    }
}
