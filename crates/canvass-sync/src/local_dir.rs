//! Directory-backed remote file store
//!
//! Maps remote paths onto a local directory tree. Used by the CLI as a
//! stand-in for the cloud file store (e.g. a synced folder).

use crate::remote::{RemoteEntry, RemoteError, RemoteFileStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Remote file store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalDirFileStore {
    root: PathBuf,
}

impl LocalDirFileStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, RemoteError> {
        let mut resolved = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." || segment == "." {
                return Err(RemoteError::Backend(format!("invalid remote path: {path}")));
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }
}

#[async_trait]
impl RemoteFileStore for LocalDirFileStore {
    async fn upload(&self, path: &str, contents: Vec<u8>) -> Result<(), RemoteError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RemoteError::io(path, e))?;
        }
        let tmp = target.with_extension("partial");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| RemoteError::io(path, e))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(|e| RemoteError::io(path, e))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let target = self.resolve(path)?;
        tokio::fs::read(&target)
            .await
            .map_err(|e| RemoteError::io(path, e))
    }

    async fn list_folder(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let target = self.resolve(path)?;
        let mut dir = tokio::fs::read_dir(&target)
            .await
            .map_err(|e| RemoteError::io(path, e))?;

        let base = path.trim_end_matches('/');
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| RemoteError::io(path, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| RemoteError::io(path, e))?;
            let full = format!("{base}/{name}");
            if file_type.is_dir() {
                entries.push(RemoteEntry::folder(full));
            } else if !name.ends_with(".partial") {
                entries.push(RemoteEntry::file(full));
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let target = self.resolve(path)?;
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| RemoteError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_through_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDirFileStore::new(dir.path());

        store.upload("/form/dev1.jtxt", b"{}".to_vec()).await.unwrap();
        store.upload("/form/team@a/dev2.jtxt", b"{}".to_vec()).await.unwrap();
        assert_eq!(store.download("/form/dev1.jtxt").await.unwrap(), b"{}");

        let entries = store.list_folder("/form").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.is_folder() && e.name == "team@a"));
        assert!(entries.iter().any(|e| e.is_file_with_suffix(".jtxt")));

        store.delete("/form/dev1.jtxt").await.unwrap();
        assert!(store.download("/form/dev1.jtxt").await.unwrap_err().is_not_found());
        assert!(store.delete("/form/dev1.jtxt").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDirFileStore::new(dir.path());
        assert!(store.download("/form/../../etc/passwd").await.is_err());
    }
}
