//! In-memory remote file store
//!
//! Folders are implied by file paths. Individual paths can be made to fail
//! and every call is recorded, which makes it the backend of choice for
//! scenario tests.

use crate::remote::{RemoteEntry, RemoteError, RemoteFileStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A recorded remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOp {
    Upload(String),
    Download(String),
    List(String),
    Delete(String),
}

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<String, Vec<u8>>,
    folders: BTreeSet<String>,
    failing: HashSet<String>,
    ops: Vec<RemoteOp>,
}

/// Process-local remote file store
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    inner: Mutex<Inner>,
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

impl MemoryFileStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without recording an operation
    pub fn insert(&self, path: &str, contents: impl Into<Vec<u8>>) {
        self.inner.lock().files.insert(normalize(path), contents.into());
    }

    /// Seed an empty folder
    pub fn create_folder(&self, path: &str) {
        self.inner.lock().folders.insert(normalize(path));
    }

    /// Make every operation on `path` fail with a backend error
    pub fn fail_path(&self, path: &str) {
        self.inner.lock().failing.insert(normalize(path));
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.lock().files.get(&normalize(path)).cloned()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.inner.lock().files.contains_key(&normalize(path))
    }

    /// All stored file paths
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.inner.lock().files.keys().cloned().collect()
    }

    /// Calls made so far
    #[must_use]
    pub fn operations(&self) -> Vec<RemoteOp> {
        self.inner.lock().ops.clone()
    }

    /// Paths uploaded so far, in call order
    #[must_use]
    pub fn uploads(&self) -> Vec<String> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                RemoteOp::Upload(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Paths deleted so far, in call order
    #[must_use]
    pub fn deletes(&self) -> Vec<String> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                RemoteOp::Delete(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: RemoteOp) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock();
        let path = match &op {
            RemoteOp::Upload(p) | RemoteOp::Download(p) | RemoteOp::List(p) | RemoteOp::Delete(p) => {
                p.clone()
            }
        };
        inner.ops.push(op);
        if inner.failing.contains(&path) {
            return Err(RemoteError::Backend(format!("injected failure at {path}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteFileStore for MemoryFileStore {
    async fn upload(&self, path: &str, contents: Vec<u8>) -> Result<(), RemoteError> {
        let path = normalize(path);
        self.record(RemoteOp::Upload(path.clone()))?;
        self.inner.lock().files.insert(path, contents);
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let path = normalize(path);
        self.record(RemoteOp::Download(path.clone()))?;
        self.inner
            .lock()
            .files
            .get(&path)
            .cloned()
            .ok_or(RemoteError::NotFound(path))
    }

    async fn list_folder(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let folder = normalize(path);
        self.record(RemoteOp::List(folder.clone()))?;

        let inner = self.inner.lock();
        let mut files = Vec::new();
        let mut folders = BTreeSet::new();
        let all_paths = inner.files.keys().chain(inner.folders.iter());
        for candidate in all_paths {
            let Some(rest) = candidate
                .strip_prefix(folder.as_str())
                .and_then(|r| r.strip_prefix('/'))
            else {
                continue;
            };
            match rest.split_once('/') {
                Some((sub, _)) => {
                    folders.insert(format!("{folder}/{sub}"));
                }
                None if inner.folders.contains(candidate) => {
                    folders.insert(candidate.clone());
                }
                None => files.push(RemoteEntry::file(candidate.clone())),
            }
        }

        if files.is_empty() && folders.is_empty() && !inner.folders.contains(&folder) {
            return Err(RemoteError::NotFound(folder));
        }

        let mut entries = files;
        entries.extend(folders.into_iter().map(RemoteEntry::folder));
        Ok(entries)
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let path = normalize(path);
        self.record(RemoteOp::Delete(path.clone()))?;
        let mut inner = self.inner.lock();
        match inner.files.remove(&path) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound(path)),
        }
    }
}
