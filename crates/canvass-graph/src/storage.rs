//! Local persistent key-value storage
//!
//! Provides the [`KeyValueStore`] contract plus two backends:
//! - [`MemoryKv`]: process-local, for tests and ephemeral sessions
//! - [`DirKv`]: one file per key inside a directory
//!
//! Keys used by the application live in [`keys`].

use crate::error::{GraphError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Well-known storage keys
pub mod keys {
    /// Prefix of per-form node stores
    pub const PINS_PREFIX: &str = "OV_CANVASS_PINS@";
    /// Canvass settings blob
    pub const SETTINGS: &str = "OV_CANVASS_SETTINGS";
    /// Locally known forms
    pub const FORMS: &str = "OV_CANVASS_FORMS";
    /// Guidelines disclosure flag
    pub const DISCLOSURE: &str = "OV_DISCLOUSER";

    /// Key of the node store for `form_id`
    #[must_use]
    pub fn pins(form_id: &str) -> String {
        format!("{PINS_PREFIX}{form_id}")
    }
}

/// String-keyed durable blob storage
pub trait KeyValueStore: Send + Sync + Debug {
    /// Read a value
    ///
    /// # Errors
    /// Returns error if the backend cannot be read
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    ///
    /// # Errors
    /// Returns error if the backend cannot be written
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value (absent keys are not an error)
    ///
    /// # Errors
    /// Returns error if the backend cannot be written
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory key-value store
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Directory-backed key-value store (one file per key)
#[derive(Debug, Clone)]
pub struct DirKv {
    root: PathBuf,
}

impl DirKv {
    /// Open (creating if needed) a store rooted at `root`
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| GraphError::storage(&root, e))?;
        Ok(Self { root })
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(file_name_for(key))
    }
}

/// File-system safe name for a key: unreserved bytes pass, the rest are `%XX`
fn file_name_for(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.') {
            name.push(char::from(byte));
        } else {
            name.push_str(&format!("%{byte:02X}"));
        }
    }
    name
}

impl KeyValueStore for DirKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GraphError::storage(&path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, value).map_err(|e| GraphError::storage(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| GraphError::storage(&path, e))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GraphError::storage(&path, e)),
        }
    }
}

/// Whether the canvassing guidelines disclosure was accepted
///
/// The flag holds `"false"` once accepted (the disclosure no longer shows).
///
/// # Errors
/// Returns error if storage cannot be read
pub fn disclosure_accepted(storage: &dyn KeyValueStore) -> Result<bool> {
    Ok(storage.get(keys::DISCLOSURE)?.as_deref() == Some("false"))
}

/// Record acceptance of the canvassing guidelines
///
/// # Errors
/// Returns error if storage cannot be written
pub fn accept_disclosure(storage: &dyn KeyValueStore) -> Result<()> {
    storage.set(keys::DISCLOSURE, "false")
}
