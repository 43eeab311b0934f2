//! Token persistence.
//!
//! [`KeyValueStore`] is the shape of the DOM Storage API (`getItem`,
//! `setItem`, `removeItem`). [`TokenStore`] keeps a single credential under one
//! fixed key in such a store.
//!
//! Two backends ship with the crate:
//! - [`InMemoryStore`]: session-scoped, gone with the process.
//! - [`FileStore`]: a JSON file on disk, survives restarts.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Object-safe string key/value store.
pub trait KeyValueStore: Send + Sync {
    /// Retrieves the value for `key`, or `None` if absent.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Sets the value for `key`, overwriting any existing value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key succeeds.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Durable store backed by a single JSON object on disk.
///
/// The whole map is loaded on open and rewritten on every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    data: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open `path`, creating an empty store if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let data = match fs::read(&path) {
            Ok(raw) if raw.is_empty() => HashMap::new(),
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, data: &HashMap<String, String>) -> Result<(), StorageError> {
        let raw = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    // Mutations go to disk first; memory only changes once the flush succeeded.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = data.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next)?;
        *data = next;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        if !data.contains_key(key) {
            return Ok(());
        }
        let mut next = data.clone();
        next.remove(key);
        self.flush(&next)?;
        *data = next;
        Ok(())
    }
}

/// Holds at most one token under a fixed key.
///
/// Storage failures are logged and swallowed; callers see an infallible API.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("key", &self.key)
            .field("is_set", &self.is_set())
            .finish()
    }
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>, key: &str) -> Self {
        Self {
            store,
            key: key.to_string(),
        }
    }

    /// A token store over a fresh [`InMemoryStore`].
    pub fn in_memory(key: &str) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), key)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn set(&self, token: &str) {
        if let Err(e) = self.store.set_item(&self.key, token) {
            warn!(key = %self.key, error = %e, "failed to persist token");
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove_item(&self.key) {
            warn!(key = %self.key, error = %e, "failed to remove token");
        }
    }

    /// The stored token. An empty string counts as no token.
    pub fn get(&self) -> Option<String> {
        self.store
            .get_item(&self.key)
            .filter(|token| !token.is_empty())
    }

    pub fn is_set(&self) -> bool {
        self.get().is_some()
    }
}
