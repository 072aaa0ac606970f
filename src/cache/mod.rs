//! Durable local cache for the clip collection
//!
//! The whole collection is stored as a single serialized value and always
//! replaced as a unit. Reads never fail: missing or unparseable data comes
//! back as an empty collection. Write failures are logged and swallowed, so
//! the engine keeps working purely in memory when persistence is broken.

pub mod sqlite;

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, warn};

use crate::clip::Clip;

pub use sqlite::SqliteBackend;

/// Key under which the collection is stored
pub const STORAGE_KEY: &str = "syncclip_data";

/// Local persistence errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite error
    #[error("Cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization error
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend lock was poisoned by a panicking writer
    #[error("Cache backend is unavailable")]
    Poisoned,
}

/// Raw blob storage underneath [`LocalCache`]
pub trait CacheBackend: Send + Sync {
    /// Load the blob stored under `key`, if any
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replace the blob stored under `key`
    fn store(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}

/// In-memory backend, used when no durable storage is configured and in tests
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blob: Mutex<Option<Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the backend with raw bytes, valid or not
    pub fn with_raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            blob: Mutex::new(Some(bytes.into())),
        }
    }
}

impl CacheBackend for MemoryBackend {
    fn load(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let blob = self.blob.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(blob.clone())
    }

    fn store(&self, _key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut blob = self.blob.lock().map_err(|_| StorageError::Poisoned)?;
        *blob = Some(value.to_vec());
        Ok(())
    }
}

/// Whole-collection cache with best-effort persistence
#[derive(Clone)]
pub struct LocalCache {
    backend: Arc<dyn CacheBackend>,
}

impl LocalCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Cache that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Read the stored collection; absent or corrupt data yields an empty one
    pub fn read(&self) -> Vec<Clip> {
        match self.try_read() {
            Ok(clips) => clips,
            Err(e) => {
                warn!("Error reading from local cache, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Replace the stored collection. Failures are logged, never returned.
    pub fn write(&self, clips: &[Clip]) {
        if let Err(e) = self.try_write(clips) {
            warn!("Error writing to local cache: {}", e);
        }
    }

    /// Strict read, surfacing [`StorageError`]
    pub fn try_read(&self) -> Result<Vec<Clip>, StorageError> {
        match self.backend.load(STORAGE_KEY)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    /// Strict write, surfacing [`StorageError`]
    pub fn try_write(&self, clips: &[Clip]) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(clips)?;
        self.backend.store(STORAGE_KEY, &bytes)?;
        debug!("Cached {} clips", clips.len());
        Ok(())
    }
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache").finish_non_exhaustive()
    }
}
