//! Local key-value persistence.
//!
//! # Architecture
//!
//! ```text
//! Repository  (typed collections: interviews_<user>, results_<user>,
//!   │          currentUser, users)
//!   ▼
//! dyn KeyValueStore
//!   ├─ FileStore    one JSON file per key, atomic replace
//!   └─ MemoryStore  in-process map
//! ```
//!
//! Values are opaque strings at the store level; the repository owns the
//! JSON encoding.

pub mod file;
pub mod repository;

use thiserror::Error;

pub use file::{FileStore, MemoryStore};
pub use repository::Repository;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("stored value under `{key}` is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
}

/// String-valued key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn KeyValueStore>) {}
};

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

/// Reads succeed with nothing stored; every write fails.
#[cfg(test)]
pub struct FailingStore;

#[cfg(test)]
impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), PersistenceError> {
        Err(PersistenceError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only store",
        )))
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.set(key, "")
    }
}
