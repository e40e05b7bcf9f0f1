use std::collections::HashMap;

/// Failures reported by a durable key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing medium failed.
    #[error("store i/o failed for key `{key}`")]
    Io {
        /// Key being accessed.
        key: String,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// The store refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable string store holding session snapshots.
pub trait KeyValueStore {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deletes the value stored under `key`; deleting a missing key succeeds.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-process store used by tests and embedders without durable storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    writes: usize,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation.
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.writes
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let _ = self.entries.insert(key.to_owned(), value.to_owned());
        self.writes += 1;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let _ = self.entries.remove(key);
        Ok(())
    }
}
