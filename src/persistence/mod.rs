//! # Persistence Module
//!
//! Plain key/value storage for the binding table and settings. The engine
//! never touches files directly: it serializes a snapshot and hands it to the
//! [`PersistenceWorker`], which writes through a [`KeyValueStore`].
//!
//! ## Error Handling Strategy
//! Load failures and undecodable data degrade to defaults; nothing here stops
//! the application from starting.

pub mod file_store;
pub mod memory_store;
pub mod persistence_worker;
pub mod settings;

use async_trait::async_trait;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use persistence_worker::{PersistenceHandle, PersistenceWorker};
pub use settings::{PointerMode, Settings, SettingsHandle, StickRoles};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Persistence worker is not running")]
    WorkerStopped,
}

/// Byte-oriented storage addressed by short string keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns `None` when nothing has been stored under `key` yet.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError>;
}
