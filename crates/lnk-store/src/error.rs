use std::path::PathBuf;

/// Errors from URL store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key is not bound to any URL.
    #[error("key not found: {0}")]
    NotFound(String),

    /// The key is already bound. Keys are never overwritten.
    #[error("key already exists: {0}")]
    AlreadyExists(String),

    /// `put` could not find a free key within the configured attempt budget.
    #[error("key space exhausted after {attempts} attempts")]
    KeySpaceExhausted { attempts: usize },

    /// A background append to the durable log failed.
    #[error("persistence write failed for key {key}: {reason}")]
    PersistenceWriteFailed { key: String, reason: String },

    /// The durable log holds a malformed record at the given byte offset.
    #[error("corrupt log record at offset {offset}: {reason}")]
    LogCorrupt { offset: u64, reason: String },

    /// The durable log exists but could not be opened.
    #[error("log unavailable at {}: {reason}", path.display())]
    LogUnavailable { path: PathBuf, reason: String },

    /// A delegated call to a remote store failed.
    #[error("remote error: {0}")]
    Remote(String),

    /// The store has been closed and no longer accepts writes.
    #[error("store is closed")]
    Closed,

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
