//! Short-key URL storage for Lnk.
//!
//! Maps compact keys to long URLs. A primary store mints keys and persists
//! every binding to an append-only log; replicas cache reads and forward
//! writes to a primary.
//!
//! # Components
//!
//! - [`key`] -- ordinal to base-62 key generation
//! - [`UrlMap`] -- the `RwLock`-guarded map shared by both store kinds
//! - [`log`] -- durable record format, replay, and the background writer
//! - [`PrimaryStore`] -- authoritative map plus durable log
//! - [`ReplicaStore`] -- local cache in front of a remote [`Store`]
//!
//! # Design Rules
//!
//! 1. A key is bound at most once and its URL never changes.
//! 2. Only the primary mints keys; replicas forward every `put`.
//! 3. A write returns once it is in memory and queued for the log.
//! 4. The log is only ever appended to, by a single writer.
//! 5. Replay tolerates a torn final record.
//! 6. Failed remote calls never mutate a replica's cache.

pub mod error;
pub mod key;
pub mod log;
pub mod map;
pub mod primary;
pub mod replica;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use log::{Record, SyncMode};
pub use map::UrlMap;
pub use primary::{PrimaryConfig, PrimaryStore, DEFAULT_MAX_PUT_ATTEMPTS, DEFAULT_QUEUE_CAPACITY};
pub use replica::ReplicaStore;
pub use traits::Store;
