use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::key;
use crate::log::{self, Record, SyncMode};
use crate::map::UrlMap;
use crate::traits::Store;

/// Default capacity of the pending-write queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Default number of candidate keys `put` tries before giving up.
pub const DEFAULT_MAX_PUT_ATTEMPTS: usize = 64;

/// Configuration for a [`PrimaryStore`].
#[derive(Clone, Debug)]
pub struct PrimaryConfig {
    /// Durable log location. `None` keeps the store memory-only.
    pub log_path: Option<PathBuf>,
    /// Records that may wait for the writer before `put` blocks.
    pub queue_capacity: usize,
    /// Collision retry bound for `put`.
    pub max_put_attempts: usize,
    /// Flush/sync strategy for the log.
    pub sync_mode: SyncMode,
}

impl PrimaryConfig {
    /// Default configuration persisting to `path`.
    pub fn with_log(path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: Some(path.into()),
            ..Self::default()
        }
    }
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_put_attempts: DEFAULT_MAX_PUT_ATTEMPTS,
            sync_mode: SyncMode::default(),
        }
    }
}

struct Persistence {
    queue: mpsc::Sender<Record>,
    writer: JoinHandle<()>,
}

/// Authoritative URL store: mints keys, owns the map, persists every write.
///
/// Writes return as soon as the entry is in memory and its record is queued;
/// a single background task appends queued records to the log. When the
/// queue is full, `put` waits for room rather than dropping the record.
pub struct PrimaryStore {
    urls: UrlMap,
    persistence: Mutex<Option<Persistence>>,
    closed: AtomicBool,
    max_put_attempts: usize,
}

impl PrimaryStore {
    /// Memory-only store with no log and no writer.
    pub fn in_memory() -> Self {
        Self::empty(DEFAULT_MAX_PUT_ATTEMPTS)
    }

    /// Build a store from `config`, replaying its log first if one is set.
    ///
    /// Must be called from within a tokio runtime when `log_path` is set,
    /// since the background writer is spawned here. Replay problems are
    /// logged and never fatal: the store keeps whatever prefix decoded.
    pub fn open(config: PrimaryConfig) -> Self {
        let store = Self::empty(config.max_put_attempts.max(1));

        let Some(path) = config.log_path else {
            info!("primary store running memory-only");
            return store;
        };

        store.load(&path);

        let (queue, rx) = mpsc::channel(config.queue_capacity.max(1));
        let writer = log::spawn_writer(path.clone(), config.sync_mode, rx);
        *store.persistence.lock().expect("lock poisoned") = Some(Persistence { queue, writer });

        info!(
            path = %path.display(),
            entries = store.count(),
            queue_capacity = config.queue_capacity,
            "primary store opened"
        );
        store
    }

    fn empty(max_put_attempts: usize) -> Self {
        Self {
            urls: UrlMap::new(),
            persistence: Mutex::new(None),
            closed: AtomicBool::new(false),
            max_put_attempts,
        }
    }

    fn load(&self, path: &std::path::Path) {
        let replay = match log::replay(path) {
            Ok(replay) => replay,
            Err(e) => {
                error!(error = %e, "could not load log; starting empty");
                return;
            }
        };

        let total = replay.records.len();
        for record in replay.records {
            if let Err(e) = self.set(&record.key, &record.url) {
                warn!(error = %e, "duplicate key in log; keeping first binding");
            }
        }
        match replay.tail_error {
            Some(e @ StoreError::LogCorrupt { .. }) => {
                warn!(error = %e, "log ends in a malformed record; keeping records before it");
                // Appends must not land behind the bad bytes.
                match log::truncate_tail(path, replay.valid_len) {
                    Ok(removed) => warn!(
                        removed,
                        valid_len = replay.valid_len,
                        moved_to = %crate::log::corrupt_path(path).display(),
                        "cut malformed tail from log"
                    ),
                    Err(e) => error!(error = %e, "could not cut malformed tail from log"),
                }
            }
            Some(e) => warn!(error = %e, "log read stopped early; keeping records before it"),
            None => {}
        }
        debug!(records = total, entries = self.count(), "log loaded");
    }

    /// Look up the URL bound to `key`.
    pub fn get(&self, key: &str) -> StoreResult<String> {
        self.urls
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Bind `key` to `url` if the key is free. Never touches the log.
    pub fn set(&self, key: &str, url: &str) -> StoreResult<()> {
        self.urls.insert(key, url)
    }

    /// Number of live entries.
    pub fn count(&self) -> usize {
        self.urls.len()
    }

    /// Remove `key` from memory. Returns `true` if it was present.
    ///
    /// Not part of the [`Store`] contract, and the log keeps the record, so
    /// the binding reappears after a restart.
    pub fn delete(&self, key: &str) -> bool {
        self.urls.remove(key)
    }

    /// Copy of every live entry, ordered by key.
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.urls.snapshot()
    }

    /// Mint a key for `url`, install it, and queue its record.
    ///
    /// The candidate key is derived from the current entry count. Another
    /// writer may take that key between the count and the install; the
    /// candidate is then recomputed, always moving past keys already tried,
    /// for at most `max_put_attempts` tries.
    pub async fn put(&self, url: String) -> StoreResult<String> {
        let queue = self.queue()?;

        // Reserve the queue slot before taking the map lock so the record can
        // be pushed while the lock is held: log order is lock order.
        let mut permit = match &queue {
            Some(queue) => Some(queue.reserve().await.map_err(|_| StoreError::Closed)?),
            None => None,
        };

        let mut last_tried: Option<u64> = None;
        for attempt in 1..=self.max_put_attempts {
            let mut ordinal = self.count() as u64;
            if let Some(prev) = last_tried {
                if ordinal <= prev {
                    ordinal = prev + 1;
                }
            }
            last_tried = Some(ordinal);

            let key = key::generate(ordinal);
            let installed = self.urls.insert_with(&key, &url, || {
                if let Some(permit) = permit.take() {
                    permit.send(Record::new(key.clone(), url.clone()));
                }
            });

            match installed {
                Ok(()) => {
                    debug!(%key, attempt, "put");
                    return Ok(key);
                }
                Err(StoreError::AlreadyExists(_)) => {
                    debug!(%key, attempt, "key collision; retrying");
                }
                Err(e) => return Err(e),
            }
        }

        warn!(attempts = self.max_put_attempts, "no free key found");
        Err(StoreError::KeySpaceExhausted {
            attempts: self.max_put_attempts,
        })
    }

    fn queue(&self) -> StoreResult<Option<mpsc::Sender<Record>>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        let persistence = self.persistence.lock().expect("lock poisoned");
        Ok(persistence.as_ref().map(|p| p.queue.clone()))
    }

    /// Stop accepting writes, drain the queue into the log, and wait for the
    /// writer to finish. Reads keep working. Calling it again is a no-op.
    pub async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        let persistence = self.persistence.lock().expect("lock poisoned").take();

        if let Some(Persistence { queue, writer }) = persistence {
            drop(queue);
            writer
                .await
                .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))?;
            info!(entries = self.count(), "primary store closed");
        }
        Ok(())
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Store for PrimaryStore {
    async fn put(&self, url: String) -> StoreResult<String> {
        PrimaryStore::put(self, url).await
    }

    async fn get(&self, key: &str) -> StoreResult<String> {
        PrimaryStore::get(self, key)
    }
}

impl std::fmt::Debug for PrimaryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryStore")
            .field("entry_count", &self.count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
