use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};

/// In-memory, HashMap-based key to URL map.
///
/// Backs both the primary store and the replica cache. Entries are held
/// behind a single `RwLock`: lookups share it, inserts and deletes take it
/// exclusively. Inserts never overwrite an existing key.
pub struct UrlMap {
    urls: RwLock<HashMap<String, String>>,
}

impl UrlMap {
    /// Create a new empty map.
    pub fn new() -> Self {
        Self {
            urls: RwLock::new(HashMap::new()),
        }
    }

    /// Look up the URL bound to `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.urls.read().expect("lock poisoned").get(key).cloned()
    }

    /// Bind `key` to `url` if the key is free.
    pub fn insert(&self, key: &str, url: &str) -> StoreResult<()> {
        let mut map = self.urls.write().expect("lock poisoned");
        insert_locked(&mut map, key, url)
    }

    /// Bind `key` to `url` if free, running `on_commit` before the exclusive
    /// lock is released. `on_commit` only runs when the insert succeeds.
    pub fn insert_with<F>(&self, key: &str, url: &str, on_commit: F) -> StoreResult<()>
    where
        F: FnOnce(),
    {
        let mut map = self.urls.write().expect("lock poisoned");
        insert_locked(&mut map, key, url)?;
        on_commit();
        Ok(())
    }

    /// Remove `key`. Returns `true` if it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.urls.write().expect("lock poisoned").remove(key).is_some()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.urls.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.urls.read().expect("lock poisoned").is_empty()
    }

    /// Copy of every entry, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let map = self.urls.read().expect("lock poisoned");
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

fn insert_locked(map: &mut HashMap<String, String>, key: &str, url: &str) -> StoreResult<()> {
    if map.contains_key(key) {
        return Err(StoreError::AlreadyExists(key.to_string()));
    }
    map.insert(key.to_string(), url.to_string());
    Ok(())
}

impl Default for UrlMap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UrlMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlMap")
            .field("entry_count", &self.len())
            .finish()
    }
}
