use async_trait::async_trait;

use crate::error::StoreResult;

/// The two-operation URL store contract.
///
/// Implemented by the authoritative [`PrimaryStore`](crate::PrimaryStore),
/// the caching [`ReplicaStore`](crate::ReplicaStore), and remote clients.
/// Callers hold a `dyn Store` and never branch on which one they have.
///
/// All implementations must satisfy these invariants:
/// - A key returned by `put` is bound to exactly the URL that was put, and
///   that binding never changes.
/// - `get` on an unbound key fails with
///   [`StoreError::NotFound`](crate::StoreError::NotFound); it never
///   returns a default value.
#[async_trait]
pub trait Store: Send + Sync {
    /// Store `url` under a freshly minted key and return the key.
    async fn put(&self, url: String) -> StoreResult<String>;

    /// Look up the URL bound to `key`.
    async fn get(&self, key: &str) -> StoreResult<String>;
}
