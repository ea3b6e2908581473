//! In-memory store client with lease semantics.
//!
//! Keys expire on the tokio clock, so tests can pause time and advance
//! past a lease instead of sleeping. Suitable for tests and single-process
//! deployments; nothing is shared between processes.

use super::{lease_ttl, KeySpace};
use crate::error::{Result, SessionError};
use crate::providers::StoreClient;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Leased {
    payload: String,
    expires_at: Instant,
}

impl Leased {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local store client.
///
/// Clones share the same map.
#[derive(Debug, Clone)]
pub struct MemoryStoreClient {
    keys: KeySpace,
    entries: Arc<Mutex<HashMap<String, Leased>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryStoreClient {
    /// Create an empty store under the default `/sessions` prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix("")
    }

    /// Create an empty store under `prefix`.
    #[must_use]
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            keys: KeySpace::new(prefix),
            entries: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of live (unexpired) keys.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn key_count(&self) -> Result<usize> {
        let now = Instant::now();
        Ok(self.entries()?.values().filter(|e| e.is_live(now)).count())
    }

    /// Replace the raw payload stored for `id`, keeping its lease.
    ///
    /// Returns `false` if no such key exists. Lets tests tamper with what
    /// the store hands back.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn overwrite(&self, id: &str, payload: &str) -> Result<bool> {
        let key = self.keys.key(id);
        Ok(self
            .entries()?
            .get_mut(&key)
            .map(|entry| entry.payload = payload.to_string())
            .is_some())
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Leased>>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Store("Store client is closed".to_string()));
        }
        self.entries
            .lock()
            .map_err(|_| SessionError::Store("Mutex lock failed".to_string()))
    }
}

impl Default for MemoryStoreClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreClient for MemoryStoreClient {
    fn key_space(&self) -> &KeySpace {
        &self.keys
    }

    async fn load(&self, id: &str) -> Result<String> {
        let key = self.keys.key(id);
        let now = Instant::now();
        let mut entries = self.entries()?;

        match entries.get(&key) {
            Some(entry) if entry.is_live(now) => Ok(entry.payload.clone()),
            Some(_) => {
                entries.remove(&key);
                Err(SessionError::NotFound { key })
            }
            None => Err(SessionError::NotFound { key }),
        }
    }

    async fn save(&self, id: &str, payload: &str, max_age: i64) -> Result<()> {
        let ttl = lease_ttl(max_age)?;
        let key = self.keys.key(id);
        let expires_at = Instant::now()
            .checked_add(Duration::from_secs(ttl))
            .ok_or_else(|| SessionError::Store(format!("Lease of {ttl}s is out of range")))?;
        let leased = Leased {
            payload: payload.to_string(),
            expires_at,
        };
        self.entries()?.insert(key, leased);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let key = self.keys.key(id);
        let now = Instant::now();

        match self.entries()?.remove(&key) {
            Some(entry) if entry.is_live(now) => Ok(()),
            _ => Err(SessionError::NotFound { key }),
        }
    }

    async fn remaining_ttl(&self, id: &str) -> Result<Option<Duration>> {
        let key = self.keys.key(id);
        let now = Instant::now();

        Ok(self
            .entries()?
            .get(&key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemoryStoreClient::new();

        store.save("abc", "payload", 60).await.unwrap();
        assert_eq!(store.load("abc").await.unwrap(), "payload");
        assert_eq!(store.key_count().unwrap(), 1);

        store.delete("abc").await.unwrap();
        assert!(store.load("abc").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_missing_key_not_found() {
        let store = MemoryStoreClient::with_prefix("/app");
        let err = store.load("nope").await.unwrap_err();
        assert_eq!(
            err,
            SessionError::NotFound {
                key: "/app/nope".to_string()
            }
        );
        assert!(store.delete("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_expires() {
        let store = MemoryStoreClient::new();
        store.save("abc", "payload", 10).await.unwrap();

        let ttl = store.remaining_ttl("abc").await.unwrap().unwrap();
        assert_eq!(ttl, Duration::from_secs(11));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(store.load("abc").await.is_ok());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.load("abc").await.unwrap_err().is_not_found());
        assert_eq!(store.remaining_ttl("abc").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_replaces_value_and_lease() {
        let store = MemoryStoreClient::new();
        store.save("abc", "v1", 5).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;

        store.save("abc", "v2", 100).await.unwrap();

        assert_eq!(store.load("abc").await.unwrap(), "v2");
        assert_eq!(
            store.remaining_ttl("abc").await.unwrap(),
            Some(Duration::from_secs(101))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_after_expiry_is_not_found() {
        let store = MemoryStoreClient::new();
        store.save("abc", "payload", 1).await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;

        assert!(store.delete("abc").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_closed_store_rejects_operations() {
        let store = MemoryStoreClient::new();
        store.close().await.unwrap();
        store.close().await.unwrap();

        assert!(store.load("abc").await.unwrap_err().is_store_failure());
        assert!(store.save("abc", "p", 10).await.unwrap_err().is_store_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_far_future_lease() {
        let store = MemoryStoreClient::new();
        store.save("abc", "payload", 400_000_000_000).await.unwrap();
        assert_eq!(
            store.remaining_ttl("abc").await.unwrap(),
            Some(Duration::from_secs(400_000_000_001))
        );

        let err = store.save("abc", "payload", i64::MAX).await.unwrap_err();
        assert!(err.is_store_failure());
    }

    #[tokio::test]
    async fn test_non_positive_max_age_rejected() {
        let store = MemoryStoreClient::new();
        let err = store.save("abc", "p", 0).await.unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }
}
