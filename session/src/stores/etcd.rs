//! etcd-based store client.
//!
//! # Architecture
//!
//! Sessions are stored in etcd with:
//! - **Key**: `{prefix}/{session_id}` → authenticated, optionally encrypted payload
//! - **Lease**: each save grants a fresh lease of `max_age + 1` seconds and
//!   puts the key bound to it
//! - **Expiry**: etcd deletes the key when its lease lapses
//!
//! Requires the `etcd` cargo feature.
//!
//! # Example
//!
//! ```no_run
//! use lease_sessions::stores::EtcdStoreClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = EtcdStoreClient::new(&["127.0.0.1:2379"], "/sessions").await?;
//! # Ok(())
//! # }
//! ```

use super::{lease_ttl, KeySpace};
use crate::error::{Result, SessionError};
use crate::providers::StoreClient;
use etcd_client::{Client, PutOptions};
use std::sync::Mutex;
use std::time::Duration;

/// etcd store client with lease-bound keys.
///
/// The underlying gRPC channel is shared by clones of `Client`, so each
/// call works on a cheap clone.
pub struct EtcdStoreClient {
    /// `None` once closed.
    client: Mutex<Option<Client>>,
    keys: KeySpace,
}

impl EtcdStoreClient {
    /// Connect to an etcd cluster.
    ///
    /// # Arguments
    ///
    /// * `endpoints` - Cluster member addresses (e.g., `["127.0.0.1:2379"]`)
    /// * `key_prefix` - Namespace for session keys; empty means `/sessions`
    ///
    /// # Errors
    ///
    /// Returns error if connection to etcd fails.
    pub async fn new<E: AsRef<str>>(endpoints: &[E], key_prefix: &str) -> Result<Self> {
        let client = Client::connect(endpoints, None)
            .await
            .map_err(|e| SessionError::Store(format!("Failed to connect to etcd: {e}")))?;

        tracing::debug!(key_prefix = %key_prefix, "Connected etcd session store client");

        Ok(Self {
            client: Mutex::new(Some(client)),
            keys: KeySpace::new(key_prefix),
        })
    }

    fn connection(&self) -> Result<Client> {
        self.client
            .lock()
            .map_err(|_| SessionError::Store("Mutex lock failed".to_string()))?
            .clone()
            .ok_or_else(|| SessionError::Store("etcd client is closed".to_string()))
    }
}

impl StoreClient for EtcdStoreClient {
    fn key_space(&self) -> &KeySpace {
        &self.keys
    }

    async fn load(&self, id: &str) -> Result<String> {
        let mut client = self.connection()?;
        let key = self.keys.key(id);

        let response = client
            .get(key.as_str(), None)
            .await
            .map_err(|e| SessionError::Store(format!("Failed to get session from etcd: {e}")))?;

        let Some(entry) = response.kvs().first() else {
            return Err(SessionError::NotFound { key });
        };

        entry
            .value_str()
            .map(str::to_string)
            .map_err(|e| SessionError::Store(format!("Stored session is not UTF-8: {e}")))
    }

    async fn save(&self, id: &str, payload: &str, max_age: i64) -> Result<()> {
        let ttl_seconds = i64::try_from(lease_ttl(max_age)?)
            .map_err(|e| SessionError::Config(format!("Invalid lease TTL: {e}")))?;
        let mut client = self.connection()?;
        let key = self.keys.key(id);

        let lease = client
            .lease_grant(ttl_seconds, None)
            .await
            .map_err(|e| SessionError::Store(format!("Failed to grant etcd lease: {e}")))?;

        client
            .put(
                key.as_str(),
                payload,
                Some(PutOptions::new().with_lease(lease.id())),
            )
            .await
            .map_err(|e| SessionError::Store(format!("Failed to save session to etcd: {e}")))?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut client = self.connection()?;
        let key = self.keys.key(id);

        let response = client.delete(key.as_str(), None).await.map_err(|e| {
            SessionError::Store(format!("Failed to delete session from etcd: {e}"))
        })?;

        if response.deleted() == 0 {
            return Err(SessionError::NotFound { key });
        }
        Ok(())
    }

    async fn remaining_ttl(&self, id: &str) -> Result<Option<Duration>> {
        let mut client = self.connection()?;
        let key = self.keys.key(id);

        let response = client
            .get(key.as_str(), None)
            .await
            .map_err(|e| SessionError::Store(format!("Failed to get session from etcd: {e}")))?;

        // Lease id 0: key has no lease
        let Some(lease_id) = response
            .kvs()
            .first()
            .map(etcd_client::KeyValue::lease)
            .filter(|lease_id| *lease_id != 0)
        else {
            return Ok(None);
        };

        let lease = client
            .lease_time_to_live(lease_id, None)
            .await
            .map_err(|e| SessionError::Store(format!("Failed to get session TTL: {e}")))?;

        // -1: lease expired or revoked
        Ok(u64::try_from(lease.ttl())
            .ok()
            .filter(|seconds| *seconds > 0)
            .map(Duration::from_secs))
    }

    async fn close(&self) -> Result<()> {
        let released = self
            .client
            .lock()
            .map_err(|_| SessionError::Store("Mutex lock failed".to_string()))?
            .take();

        if released.is_some() {
            tracing::debug!(key_prefix = %self.keys.prefix(), "Closed etcd session store client");
        }
        Ok(())
    }
}
