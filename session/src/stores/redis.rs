//! Redis-based store client.
//!
//! # Architecture
//!
//! Sessions are stored in Redis with:
//! - **Key**: `{prefix}/{session_id}` → authenticated, optionally encrypted payload
//! - **Lease**: `SET … EX {max_age + 1}` replaces value and TTL in one command
//! - **Expiry**: Redis drops the key when the TTL lapses
//!
//! # Example
//!
//! ```no_run
//! use lease_sessions::stores::RedisStoreClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RedisStoreClient::new("redis://127.0.0.1:6379", "/sessions").await?;
//! # Ok(())
//! # }
//! ```

use super::{lease_ttl, KeySpace};
use crate::error::{Result, SessionError};
use crate::providers::StoreClient;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::sync::Mutex;
use std::time::Duration;

/// Redis store client with TTL-based leases.
///
/// Connections are pooled and multiplexed by `ConnectionManager`, which
/// also reconnects after transient failures.
pub struct RedisStoreClient {
    /// `None` once closed.
    conn_manager: Mutex<Option<ConnectionManager>>,
    keys: KeySpace,
}

impl RedisStoreClient {
    /// Connect to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    /// * `key_prefix` - Namespace for session keys; empty means `/sessions`
    ///
    /// # Errors
    ///
    /// Returns error if connection to Redis fails.
    pub async fn new(redis_url: &str, key_prefix: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| SessionError::Store(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            SessionError::Store(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::debug!(key_prefix = %key_prefix, "Connected Redis session store client");

        Ok(Self {
            conn_manager: Mutex::new(Some(conn_manager)),
            keys: KeySpace::new(key_prefix),
        })
    }

    fn connection(&self) -> Result<ConnectionManager> {
        self.conn_manager
            .lock()
            .map_err(|_| SessionError::Store("Mutex lock failed".to_string()))?
            .clone()
            .ok_or_else(|| SessionError::Store("Redis client is closed".to_string()))
    }
}

impl StoreClient for RedisStoreClient {
    fn key_space(&self) -> &KeySpace {
        &self.keys
    }

    async fn load(&self, id: &str) -> Result<String> {
        let mut conn = self.connection()?;
        let key = self.keys.key(id);

        let payload: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| SessionError::Store(format!("Failed to get session from Redis: {e}")))?;

        payload.ok_or(SessionError::NotFound { key })
    }

    async fn save(&self, id: &str, payload: &str, max_age: i64) -> Result<()> {
        let ttl_seconds = lease_ttl(max_age)?;
        let mut conn = self.connection()?;
        let key = self.keys.key(id);

        let _: () = conn
            .set_ex(&key, payload, ttl_seconds)
            .await
            .map_err(|e| SessionError::Store(format!("Failed to save session to Redis: {e}")))?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut conn = self.connection()?;
        let key = self.keys.key(id);

        let deleted: usize = conn.del(&key).await.map_err(|e| {
            SessionError::Store(format!("Failed to delete session from Redis: {e}"))
        })?;

        if deleted == 0 {
            return Err(SessionError::NotFound { key });
        }
        Ok(())
    }

    async fn remaining_ttl(&self, id: &str) -> Result<Option<Duration>> {
        let mut conn = self.connection()?;
        let key = self.keys.key(id);

        let ttl_seconds: i64 = conn
            .ttl(&key)
            .await
            .map_err(|e| SessionError::Store(format!("Failed to get session TTL: {e}")))?;

        // -2: key doesn't exist, -1: key has no expiration
        Ok(u64::try_from(ttl_seconds)
            .ok()
            .filter(|seconds| *seconds > 0)
            .map(Duration::from_secs))
    }

    async fn close(&self) -> Result<()> {
        let released = self
            .conn_manager
            .lock()
            .map_err(|_| SessionError::Store("Mutex lock failed".to_string()))?
            .take();

        if released.is_some() {
            tracing::debug!(key_prefix = %self.keys.prefix(), "Closed Redis session store client");
        }
        Ok(())
    }
}
