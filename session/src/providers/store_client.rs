//! Backing store client trait.

use crate::error::Result;
use crate::stores::KeySpace;
use std::future::Future;
use std::time::Duration;

/// Lease-backed key-value persistence for session payloads.
///
/// Implementations own the key namespace and translate each call into a
/// single network round trip. They must be safe for concurrent use by
/// many request tasks; pooling is their concern.
///
/// # Implementation Notes
///
/// - Keys are `{prefix}/{id}`
/// - Every save replaces both the value and its lease (TTL `max_age + 1`)
/// - The store, not this crate, physically expires keys
/// - No compare-and-swap: concurrent saves race and the last write wins
pub trait StoreClient: Send + Sync {
    /// Namespace this client stores keys under.
    fn key_space(&self) -> &KeySpace;

    /// Read the payload stored for `id`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The key is absent or its lease lapsed → `SessionError::NotFound`
    /// - The store is unreachable → `SessionError::Store`
    fn load(&self, id: &str) -> impl Future<Output = Result<String>> + Send;

    /// Write `payload` for `id` under a fresh lease of `max_age + 1` seconds.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `max_age` is not positive → `SessionError::Config`
    /// - Lease grant or write fails → `SessionError::Store`
    fn save(
        &self,
        id: &str,
        payload: &str,
        max_age: i64,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete the payload stored for `id`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Nothing was deleted → `SessionError::NotFound`
    /// - The store is unreachable → `SessionError::Store`
    fn delete(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Remaining lease time on the key for `id`.
    ///
    /// # Returns
    ///
    /// `None` if the key does not exist or carries no lease.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn remaining_ttl(&self, id: &str) -> impl Future<Output = Result<Option<Duration>>> + Send;

    /// Release the underlying connection.
    ///
    /// Safe to call more than once; later operations fail with
    /// `SessionError::Store`.
    ///
    /// # Errors
    ///
    /// Returns error if the connection could not be released cleanly.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}
