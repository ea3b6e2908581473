//! Backing store client implementations.
//!
//! - **Redis** (`RedisStoreClient`) - `SET … EX` gives every key a lease
//! - **etcd** (`EtcdStoreClient`, `etcd` feature) - keys bound to granted leases
//! - **Memory** (`MemoryStoreClient`) - process-local map with lease deadlines
//!
//! Both lay keys out as `{prefix}/{id}` via [`KeySpace`] and size leases
//! with [`lease_ttl`].

#[cfg(feature = "etcd")]
pub mod etcd;
pub mod memory;
pub mod redis;

#[cfg(feature = "etcd")]
pub use etcd::EtcdStoreClient;
pub use memory::MemoryStoreClient;
pub use redis::RedisStoreClient;

use crate::constants::{DEFAULT_KEY_PREFIX, LEASE_GRACE_SECS};
use crate::error::{Result, SessionError};

/// Namespace under which session keys live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Create a key space.
    ///
    /// An empty prefix falls back to `/sessions`; trailing slashes are
    /// trimmed so keys never contain `//`.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        let prefix = if prefix.is_empty() {
            DEFAULT_KEY_PREFIX
        } else {
            prefix
        };
        Self {
            prefix: prefix.to_string(),
        }
    }

    /// The namespace prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Store key for a session id.
    #[must_use]
    pub fn key(&self, id: &str) -> String {
        format!("{}/{id}", self.prefix)
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

/// Lease length in seconds for a session saved with `max_age`.
///
/// # Errors
///
/// Returns `SessionError::Config` if `max_age` is not positive; such
/// sessions are deleted, never leased.
pub fn lease_ttl(max_age: i64) -> Result<u64> {
    if max_age <= 0 {
        return Err(SessionError::Config(format!(
            "Cannot lease a session with max age {max_age}"
        )));
    }
    u64::try_from(max_age.saturating_add(LEASE_GRACE_SECS))
        .map_err(|e| SessionError::Config(format!("Invalid lease TTL: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let keys = KeySpace::new("/sessions");
        assert_eq!(keys.key("abc"), "/sessions/abc");
    }

    #[test]
    fn test_prefix_normalization() {
        assert_eq!(KeySpace::new("").prefix(), "/sessions");
        assert_eq!(KeySpace::new("/app/sessions/").key("x"), "/app/sessions/x");
        assert_eq!(KeySpace::default(), KeySpace::new("/sessions"));
    }

    #[test]
    fn test_lease_is_max_age_plus_one() {
        assert_eq!(lease_ttl(60), Ok(61));
        assert_eq!(lease_ttl(86_400 * 30), Ok(86_400 * 30 + 1));
    }

    #[test]
    fn test_non_positive_max_age_has_no_lease() {
        assert!(matches!(lease_ttl(0), Err(SessionError::Config(_))));
        assert!(matches!(lease_ttl(-1), Err(SessionError::Config(_))));
    }
}
