//! Session store configuration.
//!
//! Configuration is built once at startup and shared read-only by every
//! request. Only the default max age can change afterwards, through
//! [`SessionStore::set_max_age`](crate::SessionStore::set_max_age).
//!
//! The key namespace belongs to the store client (see
//! [`RedisStoreClient::new`](crate::RedisStoreClient::new) and
//! [`MemoryStoreClient::with_prefix`](crate::MemoryStoreClient::with_prefix)),
//! which is the only place keys are laid out.

use crate::constants::{DEFAULT_MAX_ENCODED_LENGTH, DEFAULT_OPERATION_TIMEOUT};
use crate::error::{Result, SessionError};
use crate::securecookie::{KeyPair, KeyRing};
use crate::state::SessionOptions;
use std::time::Duration;

/// Configuration for a [`SessionStore`](crate::SessionStore).
///
/// # Examples
///
/// ```
/// use lease_sessions::{KeyPair, SessionOptions, SessionStoreConfig};
/// use std::time::Duration;
///
/// let config = SessionStoreConfig::new(vec![KeyPair::signing(b"hash-key".to_vec())])
///     .with_options(SessionOptions::default().with_secure(true))
///     .with_operation_timeout(Some(Duration::from_secs(2)));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Key pairs, newest first. The first pair encodes; all pairs decode.
    pub key_pairs: Vec<KeyPair>,

    /// Default options copied into every new session.
    pub options: SessionOptions,

    /// Deadline for each store call; `None` waits indefinitely.
    ///
    /// Default: 5 seconds
    pub operation_timeout: Option<Duration>,

    /// Largest cookie value the identifier codec emits or accepts; zero
    /// means unlimited.
    ///
    /// Default: 4096
    pub max_cookie_length: usize,

    /// Treat a missing key on the delete path as success.
    ///
    /// Default: `false` (deleting an absent session is `NotFound`)
    pub idempotent_delete: bool,
}

impl SessionStoreConfig {
    /// Create configuration with the given key pairs and defaults for the rest.
    ///
    /// # Arguments
    ///
    /// * `key_pairs` - Signing/encryption keys, newest first
    #[must_use]
    pub fn new(key_pairs: Vec<KeyPair>) -> Self {
        Self {
            key_pairs,
            options: SessionOptions::default(),
            operation_timeout: Some(DEFAULT_OPERATION_TIMEOUT),
            max_cookie_length: DEFAULT_MAX_ENCODED_LENGTH,
            idempotent_delete: false,
        }
    }

    /// Set default session options.
    #[must_use]
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the per-call store deadline.
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the maximum cookie value length.
    #[must_use]
    pub const fn with_max_cookie_length(mut self, max_length: usize) -> Self {
        self.max_cookie_length = max_length;
        self
    }

    /// Treat deleting an absent session as success.
    #[must_use]
    pub const fn with_idempotent_delete(mut self, idempotent: bool) -> Self {
        self.idempotent_delete = idempotent;
        self
    }

    /// Check the configuration before building codecs from it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` if:
    /// - No key pair is given
    /// - A hash key is empty
    /// - A block key is not 16 or 32 bytes
    /// - The operation timeout is zero
    pub fn validate(&self) -> Result<()> {
        KeyRing::new(&self.key_pairs)?;

        if self.operation_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(SessionError::Config(
                "Operation timeout must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionStoreConfig::new(vec![KeyPair::signing(b"k".to_vec())]);
        assert_eq!(config.operation_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.max_cookie_length, 4096);
        assert!(!config.idempotent_delete);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_missing_keys() {
        let config = SessionStoreConfig::new(Vec::new());
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_block_key() {
        let config = SessionStoreConfig::new(vec![KeyPair::encrypting(
            b"hash".to_vec(),
            vec![0_u8; 24],
        )]);
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_rejects_empty_hash_key() {
        let config = SessionStoreConfig::new(vec![KeyPair::signing(Vec::new())]);
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = SessionStoreConfig::new(vec![KeyPair::signing(b"k".to_vec())])
            .with_operation_timeout(Some(Duration::ZERO));
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));
    }
}
