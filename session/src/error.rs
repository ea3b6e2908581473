//! Error types for session lifecycle operations.

use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Error taxonomy for the session store.
///
/// Errors are `Clone` so that a per-request registry can hand the same
/// load failure back to every caller that asks for the same session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A cookie or stored payload failed signature or decryption checks.
    ///
    /// Covers tampering, values signed with an unknown key, expired
    /// timestamps and malformed encodings.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The key is absent from the backing store.
    ///
    /// Raised for expired leases, keys never written and keys already
    /// deleted.
    #[error("Key {key} not found in store")]
    NotFound {
        /// Fully qualified store key
        key: String,
    },

    /// Connectivity, timeout or backend failure talking to the store.
    #[error("Store error: {0}")]
    Store(String),

    /// The session payload could not be serialized or deserialized.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid construction-time configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Returns `true` if the backing store reported the key as absent.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lease_sessions::SessionError;
    /// let err = SessionError::NotFound { key: "/sessions/abc".into() };
    /// assert!(err.is_not_found());
    /// ```
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if a cookie or payload failed verification.
    ///
    /// These are worth auditing: they indicate tampering, rotated-out keys
    /// or a cookie that outlived the codec's max age.
    #[must_use]
    pub const fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Returns `true` if the failure came from talking to the store.
    ///
    /// Store failures are never retried internally.
    #[must_use]
    pub const fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_predicates() {
        let not_found = SessionError::NotFound {
            key: "/sessions/x".to_string(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_store_failure());

        let auth = SessionError::Authentication("mac mismatch".to_string());
        assert!(auth.is_authentication_failure());
        assert!(!auth.is_not_found());

        assert!(SessionError::Store("connection refused".to_string()).is_store_failure());
    }

    #[test]
    fn test_not_found_message_names_key() {
        let err = SessionError::NotFound {
            key: "/sessions/abc".to_string(),
        };
        assert_eq!(err.to_string(), "Key /sessions/abc not found in store");
    }
}
