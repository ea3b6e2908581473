//! Utility functions for the session store.

use crate::constants::SESSION_ID_BYTES;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;

/// Generate a new session identifier.
///
/// 32 bytes from the OS CSPRNG, base64url-encoded without padding. The
/// alphabet contains no `/`, so the id is safe as the last segment of a
/// `{prefix}/{id}` store key.
///
/// # Examples
///
/// ```
/// use lease_sessions::utils::generate_session_id;
///
/// let id = generate_session_id();
/// assert_eq!(id.len(), 43);
/// assert!(!id.contains('/') && !id.ends_with('='));
/// ```
#[must_use]
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<String> = (0..256).map(|_| generate_session_id()).collect();
        assert_eq!(ids.len(), 256);
    }

    #[test]
    fn test_id_alphabet_is_url_safe() {
        let id = generate_session_id();
        assert!(id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
