//! Session store constants.

use std::time::Duration;

/// Default namespace under which session keys are stored (`{prefix}/{id}`).
pub const DEFAULT_KEY_PREFIX: &str = "/sessions";

/// Default session lifetime: 30 days, in seconds.
pub const DEFAULT_MAX_AGE_SECS: i64 = 86_400 * 30;

/// Default cookie path.
pub const DEFAULT_COOKIE_PATH: &str = "/";

/// Number of random bytes in a generated session identifier.
pub const SESSION_ID_BYTES: usize = 32;

/// Largest encoded value a codec will produce or accept.
///
/// Browsers cap a cookie at roughly 4 KiB.
pub const DEFAULT_MAX_ENCODED_LENGTH: usize = 4096;

/// Extra lease seconds granted beyond the session max age.
pub const LEASE_GRACE_SECS: i64 = 1;

/// Deadline applied to each backing store call.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_max_age_is_thirty_days() {
        assert_eq!(DEFAULT_MAX_AGE_SECS, 2_592_000);
    }

    #[test]
    fn test_default_prefix_has_no_trailing_slash() {
        assert!(!DEFAULT_KEY_PREFIX.ends_with('/'));
    }
}
