//! Codec traits.

use crate::error::Result;
use crate::state::SessionValues;

/// Signs and optionally encrypts the session identifier carried in the
/// client's cookie.
///
/// Implementations are pure transforms apart from consuming entropy and
/// reading the clock, and must be safe to share across request tasks.
pub trait IdentifierCodec: Send + Sync {
    /// Encode `id` for the cookie named `name`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Encoding` if the value cannot be produced
    /// (for example, it exceeds the maximum cookie length).
    fn encode_id(&self, name: &str, id: &str) -> Result<String>;

    /// Recover the identifier from a cookie value.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Authentication` if no key verifies the value
    /// or the value is malformed.
    fn decode_id(&self, name: &str, value: &str) -> Result<String>;

    /// Propagate a new max age to codecs that enforce one.
    ///
    /// The default implementation ignores it.
    fn set_max_age(&self, _seconds: i64) {}
}

/// Authenticates and optionally encrypts session values for storage.
pub trait ValueCodec: Send + Sync {
    /// Encode the payload of the session named `name`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Encoding` on serialization failure.
    fn encode_values(&self, name: &str, values: &SessionValues) -> Result<String>;

    /// Decode a stored payload.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Authentication` on tamper or corruption and
    /// `SessionError::Encoding` if the verified payload does not
    /// deserialize.
    fn decode_values(&self, name: &str, encoded: &str) -> Result<SessionValues>;

    /// Propagate a new max age to codecs that enforce one.
    fn set_max_age(&self, _seconds: i64) {}
}
