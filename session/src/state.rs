//! Session state types.
//!
//! A [`Session`] is the in-memory view of one named session for one
//! request. It is created on every lookup, persisted only by
//! [`SessionStore::save`](crate::SessionStore::save).

use crate::constants::{DEFAULT_COOKIE_PATH, DEFAULT_MAX_AGE_SECS};
use crate::error::{Result, SessionError};
use cookie::SameSite;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

/// The session payload: string keys to arbitrary serializable values.
pub type SessionValues = HashMap<String, serde_json::Value>;

/// Cookie attributes and lifetime for a session.
///
/// `max_age` is in seconds. Zero or negative means "delete on save".
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Cookie `Path` attribute.
    pub path: String,

    /// Cookie `Domain` attribute.
    pub domain: Option<String>,

    /// Lifetime in seconds; `<= 0` deletes the session on save.
    pub max_age: i64,

    /// Cookie `Secure` flag.
    pub secure: bool,

    /// Cookie `HttpOnly` flag.
    pub http_only: bool,

    /// Cookie `SameSite` policy; `None` omits the attribute.
    pub same_site: Option<SameSite>,
}

impl SessionOptions {
    /// Set the cookie path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the cookie domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the lifetime in seconds.
    #[must_use]
    pub const fn with_max_age(mut self, max_age: i64) -> Self {
        self.max_age = max_age;
        self
    }

    /// Set the `Secure` flag.
    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the `HttpOnly` flag.
    #[must_use]
    pub const fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Set the `SameSite` policy.
    #[must_use]
    pub const fn with_same_site(mut self, same_site: Option<SameSite>) -> Self {
        self.same_site = same_site;
        self
    }

    /// Whether saving with these options deletes the session.
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        self.max_age <= 0
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_COOKIE_PATH.to_string(),
            domain: None,
            max_age: DEFAULT_MAX_AGE_SECS,
            secure: false,
            http_only: true,
            same_site: Some(SameSite::Lax),
        }
    }
}

/// A named bag of values tied to one client.
///
/// # Examples
///
/// ```
/// use lease_sessions::{Session, SessionOptions};
///
/// let mut session = Session::new("_session", SessionOptions::default());
/// assert!(session.is_new());
/// assert!(session.id().is_empty());
///
/// session.insert("foo", "bar").unwrap();
/// assert_eq!(session.get::<String>("foo").unwrap().as_deref(), Some("bar"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: String,
    name: String,
    values: SessionValues,
    is_new: bool,
    options: SessionOptions,
}

impl Session {
    /// Create an empty, unsaved session.
    #[must_use]
    pub fn new(name: impl Into<String>, options: SessionOptions) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            values: SessionValues::new(),
            is_new: true,
            options,
        }
    }

    /// Session identifier; empty until the first save.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cookie name this session is tracked under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` until the session was loaded from, or saved to, the store.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.is_new
    }

    /// Per-session options.
    #[must_use]
    pub const fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Mutable per-session options.
    ///
    /// Set `max_age` to zero or below to delete the session on save.
    pub fn options_mut(&mut self) -> &mut SessionOptions {
        &mut self.options
    }

    /// Raw payload.
    #[must_use]
    pub const fn values(&self) -> &SessionValues {
        &self.values
    }

    /// Mutable raw payload.
    pub fn values_mut(&mut self) -> &mut SessionValues {
        &mut self.values
    }

    /// Read a typed value.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Encoding` if the stored value does not
    /// deserialize into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.values
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|e| {
                    SessionError::Encoding(format!("Failed to decode value for {key}: {e}"))
                })
            })
            .transpose()
    }

    /// Store a typed value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Encoding` if `value` cannot be serialized.
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|e| {
            SessionError::Encoding(format!("Failed to encode value for {key}: {e}"))
        })?;
        self.values.insert(key, value);
        Ok(())
    }

    /// Remove a value.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.values.remove(key)
    }

    /// Whether a value is set for `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Drop every value. The session itself stays bound to its id.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Bind to an identifier, either recovered from a cookie or freshly
    /// generated on first save.
    pub(crate) fn bind(&mut self, id: String) {
        self.id = id;
    }

    /// Populate from the store and leave the `Unbound` state.
    pub(crate) fn mark_loaded(&mut self, values: SessionValues) {
        self.values = values;
        self.is_new = false;
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.is_new = false;
    }

    /// Drop a binding that failed to load; the session reads as fresh again.
    pub(crate) fn unbind(&mut self) {
        self.id.clear();
        self.values.clear();
        self.is_new = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = SessionOptions::default();
        assert_eq!(options.path, "/");
        assert_eq!(options.max_age, 86_400 * 30);
        assert!(options.http_only);
        assert!(!options.secure);
        assert!(!options.is_expired());
    }

    #[test]
    fn test_non_positive_max_age_is_expired() {
        assert!(SessionOptions::default().with_max_age(0).is_expired());
        assert!(SessionOptions::default().with_max_age(-1).is_expired());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_typed_values() {
        let mut session = Session::new("s", SessionOptions::default());
        session.insert("count", 3_u32).unwrap();
        session.insert("tags", vec!["a", "b"]).unwrap();

        assert_eq!(session.get::<u32>("count").unwrap(), Some(3));
        assert_eq!(
            session.get::<Vec<String>>("tags").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(session.get::<u32>("missing").unwrap(), None);
        assert!(matches!(
            session.get::<u32>("tags"),
            Err(SessionError::Encoding(_))
        ));
    }

    #[test]
    fn test_unbind_resets_to_fresh() {
        let mut session = Session::new("s", SessionOptions::default());
        session.bind("abc".to_string());
        session.mark_loaded(SessionValues::from([(
            "k".to_string(),
            serde_json::Value::Bool(true),
        )]));
        assert!(!session.is_new());

        session.unbind();

        assert!(session.is_new());
        assert!(session.id().is_empty());
        assert!(session.values().is_empty());
    }
}
