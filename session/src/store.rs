//! Session lifecycle orchestration.
//!
//! [`SessionStore`] ties the cookie codec, the payload codec and a
//! [`StoreClient`] together:
//!
//! ```text
//! Cookie ──decode_id──▶ id ──load──▶ payload ──decode_values──▶ Session
//! Session ──encode_values──▶ payload ──save (lease max_age+1)──▶ store
//!         ──encode_id──▶ Set-Cookie
//! ```
//!
//! # Example
//!
//! ```no_run
//! use http::{Request, Response};
//! use lease_sessions::stores::RedisStoreClient;
//! use lease_sessions::{KeyPair, SessionStore, SessionStoreConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RedisStoreClient::new("redis://127.0.0.1:6379", "/sessions").await?;
//! let config = SessionStoreConfig::new(vec![KeyPair::encrypting(
//!     b"a-very-secret-hash-key".to_vec(),
//!     [7_u8; 32].to_vec(),
//! )]);
//! let store = SessionStore::new(config, client)?;
//!
//! let request = Request::new(());
//! let mut session = store.new_session(&request, "_session").await.into_session();
//! session.insert("user_id", 42)?;
//!
//! let mut response = Response::new(());
//! store.save(&mut response, &mut session).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::SessionStoreConfig;
use crate::cookies::{build_cookie, read_cookie, write_cookie};
use crate::environment::{Clock, SystemClock};
use crate::error::{Result, SessionError};
use crate::providers::{IdentifierCodec, StoreClient, ValueCodec};
use crate::registry::SessionRegistry;
use crate::securecookie::KeyRing;
use crate::state::{Session, SessionOptions};
use crate::utils::generate_session_id;
use http::{Request, Response};
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a session lookup.
///
/// Always carries a usable session. When the cookie failed to decode or
/// its payload failed to load, the session is fresh and empty and the
/// failure is kept alongside it.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct SessionResult {
    session: Session,
    error: Option<SessionError>,
}

impl SessionResult {
    pub(crate) const fn ok(session: Session) -> Self {
        Self {
            session,
            error: None,
        }
    }

    pub(crate) const fn failed(session: Session, error: SessionError) -> Self {
        Self {
            session,
            error: Some(error),
        }
    }

    /// The session, loaded or fresh.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Why the session could not be restored, if it could not.
    #[must_use]
    pub const fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// Whether the lookup completed without error.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Split into the session and the optional error.
    #[must_use]
    pub fn into_parts(self) -> (Session, Option<SessionError>) {
        (self.session, self.error)
    }

    /// Keep the session, ignoring any error.
    #[must_use]
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Treat a failed lookup as an error.
    ///
    /// # Errors
    ///
    /// Returns the decode or load error, if there was one.
    pub fn into_result(self) -> Result<Session> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.session),
        }
    }
}

/// Session persistence backed by a lease-expiring key-value store.
///
/// Safe to share across request tasks; everything but the default max
/// age is read-only after construction.
pub struct SessionStore<C: StoreClient> {
    client: C,
    id_codec: Arc<dyn IdentifierCodec>,
    value_codec: Arc<dyn ValueCodec>,
    config: SessionStoreConfig,
    default_max_age: AtomicI64,
}

impl<C: StoreClient> SessionStore<C> {
    /// Build a store with key-ring codecs over `config.key_pairs`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` if the configuration is invalid.
    pub fn new(config: SessionStoreConfig, client: C) -> Result<Self> {
        Self::with_clock(config, client, Arc::new(SystemClock))
    }

    /// Like [`SessionStore::new`], with codecs reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` if the configuration is invalid.
    pub fn with_clock(config: SessionStoreConfig, client: C, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let id_codec = KeyRing::new(&config.key_pairs)?
            .with_clock(&clock)
            .with_max_length(config.max_cookie_length);
        // Stored payloads never travel in a header, so they are not capped.
        let value_codec = KeyRing::new(&config.key_pairs)?
            .with_clock(&clock)
            .with_max_length(0);

        id_codec.set_max_age(config.options.max_age);
        value_codec.set_max_age(config.options.max_age);

        Self::with_codecs(config, client, Arc::new(id_codec), Arc::new(value_codec))
    }

    /// Build a store around caller-supplied codecs.
    ///
    /// `config.key_pairs` is not used.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` if the operation timeout is zero.
    pub fn with_codecs(
        config: SessionStoreConfig,
        client: C,
        id_codec: Arc<dyn IdentifierCodec>,
        value_codec: Arc<dyn ValueCodec>,
    ) -> Result<Self> {
        if config.operation_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(SessionError::Config(
                "Operation timeout must be non-zero".to_string(),
            ));
        }

        tracing::debug!(
            key_prefix = %client.key_space().prefix(),
            max_age = config.options.max_age,
            "Session store configured"
        );

        Ok(Self {
            client,
            id_codec,
            value_codec,
            default_max_age: AtomicI64::new(config.options.max_age),
            config,
        })
    }

    /// The backing store client.
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Store configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionStoreConfig {
        &self.config
    }

    /// Options copied into each new session.
    #[must_use]
    pub fn default_options(&self) -> SessionOptions {
        self.config
            .options
            .clone()
            .with_max_age(self.default_max_age.load(Ordering::Relaxed))
    }

    /// Change the default max age for new sessions and the age limit both
    /// codecs enforce on decode.
    ///
    /// Sessions already handed out keep their options.
    pub fn set_max_age(&self, seconds: i64) {
        self.default_max_age.store(seconds, Ordering::Relaxed);
        self.id_codec.set_max_age(seconds);
        self.value_codec.set_max_age(seconds);
        tracing::info!(max_age = seconds, "Session max age changed");
    }

    /// Restore the session named `name` from the request's cookie.
    ///
    /// Never fails outright: on any decode or load failure the returned
    /// session is fresh and empty and the error rides along in the
    /// [`SessionResult`].
    pub async fn new_session<B>(&self, request: &Request<B>, name: &str) -> SessionResult {
        let mut session = Session::new(name, self.default_options());

        let Some(cookie_value) = read_cookie(request.headers(), name) else {
            return SessionResult::ok(session);
        };

        match self.restore(&mut session, &cookie_value).await {
            Ok(()) => {
                tracing::debug!(session_name = %name, "Session restored");
                SessionResult::ok(session)
            }
            Err(error) => {
                session.unbind();
                if error.is_authentication_failure() || error.is_store_failure() {
                    tracing::warn!(session_name = %name, error = %error, "Session restore failed");
                } else {
                    tracing::debug!(session_name = %name, error = %error, "Session restore failed");
                }
                SessionResult::failed(session, error)
            }
        }
    }

    /// Like [`SessionStore::new_session`], memoized in `registry` so every
    /// lookup of `name` within one request shares a session.
    pub async fn get<'r, B>(
        &self,
        registry: &'r mut SessionRegistry,
        request: &Request<B>,
        name: &str,
    ) -> (&'r mut Session, Option<SessionError>) {
        registry.get(self, request, name).await
    }

    /// Persist `session` and set its cookie on `response`.
    ///
    /// A session whose max age is zero or negative is deleted instead, and
    /// an expired cookie tells the client to drop it.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Encoding values or the cookie fails → `SessionError::Encoding`
    /// - The store call fails or times out → `SessionError::Store`
    /// - Deleting a session absent from the store → `SessionError::NotFound`
    ///   (unless idempotent deletes are configured)
    ///
    /// No cookie is written when an error is returned.
    pub async fn save<B>(&self, response: &mut Response<B>, session: &mut Session) -> Result<()> {
        if session.options().is_expired() {
            return self.delete(response, session).await;
        }

        if session.id().is_empty() {
            session.bind(generate_session_id());
        }

        let payload = self
            .value_codec
            .encode_values(session.name(), session.values())?;
        // Encoded up front so an oversized cookie fails before anything is written.
        let cookie_value = self.id_codec.encode_id(session.name(), session.id())?;
        let cookie = build_cookie(session.name(), &cookie_value, session.options());

        let max_age = session.options().max_age;
        self.with_deadline(self.client.save(session.id(), &payload, max_age))
            .await?;

        write_cookie(response.headers_mut(), &cookie)?;
        session.mark_persisted();

        tracing::info!(
            session_name = %session.name(),
            key_prefix = %self.client.key_space().prefix(),
            max_age = max_age,
            "Session persisted"
        );
        Ok(())
    }

    /// Remaining lease on the session's store key, or `None` if it has
    /// none (never saved, deleted or lapsed).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Store` if the store call fails or times out.
    pub async fn remaining_ttl(&self, session: &Session) -> Result<Option<Duration>> {
        if session.id().is_empty() {
            return Ok(None);
        }
        self.with_deadline(self.client.remaining_ttl(session.id()))
            .await
    }

    /// Release the backing store client. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Store` if the client fails to shut down.
    pub async fn close(&self) -> Result<()> {
        self.with_deadline(self.client.close()).await?;
        tracing::info!(key_prefix = %self.client.key_space().prefix(), "Session store closed");
        Ok(())
    }

    async fn restore(&self, session: &mut Session, cookie_value: &str) -> Result<()> {
        let id = self.id_codec.decode_id(session.name(), cookie_value)?;
        session.bind(id);

        let payload = self.with_deadline(self.client.load(session.id())).await?;
        let values = self.value_codec.decode_values(session.name(), &payload)?;
        session.mark_loaded(values);
        Ok(())
    }

    async fn delete<B>(&self, response: &mut Response<B>, session: &Session) -> Result<()> {
        match self.with_deadline(self.client.delete(session.id())).await {
            Ok(()) => {}
            Err(error) if error.is_not_found() && self.config.idempotent_delete => {
                tracing::debug!(
                    session_name = %session.name(),
                    "Session already absent from store"
                );
            }
            Err(error) => return Err(error),
        }

        let cookie = build_cookie(session.name(), "", session.options());
        write_cookie(response.headers_mut(), &cookie)?;

        tracing::info!(
            session_name = %session.name(),
            key_prefix = %self.client.key_space().prefix(),
            "Session deleted"
        );
        Ok(())
    }

    /// Run a store call under the configured deadline. Dropping the
    /// returned future cancels the call.
    async fn with_deadline<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        let Some(limit) = self.config.operation_timeout else {
            return operation.await;
        };

        tokio::time::timeout(limit, operation).await.map_err(|_| {
            SessionError::Store(format!(
                "Store call exceeded {}ms deadline",
                limit.as_millis()
            ))
        })?
    }
}

impl<C: StoreClient + std::fmt::Debug> std::fmt::Debug for SessionStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("client", &self.client)
            .field("config", &self.config)
            .field("default_max_age", &self.default_max_age.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
