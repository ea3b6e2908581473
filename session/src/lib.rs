//! # Lease Sessions
//!
//! HTTP session persistence on a lease-expiring key-value store.
//!
//! ## Features
//!
//! - **Opaque cookies**: the cookie carries only a signed (and optionally
//!   encrypted) session id
//! - **Server-side values**: session values live in the store, sealed with
//!   the same keys
//! - **Leases**: every save renews a TTL of `max_age + 1` seconds; the store
//!   expires abandoned sessions on its own
//! - **Key rotation**: encode with the newest key pair, decode with any
//! - **Testable**: in-memory store client and a fixed clock for tests
//!
//! ## Architecture
//!
//! ```text
//! Request ─▶ SessionStore::new_session ─▶ IdentifierCodec ─▶ StoreClient::load ─▶ ValueCodec
//! Response ◀─ SessionStore::save ◀─ IdentifierCodec ◀─ StoreClient::save ◀─ ValueCodec
//! ```
//!
//! ## Example
//!
//! ```
//! use http::header::{COOKIE, SET_COOKIE};
//! use http::{Request, Response};
//! use lease_sessions::stores::MemoryStoreClient;
//! use lease_sessions::{KeyPair, SessionStore, SessionStoreConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> lease_sessions::Result<()> {
//! let config = SessionStoreConfig::new(vec![KeyPair::signing(b"hash-key".to_vec())]);
//! let store = SessionStore::new(config, MemoryStoreClient::new())?;
//!
//! // First request: no cookie, fresh session.
//! let mut session = store.new_session(&Request::new(()), "_session").await.into_result()?;
//! session.insert("foo", "bar")?;
//!
//! let mut response = Response::new(());
//! store.save(&mut response, &mut session).await?;
//!
//! // Second request carries the cookie back.
//! let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
//! let cookie = set_cookie.split(';').next().unwrap();
//! let request = Request::builder().header(COOKIE, cookie).body(()).unwrap();
//!
//! let restored = store.new_session(&request, "_session").await.into_result()?;
//! assert!(!restored.is_new());
//! assert_eq!(restored.get::<String>("foo")?.as_deref(), Some("bar"));
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod config;
pub mod constants;
pub mod environment;
pub mod error;
pub mod providers;
pub mod registry;
pub mod securecookie;
pub mod state;
pub mod store;
pub mod stores;
pub mod utils;

mod cookies;

// Test utilities
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-exports
pub use config::SessionStoreConfig;
pub use error::{Result, SessionError};
pub use registry::SessionRegistry;
pub use securecookie::{KeyPair, KeyRing, SecureCookie};
pub use state::{Session, SessionOptions, SessionValues};
pub use store::{SessionResult, SessionStore};
pub use stores::{MemoryStoreClient, RedisStoreClient};
#[cfg(feature = "etcd")]
pub use stores::EtcdStoreClient;
