//! Capability traits injected into the session store.
//!
//! Each trait has a production implementation and can be swapped for an
//! in-memory or failing fake in tests:
//!
//! - **IdentifierCodec** - cookie value ⇄ session id
//! - **ValueCodec** - session values ⇄ stored payload
//! - **StoreClient** - lease-backed key-value persistence

pub mod codec;
pub mod store_client;

pub use codec::{IdentifierCodec, ValueCodec};
pub use store_client::StoreClient;
