//! Per-request session registry.
//!
//! Create one registry per inbound request. Repeated lookups of the same
//! session name within that request share one [`Session`], and
//! [`SessionRegistry::save_all`] persists every session touched.

use crate::error::{Result, SessionError};
use crate::providers::StoreClient;
use crate::state::Session;
use crate::store::SessionStore;
use http::{Request, Response};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Sessions looked up during one request, keyed by name.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Registered>,
}

#[derive(Debug)]
struct Registered {
    session: Session,
    error: Option<SessionError>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `name`, restoring it from `request` on first use.
    ///
    /// Later calls return the same session and replay the error of the
    /// first lookup, if any.
    pub async fn get<C: StoreClient, B>(
        &mut self,
        store: &SessionStore<C>,
        request: &Request<B>,
        name: &str,
    ) -> (&mut Session, Option<SessionError>) {
        let registered = match self.sessions.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let (session, error) = store.new_session(request, name).await.into_parts();
                entry.insert(Registered { session, error })
            }
        };
        (&mut registered.session, registered.error.clone())
    }

    /// Save every registered session, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns the first save error; sessions after it are not saved.
    pub async fn save_all<C: StoreClient, B>(
        &mut self,
        store: &SessionStore<C>,
        response: &mut Response<B>,
    ) -> Result<()> {
        for registered in self.sessions.values_mut() {
            store.save(response, &mut registered.session).await?;
        }
        Ok(())
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session has been looked up yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
