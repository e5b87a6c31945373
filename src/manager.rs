//! Session manager

use std::sync::Arc;
use std::time::Duration;

use crate::config::DEFAULT_TTL;
use crate::session::Session;
use crate::store::SessionStore;

/// Owns the session store and TTL, and hands out [`Session`]s.
///
/// Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct Manager {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl Manager {
    /// Create a manager over `store`
    pub fn new<S: SessionStore>(store: S, ttl: Duration) -> Self {
        Self::with_store(Arc::new(store), ttl)
    }

    /// Create a manager over a shared store
    pub fn with_store(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        store.set_ttl(ttl);
        Self { store, ttl }
    }

    /// Session bound to a client-supplied id; pass an empty id for a new session.
    ///
    /// Nothing is loaded until the session is used.
    pub fn new_session<S: Into<String>>(&self, id: S) -> Session {
        Session::new(self.clone(), id.into())
    }

    /// Session TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Change the TTL used by sessions created afterwards
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.store.set_ttl(ttl);
        self.ttl = ttl;
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Stop the store's background tasks
    pub async fn shutdown(&self) {
        self.store.shutdown().await;
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager").field("ttl", &self.ttl).finish()
    }
}

/// A manager over an in-memory store with the default TTL
impl Default for Manager {
    fn default() -> Self {
        Self::new(crate::store::MemoryStore::new(), DEFAULT_TTL)
    }
}
