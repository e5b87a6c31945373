//! In-memory session store
//!
//! This is primarily for development, tests and single-process deployments.
//! Sessions live only as long as the process.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::SessionStore;
use crate::config::DEFAULT_CLEANUP_INTERVAL;
use crate::error::{Result, SessionError};
use crate::scheduler::{schedule, ScheduledTask};
use crate::session::SessionData;

type Sessions = Arc<RwLock<HashMap<String, StoredSession>>>;

struct StoredSession {
    data: SessionData,
    /// `None` when `now + ttl` is past what an `Instant` can hold
    expires_at: Option<Instant>,
}

impl StoredSession {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

fn expiry(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

fn evict_expired(sessions: &RwLock<HashMap<String, StoredSession>>) -> usize {
    let mut sessions = sessions.write();
    let now = Instant::now();
    let before = sessions.len();
    sessions.retain(|_, stored| !stored.is_expired(now));
    before - sessions.len()
}

/// In-memory session store
///
/// Whole session maps are cached by id. Maps are never edited in place: a
/// session works on its own copy and [`set_session`](SessionStore::set_session)
/// swaps in the new map. Per-key operations are not supported.
///
/// Expired sessions are dropped when read, and by a cleanup task that runs
/// every minute when the store is created inside a tokio runtime.
///
/// Warning: sessions are lost on restart and are not shared across
/// server instances.
pub struct MemoryStore {
    sessions: Sessions,
    cleanup: Arc<Mutex<Option<ScheduledTask>>>,
}

impl MemoryStore {
    /// Create a new memory store
    pub fn new() -> Self {
        let store = Self::unscheduled();
        if tokio::runtime::Handle::try_current().is_ok() {
            store.start_cleanup(DEFAULT_CLEANUP_INTERVAL);
        } else {
            tracing::debug!("memory session store created outside a runtime, expired sessions are evicted on read only");
        }
        store
    }

    /// Create a store whose cleanup task runs every `interval`.
    ///
    /// Fails on a zero interval or outside a tokio runtime.
    pub fn with_cleanup_interval(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(SessionError::Config(
                "memory store cleanup interval must be non-zero".to_string(),
            ));
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SessionError::Config(
                "memory store cleanup needs a tokio runtime".to_string(),
            ));
        }
        let store = Self::unscheduled();
        store.start_cleanup(interval);
        Ok(store)
    }

    fn unscheduled() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            cleanup: Arc::new(Mutex::new(None)),
        }
    }

    fn start_cleanup(&self, interval: Duration) {
        let sessions = Arc::clone(&self.sessions);
        let task = schedule("session-memory-cleanup", interval, move |_| {
            let sessions = Arc::clone(&sessions);
            async move {
                let evicted = evict_expired(&sessions);
                if evicted > 0 {
                    tracing::debug!(evicted, "evicted expired sessions");
                }
            }
        });
        *self.cleanup.lock() = Some(task);
    }

    /// Clean up expired sessions, returning how many were evicted
    pub fn cleanup_expired(&self) -> usize {
        evict_expired(&self.sessions)
    }

    /// Number of cached sessions, expired ones included
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Clones share the sessions and the cleanup task.
impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            cleanup: Arc::clone(&self.cleanup),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn remove_all(&self, id: &str) -> Result<()> {
        self.sessions.write().remove(id);
        Ok(())
    }

    async fn get_session(&self, id: &str, _ttl: Duration) -> Result<Option<SessionData>> {
        let now = Instant::now();
        {
            let sessions = self.sessions.read();
            match sessions.get(id) {
                Some(stored) if !stored.is_expired(now) => return Ok(Some(stored.data.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        let mut sessions = self.sessions.write();
        // may have been rewritten since the read lock was released
        if sessions.get(id).map_or(false, |stored| stored.is_expired(now)) {
            sessions.remove(id);
        }
        Ok(None)
    }

    async fn set_session(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<()> {
        let stored = StoredSession {
            data: data.clone(),
            expires_at: expiry(ttl),
        };
        self.sessions.write().insert(id.to_string(), stored);
        Ok(())
    }

    async fn update_ttl(&self, id: &str, ttl: Duration) -> Result<()> {
        let mut sessions = self.sessions.write();
        if let Some(stored) = sessions.get_mut(id) {
            stored.expires_at = expiry(ttl);
        }
        Ok(())
    }

    async fn shutdown(&self) {
        let task = self.cleanup.lock().take();
        if let Some(task) = task {
            task.shutdown().await;
        }
    }
}
