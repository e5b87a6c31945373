//! Session store trait

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Result, SessionError};
use crate::session::SessionData;

/// Trait for session storage backends
///
/// Backends differ in what they can do: some keep every key separately, some
/// only store the whole map, some mint their own ids. Every optional operation
/// has a default that returns [`SessionError::Disabled`]; a backend overrides
/// only what it supports and the [`Session`](crate::Session) layer falls back to
/// its in-memory copy for the rest.
///
/// Dropping a returned future abandons the operation.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Mint a new session id.
    async fn new_id(&self, _ttl: Duration) -> Result<String> {
        Err(SessionError::Disabled)
    }

    /// Read a single key.
    async fn get(&self, _id: &str, _key: &str) -> Result<Option<Value>> {
        Err(SessionError::Disabled)
    }

    /// Write a single key.
    async fn set(&self, _id: &str, _key: &str, _value: &Value, _ttl: Duration) -> Result<()> {
        Err(SessionError::Disabled)
    }

    /// Write several keys at once.
    async fn set_map(&self, _id: &str, _data: &SessionData, _ttl: Duration) -> Result<()> {
        Err(SessionError::Disabled)
    }

    /// Delete keys.
    async fn remove(&self, _id: &str, _keys: &[&str]) -> Result<()> {
        Err(SessionError::Disabled)
    }

    /// All keys of a session.
    async fn data(&self, _id: &str) -> Result<SessionData> {
        Err(SessionError::Disabled)
    }

    /// Number of keys in a session.
    async fn get_size(&self, _id: &str) -> Result<usize> {
        Err(SessionError::Disabled)
    }

    /// Delete the whole session.
    async fn remove_all(&self, id: &str) -> Result<()>;

    /// Load a session when it is first used.
    ///
    /// `None` means there is no such session (or it expired). An empty map
    /// from a per-key backend only signals that the session exists.
    async fn get_session(&self, id: &str, ttl: Duration) -> Result<Option<SessionData>>;

    /// Persist the whole map of a modified session.
    async fn set_session(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<()>;

    /// Extend the lifetime of an unmodified session.
    ///
    /// Backends may defer this to a background flush.
    async fn update_ttl(&self, id: &str, ttl: Duration) -> Result<()>;

    /// Told the session TTL by the [`Manager`](crate::Manager) that owns the
    /// store, and again whenever it changes. Stores that expire sessions on
    /// their own schedule use it.
    fn set_ttl(&self, _ttl: Duration) {}

    /// Stop background tasks. Called by [`Manager::shutdown`](crate::Manager::shutdown).
    async fn shutdown(&self) {}
}
