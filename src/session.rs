//! Request-scoped session handle

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Result, SessionError};
use crate::id::new_id;
use crate::manager::Manager;

/// Session contents: string keys to arbitrary JSON values
pub type SessionData = HashMap<String, Value>;

/// Custom id generator, called with the manager's TTL
pub type IdFn = Box<dyn Fn(Duration) -> String + Send + Sync>;

/// Session of one request
///
/// Nothing is loaded until the first operation that needs the session, so
/// requests that never touch it cost nothing. Each operation first goes to
/// the store; when the store doesn't support it, the session works on its own
/// copy of the data and writes it back on [`close`](Session::close).
///
/// A session belongs to a single request and is not meant to be shared.
pub struct Session {
    /// Session ID; empty until minted
    id: String,

    /// Local copy of the data, for stores without per-key operations
    data: SessionData,

    /// Whether the session has been modified
    dirty: bool,

    /// Whether the session has been loaded
    start: bool,

    manager: Manager,

    id_fn: Option<IdFn>,
}

impl Session {
    /// Create an unloaded session bound to `id` (may be empty)
    pub(crate) fn new(manager: Manager, id: String) -> Self {
        Self {
            id,
            data: SessionData::new(),
            dirty: false,
            start: false,
            manager,
            id_fn: None,
        }
    }

    async fn init(&mut self) -> Result<()> {
        if self.start {
            return Ok(());
        }
        let ttl = self.manager.ttl();

        if !self.id.is_empty() {
            match self.manager.store().get_session(&self.id, ttl).await {
                Ok(Some(data)) => self.data = data,
                Ok(None) => {}
                Err(e) if e.is_disabled() => {}
                Err(e) => return Err(e),
            }
        }
        if self.id.is_empty() {
            self.id = self.mint_id().await?;
            tracing::debug!(session_id = %self.id, "created session");
        }

        self.start = true;
        Ok(())
    }

    /// Ask the store for an id, then the custom generator, then the default one.
    async fn mint_id(&self) -> Result<String> {
        let ttl = self.manager.ttl();
        match self.manager.store().new_id(ttl).await {
            Ok(id) if !id.is_empty() => return Ok(id),
            Ok(_) => {}
            Err(e) if e.is_disabled() => {}
            Err(e) => return Err(e),
        }
        if let Some(id_fn) = &self.id_fn {
            let id = id_fn(ttl);
            if !id.is_empty() {
                return Ok(id);
            }
        }
        Ok(new_id())
    }

    /// Get the session ID, creating the session if needed
    pub async fn id(&mut self) -> Result<String> {
        self.init().await?;
        Ok(self.id.clone())
    }

    /// The session ID as currently known, without loading anything
    pub fn current_id(&self) -> &str {
        &self.id
    }

    /// Use a specific id for a new session. Fails once the session is loaded.
    pub fn set_id<S: Into<String>>(&mut self, id: S) -> Result<()> {
        if self.start {
            return Err(SessionError::AlreadyStarted);
        }
        self.id = id.into();
        Ok(())
    }

    /// Use a custom id generator. Fails once the session is loaded.
    pub fn set_id_fn<F>(&mut self, f: F) -> Result<()>
    where
        F: Fn(Duration) -> String + Send + Sync + 'static,
    {
        if self.start {
            return Err(SessionError::AlreadyStarted);
        }
        self.id_fn = Some(Box::new(f));
        Ok(())
    }

    /// Get a raw value from the session
    pub async fn get_value(&mut self, key: &str) -> Result<Option<Value>> {
        self.init().await?;
        match self.manager.store().get(&self.id, key).await {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {}
            Err(e) if e.is_disabled() => {}
            Err(e) => return Err(e),
        }
        Ok(self.data.get(key).cloned())
    }

    /// Get a typed value from the session
    pub async fn get<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        match self.get_value(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Get a raw value, or `default` when the key is absent
    pub async fn get_or(&mut self, key: &str, default: Value) -> Result<Value> {
        Ok(self.get_value(key).await?.unwrap_or(default))
    }

    /// Check if a key exists in the session
    pub async fn contains(&mut self, key: &str) -> Result<bool> {
        Ok(self.get_value(key).await?.is_some())
    }

    /// Set a value in the session
    pub async fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.init().await?;
        let ttl = self.manager.ttl();
        match self.manager.store().set(&self.id, key, &value, ttl).await {
            Ok(()) => {}
            Err(e) if e.is_disabled() => {
                self.data.insert(key.to_string(), value);
            }
            Err(e) => return Err(e),
        }
        self.dirty = true;
        Ok(())
    }

    /// Set several values at once
    pub async fn set_map(&mut self, data: SessionData) -> Result<()> {
        self.init().await?;
        let ttl = self.manager.ttl();
        match self.manager.store().set_map(&self.id, &data, ttl).await {
            Ok(()) => {}
            Err(e) if e.is_disabled() => self.data.extend(data),
            Err(e) => return Err(e),
        }
        self.dirty = true;
        Ok(())
    }

    /// Remove values from the session
    pub async fn remove(&mut self, keys: &[&str]) -> Result<()> {
        self.init().await?;
        match self.manager.store().remove(&self.id, keys).await {
            Ok(()) => {}
            Err(e) if e.is_disabled() => {
                for key in keys {
                    self.data.remove(*key);
                }
            }
            Err(e) => return Err(e),
        }
        self.dirty = true;
        Ok(())
    }

    /// Delete the stored session and clear all values
    pub async fn remove_all(&mut self) -> Result<()> {
        self.init().await?;
        match self.manager.store().remove_all(&self.id).await {
            Ok(()) => {}
            Err(e) if e.is_disabled() => {}
            Err(e) => return Err(e),
        }
        self.data.clear();
        self.dirty = true;
        Ok(())
    }

    /// Get a copy of all session values
    pub async fn data(&mut self) -> Result<SessionData> {
        self.init().await?;
        match self.manager.store().data(&self.id).await {
            Ok(data) => Ok(data),
            Err(e) if e.is_disabled() => Ok(self.data.clone()),
            Err(e) => Err(e),
        }
    }

    /// Number of values in the session
    pub async fn size(&mut self) -> Result<usize> {
        self.init().await?;
        match self.manager.store().get_size(&self.id).await {
            Ok(size) => Ok(size),
            Err(e) if e.is_disabled() => Ok(self.data.len()),
            Err(e) => Err(e),
        }
    }

    /// Move the session to a fresh id, returning it.
    ///
    /// The current values are written under the new id before the switch; the
    /// old session is deleted when `delete_old` is set. Use after login to
    /// avoid session fixation.
    pub async fn regenerate_id(&mut self, delete_old: bool) -> Result<String> {
        self.init().await?;
        let store = self.manager.store().clone();
        let ttl = self.manager.ttl();

        let new_id = self.mint_id().await?;
        let snapshot = self.data().await?;
        match store.set_map(&new_id, &snapshot, ttl).await {
            Ok(()) => {}
            Err(e) if e.is_disabled() => {}
            Err(e) => return Err(e),
        }
        store.set_session(&new_id, &snapshot, ttl).await?;
        if delete_old {
            store.remove_all(&self.id).await?;
        }

        tracing::debug!(old_id = %self.id, session_id = %new_id, "regenerated session id");
        self.id = new_id.clone();
        self.dirty = true;
        Ok(new_id)
    }

    /// Check if the session has been modified since it was loaded
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Check if the session has been loaded
    pub fn is_started(&self) -> bool {
        self.start
    }

    /// Persist the session at the end of a request.
    ///
    /// Modified sessions are written in full. Unmodified, non-empty sessions
    /// only have their TTL extended. Sessions never touched do nothing. On
    /// error the session stays dirty and a later `close` retries.
    pub async fn close(&mut self) -> Result<()> {
        if !self.start {
            return Ok(());
        }
        let ttl = self.manager.ttl();

        if self.dirty {
            self.manager
                .store()
                .set_session(&self.id, &self.data, ttl)
                .await?;
            self.dirty = false;
        } else if self.size().await? > 0 {
            self.manager.store().update_ttl(&self.id, ttl).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("data", &self.data)
            .field("dirty", &self.dirty)
            .field("start", &self.start)
            .finish()
    }
}
