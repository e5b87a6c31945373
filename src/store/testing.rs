//! Store wrapper recording the whole-session calls made against it.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::SessionStore;
use crate::error::{Result, SessionError};
use crate::session::SessionData;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    NewId,
    GetSession(String, Duration),
    SetSession(String, SessionData),
    UpdateTtl(String, Duration),
    RemoveAll(String),
}

pub(crate) struct RecordingStore<S> {
    inner: S,
    calls: Mutex<Vec<Call>>,
    fail_writes: AtomicBool,
}

impl<S: SessionStore> RecordingStore<S> {
    pub(crate) fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    /// Make `set_session` fail until turned off again
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl<S: SessionStore> SessionStore for RecordingStore<S> {
    async fn new_id(&self, ttl: Duration) -> Result<String> {
        self.record(Call::NewId);
        self.inner.new_id(ttl).await
    }

    async fn get(&self, id: &str, key: &str) -> Result<Option<Value>> {
        self.inner.get(id, key).await
    }

    async fn set(&self, id: &str, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        self.inner.set(id, key, value, ttl).await
    }

    async fn set_map(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<()> {
        self.inner.set_map(id, data, ttl).await
    }

    async fn remove(&self, id: &str, keys: &[&str]) -> Result<()> {
        self.inner.remove(id, keys).await
    }

    async fn data(&self, id: &str) -> Result<SessionData> {
        self.inner.data(id).await
    }

    async fn get_size(&self, id: &str) -> Result<usize> {
        self.inner.get_size(id).await
    }

    async fn remove_all(&self, id: &str) -> Result<()> {
        self.record(Call::RemoveAll(id.to_string()));
        self.inner.remove_all(id).await
    }

    async fn get_session(&self, id: &str, ttl: Duration) -> Result<Option<SessionData>> {
        self.record(Call::GetSession(id.to_string(), ttl));
        self.inner.get_session(id, ttl).await
    }

    async fn set_session(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Store("write refused".to_string()));
        }
        self.record(Call::SetSession(id.to_string(), data.clone()));
        self.inner.set_session(id, data, ttl).await
    }

    async fn update_ttl(&self, id: &str, ttl: Duration) -> Result<()> {
        self.record(Call::UpdateTtl(id.to_string(), ttl));
        self.inner.update_ttl(id, ttl).await
    }

    fn set_ttl(&self, ttl: Duration) {
        self.inner.set_ttl(ttl)
    }

    async fn shutdown(&self) {
        self.inner.shutdown().await
    }
}
