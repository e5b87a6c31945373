//! Key-value session store keeping each session as one JSON value
//!
//! - Key: `prefix + session_id` (default prefix: "session:")
//! - Value: JSON serialized session map
//! - TTL: set with `SET ... EX` on write, refreshed with batched `EXPIRE`

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{ttl_secs, SessionStore};
use crate::coalescer::TtlMap;
use crate::config::KvStoreOptions;
use crate::error::{Result, SessionError};
use crate::kv::KvClient;
use crate::scheduler::{schedule, ScheduledTask};
use crate::session::SessionData;

struct Inner {
    client: Arc<dyn KvClient>,
    prefix: String,
    refresh_interval: Duration,
    pending: TtlMap,
}

impl Inner {
    /// Make a storage key from session ID
    fn make_key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    async fn refresh_pending(&self, token: Option<&CancellationToken>) -> usize {
        let mut refreshed = 0;
        loop {
            if token.map_or(false, |t| t.is_cancelled()) {
                break;
            }
            let Some((id, ttl)) = self.pending.pop_one() else {
                break;
            };
            // EXPIRE on a missing key is a no-op, which is fine
            match self.client.expire(&self.make_key(&id), ttl).await {
                Ok(_) => refreshed += 1,
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "failed to refresh session TTL");
                }
            }
        }
        refreshed
    }
}

/// Key-value session store holding whole sessions as JSON blobs
///
/// Works with any [`KvClient`]; with the `redis-store` feature a redis
/// `ConnectionManager` can be used directly.
///
/// # Example
///
/// ```rust,ignore
/// use salvo_session_store::KvBlobStore;
///
/// let client = redis::Client::open("redis://127.0.0.1/")?;
/// let conn = redis::aio::ConnectionManager::new(client).await?;
/// let store = KvBlobStore::new(conn)?;
/// ```
pub struct KvBlobStore {
    inner: Arc<Inner>,
    task: Mutex<Option<ScheduledTask>>,
}

impl KvBlobStore {
    /// Create a store with default options
    pub fn new<C: KvClient>(client: C) -> Result<Self> {
        Self::with_options(Arc::new(client), KvStoreOptions::default())
    }

    /// Create a store and start its TTL refresh task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_options(client: Arc<dyn KvClient>, options: KvStoreOptions) -> Result<Self> {
        if options.refresh_interval.is_zero() {
            return Err(SessionError::Config(
                "refresh interval must be non-zero".to_string(),
            ));
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SessionError::Config(
                "kv store must be created inside a tokio runtime".to_string(),
            ));
        }

        let inner = Arc::new(Inner {
            client,
            prefix: options.prefix,
            refresh_interval: options.refresh_interval,
            pending: TtlMap::new(),
        });
        let task = {
            let inner = Arc::clone(&inner);
            schedule("session-kv-refresh", options.refresh_interval, move |token| {
                let inner = Arc::clone(&inner);
                async move {
                    inner.refresh_pending(Some(&token)).await;
                }
            })
        };

        Ok(Self {
            inner,
            task: Mutex::new(Some(task)),
        })
    }

    /// Key prefix of this store
    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Number of ids waiting for a TTL refresh
    pub fn pending_ttl_refreshes(&self) -> usize {
        self.inner.pending.len()
    }

    /// Run one TTL refresh drain now, returning how many EXPIREs were issued
    pub async fn flush_ttl_refresh(&self) -> usize {
        self.inner.refresh_pending(None).await
    }
}

#[async_trait]
impl SessionStore for KvBlobStore {
    async fn remove_all(&self, id: &str) -> Result<()> {
        self.inner.pending.remove(id);
        self.inner.client.del(&self.inner.make_key(id)).await
    }

    async fn get_session(&self, id: &str, _ttl: Duration) -> Result<Option<SessionData>> {
        let key = self.inner.make_key(id);
        match self.inner.client.get(&key).await? {
            Some(json) if !json.is_empty() => Ok(Some(serde_json::from_str(&json)?)),
            _ => Ok(None),
        }
    }

    async fn set_session(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<()> {
        let key = self.inner.make_key(id);
        let json = serde_json::to_string(data)?;
        self.inner.client.set_ex(&key, &json, ttl_secs(ttl)).await?;
        self.inner.pending.remove(id);
        Ok(())
    }

    async fn update_ttl(&self, id: &str, ttl: Duration) -> Result<()> {
        if ttl >= self.inner.refresh_interval {
            self.inner.pending.add(id, ttl_secs(ttl));
        }
        Ok(())
    }

    async fn shutdown(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.shutdown().await;
        }
    }
}
