//! File session store
//!
//! One file per session, named `<id>.session`:
//!
//! ```text
//! offset 0 : u64 big-endian, milliseconds since epoch of the last write
//! offset 8 : JSON of the session map, AES-256-CBC encrypted if a key is set
//! ```
//!
//! The header timestamp, not the file mtime, decides expiry. Reads of an
//! expired session return `None`; the file itself is removed by the sweep.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::SessionStore;
use crate::coalescer::IdSet;
use crate::config::{FileStoreOptions, DEFAULT_TTL};
use crate::crypto;
use crate::error::{Result, SessionError};
use crate::id::is_valid_id;
use crate::scheduler::{schedule, ScheduledTask};
use crate::session::SessionData;

const FILE_EXT: &str = "session";
const HEADER_LEN: usize = 8;

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

fn is_expired(stamp: u64, ttl: Duration, now: u64) -> bool {
    stamp.saturating_add(ttl_millis(ttl)) < now
}

struct Inner {
    path: PathBuf,
    /// TTL used by the sweep, in milliseconds
    sweep_ttl_ms: AtomicU64,
    crypto_key: Option<[u8; crypto::KEY_LEN]>,
    refresh_interval: Duration,
    pending: IdSet,
}

impl Inner {
    fn session_path(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_id(id) {
            return Err(SessionError::InvalidSessionId(id.to_string()));
        }
        Ok(self.path.join(format!("{}.{}", id, FILE_EXT)))
    }

    fn encode(&self, data: &SessionData) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(data)?;
        let payload = match &self.crypto_key {
            Some(key) => crypto::encrypt(&json, key),
            None => json,
        };

        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(&now_millis().to_be_bytes());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    fn decode(&self, payload: &[u8]) -> Result<SessionData> {
        if payload.is_empty() {
            return Ok(SessionData::new());
        }
        let json = match &self.crypto_key {
            Some(key) => crypto::decrypt(payload, key)?,
            None => payload.to_vec(),
        };
        Ok(serde_json::from_slice(&json)?)
    }

    /// Overwrite the header of an existing session file with the current time.
    async fn touch(&self, id: &str) -> Result<()> {
        let path = self.session_path(id)?;
        let mut file = tokio::fs::OpenOptions::new().write(true).open(&path).await?;
        file.write_all(&now_millis().to_be_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Drain pending refreshes, stopping at the next id once `token` fires.
    async fn refresh_pending(&self, token: Option<&CancellationToken>) -> usize {
        let mut refreshed = 0;
        loop {
            if token.map_or(false, |t| t.is_cancelled()) {
                break;
            }
            let Some((id, ())) = self.pending.pop_one() else {
                break;
            };
            match self.touch(&id).await {
                Ok(()) => refreshed += 1,
                Err(SessionError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(session_id = %id, "session file gone before TTL refresh");
                }
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "failed to refresh session TTL");
                }
            }
        }
        refreshed
    }

    async fn read_stamp(path: &Path) -> std::io::Result<Option<u64>> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut header = [0u8; HEADER_LEN];
        match file.read_exact(&mut header).await {
            Ok(_) => Ok(Some(u64::from_be_bytes(header))),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn sweep_ttl(&self) -> Duration {
        Duration::from_millis(self.sweep_ttl_ms.load(Ordering::Relaxed))
    }

    /// Keep the sweep from deleting a session a caller still reads with `ttl`.
    fn note_ttl(&self, ttl: Duration) {
        self.sweep_ttl_ms.fetch_max(ttl_millis(ttl), Ordering::Relaxed);
    }

    /// Remove session files whose header is older than the TTL.
    async fn sweep(&self, token: Option<&CancellationToken>) -> usize {
        let ttl = self.sweep_ttl();
        let mut entries = match tokio::fs::read_dir(&self.path).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to scan session directory");
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            if token.map_or(false, |t| t.is_cancelled()) {
                break;
            }
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read session directory entry");
                    break;
                }
            };
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXT) {
                continue;
            }

            let stamp = match Self::read_stamp(&path).await {
                Ok(Some(stamp)) => stamp,
                // being rewritten, or not ours
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read session file header");
                    continue;
                }
            };
            if !is_expired(stamp, ttl, now_millis()) {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "removed expired session file");
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove expired session file");
                }
            }
        }
        removed
    }
}

/// File session store
///
/// Unmodified sessions don't rewrite their file on every request. Their ids
/// are collected and a background task rewrites just the 8-byte header every
/// refresh interval. A second task removes expired files.
///
/// # Example
///
/// ```rust,ignore
/// use salvo_session_store::{FileStore, FileStoreOptions};
///
/// let store = FileStore::open(
///     FileStoreOptions::new("/var/lib/myapp/sessions").with_crypto_key(key),
/// )?;
/// ```
pub struct FileStore {
    inner: Arc<Inner>,
    tasks: Mutex<Vec<ScheduledTask>>,
}

impl FileStore {
    /// Open a store in `path` with default options
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self> {
        Self::open(FileStoreOptions::new(path))
    }

    /// Open a store and start its background tasks.
    ///
    /// Fails if the directory can't be created or written, if the crypto key
    /// is invalid, or if called outside a tokio runtime.
    pub fn open(options: FileStoreOptions) -> Result<Self> {
        if options.refresh_interval.is_zero() || options.sweep_interval.is_zero() {
            return Err(SessionError::Config(
                "file store intervals must be non-zero".to_string(),
            ));
        }
        let crypto_key = options
            .crypto_key
            .as_deref()
            .map(crypto::parse_key)
            .transpose()?;
        ensure_writable(&options.path)?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SessionError::Config(
                "file store must be opened inside a tokio runtime".to_string(),
            ));
        }

        let inner = Arc::new(Inner {
            path: options.path,
            sweep_ttl_ms: AtomicU64::new(ttl_millis(DEFAULT_TTL)),
            crypto_key,
            refresh_interval: options.refresh_interval,
            pending: IdSet::new(),
        });

        let refresh = {
            let inner = Arc::clone(&inner);
            schedule("session-file-refresh", options.refresh_interval, move |token| {
                let inner = Arc::clone(&inner);
                async move {
                    inner.refresh_pending(Some(&token)).await;
                }
            })
        };
        let sweep = {
            let inner = Arc::clone(&inner);
            schedule("session-file-sweep", options.sweep_interval, move |token| {
                let inner = Arc::clone(&inner);
                async move {
                    inner.sweep(Some(&token)).await;
                }
            })
        };

        tracing::debug!(path = %inner.path.display(), encrypted = inner.crypto_key.is_some(), "opened file session store");
        Ok(Self {
            inner,
            tasks: Mutex::new(vec![refresh, sweep]),
        })
    }

    /// Directory holding the session files
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Number of ids waiting for a TTL refresh
    pub fn pending_ttl_refreshes(&self) -> usize {
        self.inner.pending.len()
    }

    /// Run one TTL refresh drain now, returning how many files were touched
    pub async fn flush_ttl_refresh(&self) -> usize {
        self.inner.refresh_pending(None).await
    }

    /// Run one expiry sweep now, returning how many files were removed
    pub async fn sweep_expired(&self) -> usize {
        self.inner.sweep(None).await
    }
}

fn ensure_writable(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| {
        SessionError::Config(format!(
            "cannot create session directory {}: {}",
            path.display(),
            e
        ))
    })?;
    let marker = path.join(format!(".write-check-{}", crate::id::new_id()));
    std::fs::write(&marker, b"").map_err(|e| {
        SessionError::Config(format!(
            "session directory {} is not writable: {}",
            path.display(),
            e
        ))
    })?;
    let _ = std::fs::remove_file(&marker);
    Ok(())
}

#[async_trait]
impl SessionStore for FileStore {
    async fn remove_all(&self, id: &str) -> Result<()> {
        let path = self.inner.session_path(id)?;
        self.inner.pending.remove(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_session(&self, id: &str, ttl: Duration) -> Result<Option<SessionData>> {
        let path = self.inner.session_path(id)?;
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.len() < HEADER_LEN {
            return Ok(None);
        }

        let (header, payload) = content.split_at(HEADER_LEN);
        let mut stamp = [0u8; HEADER_LEN];
        stamp.copy_from_slice(header);
        if is_expired(u64::from_be_bytes(stamp), ttl, now_millis()) {
            return Ok(None);
        }

        self.inner.decode(payload).map(Some)
    }

    async fn set_session(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<()> {
        let path = self.inner.session_path(id)?;
        self.inner.note_ttl(ttl);
        let buf = self.inner.encode(data)?;
        tokio::fs::write(&path, buf).await?;
        // the fresh header supersedes any pending refresh
        self.inner.pending.remove(id);
        Ok(())
    }

    async fn update_ttl(&self, id: &str, ttl: Duration) -> Result<()> {
        self.inner.note_ttl(ttl);
        // a refresh landing a whole interval late is useless for short TTLs
        if ttl >= self.inner.refresh_interval {
            self.inner.pending.add(id, ());
        }
        Ok(())
    }

    fn set_ttl(&self, ttl: Duration) {
        self.inner.sweep_ttl_ms.store(ttl_millis(ttl), Ordering::Relaxed);
    }

    async fn shutdown(&self) {
        let tasks: Vec<ScheduledTask> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.shutdown().await;
        }
    }
}
