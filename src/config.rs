//! Session configuration

use std::path::PathBuf;
use std::time::Duration;

/// Default session TTL (one day)
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// How often coalesced TTL refreshes are flushed to the backend
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// How often the file store removes expired session files
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// How often the memory store evicts expired sessions
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the session middleware
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Name of the session cookie (default: "sessionid")
    pub cookie_name: String,

    /// Cookie path (default: "/")
    pub cookie_path: String,

    /// Cookie domain (default: None - current domain only)
    pub cookie_domain: Option<String>,

    /// HttpOnly flag for cookie (default: true)
    pub cookie_http_only: bool,

    /// Secure flag for cookie (default: false)
    pub cookie_secure: bool,

    /// SameSite attribute for cookie
    pub cookie_same_site: SameSite,

    /// Also accept the session id from a request header of this name.
    /// Useful for clients that don't keep cookies.
    pub header_name: Option<String>,
}

/// SameSite cookie attribute
#[derive(Clone, Debug, PartialEq)]
pub enum SameSite {
    /// Strict - cookie only sent for same-site requests
    Strict,
    /// Lax - cookie sent for same-site requests and top-level navigations
    Lax,
    /// None - cookie sent for all requests (requires Secure)
    None,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "sessionid".to_string(),
            cookie_path: "/".to_string(),
            cookie_domain: None,
            cookie_http_only: true,
            cookie_secure: false,
            cookie_same_site: SameSite::Lax,
            header_name: None,
        }
    }
}

impl SessionConfig {
    /// Create a configuration with default cookie settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cookie name (default: "sessionid")
    pub fn with_cookie_name<S: Into<String>>(mut self, name: S) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set the cookie path (default: "/")
    pub fn with_cookie_path<S: Into<String>>(mut self, path: S) -> Self {
        self.cookie_path = path.into();
        self
    }

    /// Set the cookie domain
    pub fn with_cookie_domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    /// Set the HttpOnly flag (default: true)
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.cookie_http_only = http_only;
        self
    }

    /// Set the Secure flag (default: false)
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    /// Set the SameSite attribute (default: Lax)
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.cookie_same_site = same_site;
        self
    }

    /// Accept the session id from this request header when no cookie is present
    pub fn with_header_name<S: Into<String>>(mut self, name: S) -> Self {
        self.header_name = Some(name.into());
        self
    }
}

/// Options for [`FileStore`](crate::store::FileStore)
#[derive(Clone, Debug)]
pub struct FileStoreOptions {
    /// Directory holding one `<id>.session` file per session
    pub path: PathBuf,

    /// AES-256 key; encryption is enabled iff set
    pub crypto_key: Option<Vec<u8>>,

    /// Interval of the header-rewrite task
    pub refresh_interval: Duration,

    /// Interval of the expired-file sweep
    pub sweep_interval: Duration,
}

impl Default for FileStoreOptions {
    fn default() -> Self {
        Self {
            path: std::env::temp_dir().join("jsessions"),
            crypto_key: None,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl FileStoreOptions {
    /// Options for a store rooted at `path`
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Enable AES-CBC encryption of session payloads with a 32-byte key
    pub fn with_crypto_key<K: Into<Vec<u8>>>(mut self, key: K) -> Self {
        self.crypto_key = Some(key.into());
        self
    }

    /// Set the TTL refresh interval (default: 10s)
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set the expired-file sweep interval (default: 1h)
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// Options for the key-value backed stores
#[derive(Clone, Debug)]
pub struct KvStoreOptions {
    /// Key prefix; a session lives under `prefix + id` (default: "session:")
    pub prefix: String,

    /// Interval of the EXPIRE flush task (blob store only)
    pub refresh_interval: Duration,
}

impl Default for KvStoreOptions {
    fn default() -> Self {
        Self {
            prefix: "session:".to_string(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl KvStoreOptions {
    /// Create options with the default prefix
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key prefix
    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the TTL refresh interval (default: 10s)
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}
