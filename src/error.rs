//! Session error types

/// Errors that can occur during session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The store does not implement the requested operation.
    ///
    /// The session layer treats this as "use the in-memory path" and never
    /// hands it to callers.
    #[error("operation not supported by this session store")]
    Disabled,

    /// Error from the session store
    #[error("Session store error: {0}")]
    Store(String),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Filesystem error from the file store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encryption or decryption failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Invalid session ID format
    #[error("Invalid session ID: {0}")]
    InvalidSessionId(String),

    /// The session id can no longer be changed
    #[error("Session already started")]
    AlreadyStarted,

    /// Invalid store configuration, raised at construction time
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the key-value backend
    #[error("Redis error: {0}")]
    Redis(String),
}

impl SessionError {
    /// Whether this is the "not supported" sentinel.
    pub fn is_disabled(&self) -> bool {
        matches!(self, SessionError::Disabled)
    }
}

#[cfg(feature = "redis-store")]
impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        SessionError::Redis(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
