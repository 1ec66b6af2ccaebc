//! Error types for cache operations.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific errors.
///
/// A `false` from `add`, `compare_set` or `compare_delete` is not an error;
/// it means the precondition did not hold. Errors are reserved for
/// transport, codec and configuration failures.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis-specific error
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Memcache client error
    #[cfg(feature = "memcache")]
    #[error("Memcache error: {0}")]
    Memcache(#[from] memcache::MemcacheError),

    /// Database error
    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error on a raw backend connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected backend reply
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Value could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored payload could not be decoded
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Key cannot be represented by the backend
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The backend cannot be used in this process.
    ///
    /// Raised at construction time when the driver is not compiled in, the
    /// server cannot be reached, or credentials are rejected. Callers are
    /// expected to degrade or skip rather than abort.
    #[error("Cache driver '{driver}' unavailable: {reason}")]
    Unavailable {
        /// Driver name
        driver: String,
        /// Why it is unavailable
        reason: String,
    },

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation timeout
    #[error("Operation timeout")]
    Timeout,

    /// Generic error
    #[error("Cache error: {0}")]
    Other(String),
}

impl CacheError {
    /// Build an [`CacheError::Unavailable`] error.
    pub fn unavailable(driver: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            driver: driver.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means "backend unavailable, skip it".
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
