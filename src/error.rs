//! Error types for the hash-set cache.

use std::fmt;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the hash-set cache.
///
/// All cache operations return `Result<T>` where `Result` is defined as `std::result::Result<T, Error>`.
/// Variants fall into three families, see [`ErrorKind`]: configuration problems raised
/// before any I/O, codec failures on payloads, and store errors passed through unchanged.
///
/// Lookup misses are never errors; they surface as `Ok(None)`.
#[derive(Debug, Clone)]
pub enum Error {
    /// An entity type (or the store connection) is misconfigured.
    ///
    /// Raised synchronously, before the store is touched. Common causes:
    /// - Entity declares neither an `#[entry_key]` member nor an `id` member
    /// - Entity declares more than one `#[entry_key]` member
    /// - The entry-key member holds a value with no string form (e.g. `None`)
    /// - Invalid connection string or pool settings
    ///
    /// **Recovery:** Fix the entity declaration or configuration. Never retried.
    ConfigurationError(String),

    /// Serialization failed when converting an entity to payload bytes.
    ///
    /// Common causes:
    /// - Entity contains types Postcard cannot encode (e.g. `serde_json::Value`)
    /// - A custom `Serialize` implementation returned an error
    SerializationError(String),

    /// Deserialization failed when converting payload bytes to an entity.
    ///
    /// This indicates corrupted or type-mismatched data in the store.
    /// Common causes:
    /// - Payload was written for a different entity type
    /// - Truncated value read from the store
    ///
    /// **Recovery:** Remove the entry and write it again.
    DeserializationError(String),

    /// Invalid cache entry: bad magic header.
    ///
    /// Returned when the payload was not written by this crate's codec.
    InvalidCacheEntry(String),

    /// Schema version mismatch between code and stored payload.
    ///
    /// **Recovery:** Drop the affected hash and repopulate it.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from the stored payload)
        found: u32,
    },

    /// Store error (Redis connection, timeout, protocol, wrong type).
    ///
    /// Passed through from the backend without retry.
    BackendError(String),

    /// Generic error with custom message.
    Other(String),
}

/// Coarse classification of [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Entity or connection misconfiguration; raised before I/O.
    Configuration,
    /// Payload could not be encoded or decoded.
    Codec,
    /// Store-layer failure.
    Backend,
    /// Anything else.
    Other,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigurationError(_) => ErrorKind::Configuration,
            Error::SerializationError(_)
            | Error::DeserializationError(_)
            | Error::InvalidCacheEntry(_)
            | Error::VersionMismatch { .. } => ErrorKind::Codec,
            Error::BackendError(_) => ErrorKind::Backend,
            Error::Other(_) => ErrorKind::Other,
        }
    }

    /// True for configuration errors.
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// True for codec errors (encode or decode).
    pub fn is_codec(&self) -> bool {
        self.kind() == ErrorKind::Codec
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidCacheEntry(msg) => {
                write!(f, "Invalid cache entry: {}", msg)
            }
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::BackendError(format!("Redis error: {}", e))
    }
}
