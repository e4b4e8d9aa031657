//! Store adapters.

use crate::error::Result;
use crate::flags::CommandFlags;
use crate::hash::HashEntry;
use std::time::Duration;

pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use redis::{PoolStats, RedisBackend, RedisConfig};

/// Trait for store adapters.
///
/// Exposes the string and hash primitives the cache service composes. Keys
/// live in one keyspace: a key holds either a string value or a hash.
///
/// **IMPORTANT:** All methods use `&self` instead of `&mut self` to allow concurrent access.
/// Backend implementations should use interior mutability or an external connection pool.
///
/// **FLAGS:** Every command receives the caller's [`CommandFlags`]. A backend that
/// honours `FireAndForget` returns the neutral value of the result type.
///
/// **ASYNC:** All methods are async and must be awaited.
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// Retrieve a string value.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Value found
    /// - `Ok(None)` - Key not found
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs (connection lost, wrong type, etc.)
    async fn get(&self, key: &str, flags: CommandFlags) -> Result<Option<Vec<u8>>>;

    /// Store a string value with optional expiry.
    ///
    /// Returns `true` once the value is stored.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        flags: CommandFlags,
    ) -> Result<bool>;

    /// Remove a key of any type, including a whole hash.
    ///
    /// Returns `true` if the key existed.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn delete(&self, key: &str, flags: CommandFlags) -> Result<bool>;

    /// Write many fields of a hash at once.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn hset_many(&self, key: &str, entries: &[HashEntry], flags: CommandFlags)
        -> Result<()>;

    /// Read every field of a hash. A missing hash yields an empty vector.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn hget_all(&self, key: &str, flags: CommandFlags) -> Result<Vec<HashEntry>>;

    /// Read one field of a hash.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Field found
    /// - `Ok(None)` - Hash or field not found
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn hget(&self, key: &str, field: &str, flags: CommandFlags)
        -> Result<Option<Vec<u8>>>;

    /// Write one field of a hash.
    ///
    /// Returns `true` if the field is new, `false` if an existing field was overwritten.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn hset(&self, key: &str, field: &str, value: Vec<u8>, flags: CommandFlags)
        -> Result<bool>;

    /// Remove one field of a hash. Returns `true` if the field existed.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn hdel(&self, key: &str, field: &str, flags: CommandFlags) -> Result<bool>;

    /// Remove several fields of a hash. Returns the number of fields removed.
    ///
    /// Default implementation calls `hdel()` for each field.
    /// Override for batch efficiency (e.g., Redis variadic HDEL).
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn hdel_many(&self, key: &str, fields: &[&str], flags: CommandFlags) -> Result<u64> {
        let mut removed = 0;
        for field in fields {
            if self.hdel(key, field, flags).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Name of the store behind this backend, as reported in tracing spans.
    fn system(&self) -> &'static str {
        "unknown"
    }

    /// Health check - verify backend is accessible.
    ///
    /// # Errors
    /// Returns `Err` if backend is not accessible
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_backend_hdel_many_default() {
        let backend = InMemoryBackend::new();
        backend
            .hset_many(
                "h",
                &[
                    HashEntry::new("a", vec![1]),
                    HashEntry::new("b", vec![2]),
                    HashEntry::new("c", vec![3]),
                ],
                CommandFlags::None,
            )
            .await
            .expect("Failed to hset_many");

        let removed = backend
            .hdel_many("h", &["a", "c", "missing"], CommandFlags::None)
            .await
            .expect("Failed to hdel_many");
        assert_eq!(removed, 2);

        let rest = backend
            .hget_all("h", CommandFlags::None)
            .await
            .expect("Failed to hget_all");
        assert_eq!(rest, vec![HashEntry::new("b", vec![2])]);
    }
}
