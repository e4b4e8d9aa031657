//! High-level cache service.
//!
//! `CacheService` composes the key resolver, the codec and the hash mapper
//! over a [`CacheBackend`]. It wraps the backend in `Arc` so one service can
//! be cloned into every handler without external locking.
//!
//! Every operation runs inside a `cache.operation` span carrying
//! `cache.operation`, `cache.key` and, on failure, `error`. Conversion and
//! codec work runs in `cache.step` children (`step` is `conversion`,
//! `serialize` or `deserialize`), so a decode failure shows up in the trace
//! next to the store command that fetched the bytes.

use crate::backend::CacheBackend;
use crate::entity::HashEntity;
use crate::error::Result;
use crate::flags::CommandFlags;
use crate::hash::{from_entries, single_from_payload, to_entries, to_entry};
use crate::key::KeyResolver;
use crate::serialization::{decode, encode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::field::{display, Empty};
use tracing::{info_span, Instrument, Span};

fn operation_span(operation: &'static str, key: &str) -> Span {
    info_span!(
        "cache.operation",
        cache.operation = operation,
        cache.key = key,
        error = Empty
    )
}

/// Run `fut` inside `span`, recording the error on it if one comes back.
async fn traced<T>(span: Span, fut: impl Future<Output = Result<T>>) -> Result<T> {
    let result = fut.instrument(span.clone()).await;
    if let Err(e) = &result {
        span.record("error", display(e));
    }
    result
}

/// Run a synchronous conversion or codec step in its own child span.
fn step<T>(name: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let span = info_span!("cache.step", step = name, error = Empty);
    let result = span.in_scope(f);
    if let Err(e) = &result {
        span.record("error", display(e));
    }
    result
}

/// Typed cache façade.
///
/// Two families of operations:
///
/// - **String values** (`set`, `get`, `remove` and their raw forms): one key,
///   one encoded value, optional expiry
/// - **Hash sets** (`hash_*`): one hash per entity type, addressed by
///   [`KeyResolver::collection_key`], with one field per entity addressed by
///   its entry key
///
/// Every operation forwards its [`CommandFlags`] to the backend untouched.
///
/// # Example
///
/// ```
/// use hashset_cache::backend::InMemoryBackend;
/// use hashset_cache::{hash_entity, CacheService, CommandFlags};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// struct User {
///     id: String,
///     name: String,
/// }
///
/// hash_entity!(User { id, name });
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> hashset_cache::Result<()> {
/// let cache = CacheService::new(InMemoryBackend::new());
/// let alice = User { id: "u1".into(), name: "Alice".into() };
///
/// cache.hash_set(&[alice.clone()], CommandFlags::None).await?;
/// let found: Option<User> = cache.hash_get("u1", CommandFlags::None).await?;
/// assert_eq!(found, Some(alice));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CacheService<B: CacheBackend> {
    backend: Arc<B>,
}

impl<B: CacheBackend> CacheService<B> {
    /// Create a new cache service with the given backend.
    pub fn new(backend: B) -> Self {
        CacheService {
            backend: Arc::new(backend),
        }
    }

    /// Get a reference to the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Store raw bytes under `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendError` if the store fails.
    pub async fn set_raw(
        &self,
        key: &str,
        value: Vec<u8>,
        expiry: Option<Duration>,
        flags: CommandFlags,
    ) -> Result<bool> {
        traced(
            operation_span("set_raw", key),
            self.backend.set(key, value, expiry, flags),
        )
        .await
    }

    /// Encode `value` and store it under `key`.
    ///
    /// # Errors
    ///
    /// - `Error::SerializationError`: the value cannot be encoded
    /// - `Error::BackendError`: the store fails
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expiry: Option<Duration>,
        flags: CommandFlags,
    ) -> Result<bool> {
        traced(operation_span("set", key), async {
            let bytes = step("serialize", || encode(value))?;
            self.backend.set(key, bytes, expiry, flags).await
        })
        .await
    }

    /// Read raw bytes stored under `key`. A missing key yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendError` if the store fails.
    pub async fn get_raw(&self, key: &str, flags: CommandFlags) -> Result<Option<Vec<u8>>> {
        traced(operation_span("get_raw", key), self.backend.get(key, flags)).await
    }

    /// Read and decode the value stored under `key`. A missing key yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - `Error::DeserializationError`, `Error::InvalidCacheEntry`,
    ///   `Error::VersionMismatch`: the stored bytes do not decode as `T`
    /// - `Error::BackendError`: the store fails
    pub async fn get<T: DeserializeOwned>(
        &self,
        key: &str,
        flags: CommandFlags,
    ) -> Result<Option<T>> {
        traced(operation_span("get", key), async {
            match self.backend.get(key, flags).await? {
                Some(bytes) => step("deserialize", || decode(&bytes)).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    /// Remove `key`, whatever it holds. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendError` if the store fails.
    pub async fn remove(&self, key: &str, flags: CommandFlags) -> Result<bool> {
        traced(operation_span("remove", key), self.backend.delete(key, flags)).await
    }

    /// Write `entities` into the hash of `T`, one field per entity.
    ///
    /// The whole batch is mapped before the store is contacted; if any entity
    /// has no resolvable entry key nothing is written.
    ///
    /// # Errors
    ///
    /// - `Error::ConfigurationError`: an entry key cannot be resolved
    /// - `Error::SerializationError`: an entity cannot be encoded
    /// - `Error::BackendError`: the store fails
    pub async fn hash_set<T: HashEntity>(&self, entities: &[T], flags: CommandFlags) -> Result<()> {
        let collection_key = KeyResolver::collection_key::<T>();

        traced(operation_span("hash_set", &collection_key), async {
            let entries = step("conversion", || to_entries(entities))?;
            debug!(
                "Writing {} entries to hash <{}>",
                entries.len(),
                collection_key
            );
            self.backend
                .hset_many(&collection_key, &entries, flags)
                .await
        })
        .await
    }

    /// Read every entity in the hash of `T`. A missing hash yields an empty vector.
    ///
    /// # Errors
    ///
    /// - Codec errors if any stored payload fails to decode
    /// - `Error::BackendError`: the store fails
    pub async fn hash_get_all<T: HashEntity>(&self, flags: CommandFlags) -> Result<Vec<T>> {
        let collection_key = KeyResolver::collection_key::<T>();
        traced(operation_span("hash_get_all", &collection_key), async {
            let entries = self.backend.hget_all(&collection_key, flags).await?;
            step("deserialize", || from_entries(entries))
        })
        .await
    }

    /// Read one entity from the hash of `T` by entry key.
    ///
    /// A missing hash or field yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - Codec errors if the stored payload fails to decode
    /// - `Error::BackendError`: the store fails
    pub async fn hash_get<T: HashEntity>(
        &self,
        entry_key: &str,
        flags: CommandFlags,
    ) -> Result<Option<T>> {
        let collection_key = KeyResolver::collection_key::<T>();
        traced(operation_span("hash_get", &collection_key), async {
            let payload = self.backend.hget(&collection_key, entry_key, flags).await?;
            step("deserialize", || single_from_payload(payload.as_deref()))
        })
        .await
    }

    /// Add or replace one entity in the hash of `T`.
    ///
    /// Returns `true` if a new field was created.
    ///
    /// # Errors
    ///
    /// - `Error::ConfigurationError`: the entry key cannot be resolved
    /// - `Error::SerializationError`: the entity cannot be encoded
    /// - `Error::BackendError`: the store fails
    pub async fn hash_append<T: HashEntity>(&self, entity: &T, flags: CommandFlags) -> Result<bool> {
        let collection_key = KeyResolver::collection_key::<T>();
        traced(operation_span("hash_append", &collection_key), async {
            let entry = step("conversion", || to_entry(entity))?;
            self.backend
                .hset(&collection_key, &entry.key, entry.value, flags)
                .await
        })
        .await
    }

    /// Remove one entity from the hash of `T`. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendError` if the store fails.
    pub async fn hash_remove<T: HashEntity>(
        &self,
        entry_key: &str,
        flags: CommandFlags,
    ) -> Result<bool> {
        let collection_key = KeyResolver::collection_key::<T>();
        traced(
            operation_span("hash_remove", &collection_key),
            self.backend.hdel(&collection_key, entry_key, flags),
        )
        .await
    }

    /// Remove several entities from the hash of `T`. Returns how many existed.
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendError` if the store fails.
    pub async fn hash_remove_many<T: HashEntity>(
        &self,
        entry_keys: &[&str],
        flags: CommandFlags,
    ) -> Result<u64> {
        let collection_key = KeyResolver::collection_key::<T>();
        traced(
            operation_span("hash_remove_many", &collection_key),
            self.backend.hdel_many(&collection_key, entry_keys, flags),
        )
        .await
    }

    /// Delete the whole hash of `T`. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendError` if the store fails.
    pub async fn hash_drop<T: HashEntity>(&self, flags: CommandFlags) -> Result<bool> {
        let collection_key = KeyResolver::collection_key::<T>();
        warn!("Dropping hash <{}>", collection_key);
        traced(
            operation_span("hash_drop", &collection_key),
            self.backend.delete(&collection_key, flags),
        )
        .await
    }

    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the backend is not accessible.
    pub async fn health_check(&self) -> Result<bool> {
        traced(
            info_span!("cache.operation", cache.operation = "health_check", error = Empty),
            self.backend.health_check(),
        )
        .await
    }
}
