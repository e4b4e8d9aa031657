//! In-memory store backend (default, thread-safe, async).
//!
//! Uses DashMap for lock-free concurrent access with per-key sharding.
//! A key holds either a string value (with optional TTL, checked on access)
//! or a hash of fields. Using a key as the wrong kind fails like Redis `WRONGTYPE`.

use super::CacheBackend;
use crate::error::{Error, Result};
use crate::flags::CommandFlags;
use crate::hash::HashEntry;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

/// String value with optional expiration.
struct StringValue {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StringValue {
    fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        StringValue { data, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }
}

/// What a key holds.
enum Slot {
    String(StringValue),
    Hash(BTreeMap<String, Vec<u8>>),
}

impl Slot {
    fn is_expired(&self) -> bool {
        match self {
            Slot::String(value) => value.is_expired(),
            Slot::Hash(_) => false,
        }
    }
}

fn wrong_type(key: &str) -> Error {
    Error::BackendError(format!(
        "WRONGTYPE Operation against key {} holding the wrong kind of value",
        key
    ))
}

/// Thread-safe async in-memory backend.
///
/// Flags are accepted and ignored: every command completes before returning.
/// Hash fields are returned sorted by field name.
///
/// # Example
///
/// ```no_run
/// use hashset_cache::backend::{CacheBackend, InMemoryBackend};
/// use hashset_cache::CommandFlags;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///
///     backend.set("key1", b"value".to_vec(), None, CommandFlags::None).await?;
///     let value = backend.get("key1", CommandFlags::None).await?;
///     assert!(value.is_some());
///
///     backend.hset("h_User", "u1", b"alice".to_vec(), CommandFlags::None).await?;
///     let field = backend.hget("h_User", "u1", CommandFlags::None).await?;
///     assert_eq!(field, Some(b"alice".to_vec()));
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, Slot>>,
}

impl InMemoryBackend {
    /// Create a new in-memory backend.
    pub fn new() -> Self {
        InMemoryBackend {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Get the current number of keys.
    pub async fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Number of fields in the hash at `key` (0 if absent).
    pub async fn hlen(&self, key: &str) -> usize {
        match self.store.get(key).as_deref() {
            Some(Slot::Hash(fields)) => fields.len(),
            _ => 0,
        }
    }

    /// Get memory statistics.
    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            total_entries: self.store.len(),
            ..CacheStats::default()
        };

        for slot in self.store.iter() {
            match slot.value() {
                Slot::String(value) => {
                    stats.total_bytes += value.data.len();
                    if value.is_expired() {
                        stats.expired_entries += 1;
                    }
                }
                Slot::Hash(fields) => {
                    stats.hashes += 1;
                    stats.hash_fields += fields.len();
                    stats.total_bytes += fields.values().map(Vec::len).sum::<usize>();
                }
            }
        }

        stats
    }

    /// Print statistics to debug log.
    pub async fn log_stats(&self) {
        let stats = self.stats().await;
        debug!(
            "Cache Stats: {} keys ({} expired), {} hashes with {} fields, {} bytes",
            stats.total_entries,
            stats.expired_entries,
            stats.hashes,
            stats.hash_fields,
            stats.total_bytes
        );
    }

    /// Remove every key.
    pub async fn clear_all(&self) {
        self.store.clear();
        warn!("⚠ InMemory CLEAR_ALL executed - all cache cleared!");
    }

    /// Drop `key` if it holds an expired string.
    fn evict_expired(&self, key: &str) {
        self.store.remove_if(key, |_, slot| slot.is_expired());
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str, _flags: CommandFlags) -> Result<Option<Vec<u8>>> {
        self.evict_expired(key);

        match self.store.get(key).as_deref() {
            Some(Slot::String(value)) => {
                debug!("✓ InMemory GET {} -> HIT", key);
                Ok(Some(value.data.clone()))
            }
            Some(Slot::Hash(_)) => Err(wrong_type(key)),
            None => {
                debug!("✓ InMemory GET {} -> MISS", key);
                Ok(None)
            }
        }
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        _flags: CommandFlags,
    ) -> Result<bool> {
        // SET replaces a key of any kind, as in Redis
        self.store
            .insert(key.to_string(), Slot::String(StringValue::new(value, ttl)));

        if let Some(d) = ttl {
            debug!("✓ InMemory SET {} (TTL: {:?})", key, d);
        } else {
            debug!("✓ InMemory SET {}", key);
        }

        Ok(true)
    }

    async fn delete(&self, key: &str, _flags: CommandFlags) -> Result<bool> {
        self.evict_expired(key);
        let existed = self.store.remove(key).is_some();
        debug!("✓ InMemory DELETE {} -> {}", key, existed);
        Ok(existed)
    }

    async fn hset_many(
        &self,
        key: &str,
        entries: &[HashEntry],
        _flags: CommandFlags,
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.evict_expired(key);

        let mut slot = self
            .store
            .entry(key.to_string())
            .or_insert_with(|| Slot::Hash(BTreeMap::new()));

        match slot.value_mut() {
            Slot::Hash(fields) => {
                for entry in entries {
                    fields.insert(entry.key.clone(), entry.value.clone());
                }
            }
            Slot::String(_) => return Err(wrong_type(key)),
        }

        debug!("✓ InMemory HSET {} ({} fields)", key, entries.len());
        Ok(())
    }

    async fn hget_all(&self, key: &str, _flags: CommandFlags) -> Result<Vec<HashEntry>> {
        self.evict_expired(key);

        let entries = match self.store.get(key).as_deref() {
            Some(Slot::Hash(fields)) => fields
                .iter()
                .map(|(field, value)| HashEntry::new(field.clone(), value.clone()))
                .collect(),
            Some(Slot::String(_)) => return Err(wrong_type(key)),
            None => Vec::new(),
        };

        debug!("✓ InMemory HGETALL {} -> {} fields", key, entries.len());
        Ok(entries)
    }

    async fn hget(
        &self,
        key: &str,
        field: &str,
        _flags: CommandFlags,
    ) -> Result<Option<Vec<u8>>> {
        self.evict_expired(key);

        let value = match self.store.get(key).as_deref() {
            Some(Slot::Hash(fields)) => fields.get(field).cloned(),
            Some(Slot::String(_)) => return Err(wrong_type(key)),
            None => None,
        };

        if value.is_some() {
            debug!("✓ InMemory HGET {} {} -> HIT", key, field);
        } else {
            debug!("✓ InMemory HGET {} {} -> MISS", key, field);
        }
        Ok(value)
    }

    async fn hset(
        &self,
        key: &str,
        field: &str,
        value: Vec<u8>,
        _flags: CommandFlags,
    ) -> Result<bool> {
        self.evict_expired(key);

        let mut slot = self
            .store
            .entry(key.to_string())
            .or_insert_with(|| Slot::Hash(BTreeMap::new()));

        let created = match slot.value_mut() {
            Slot::Hash(fields) => fields.insert(field.to_string(), value).is_none(),
            Slot::String(_) => return Err(wrong_type(key)),
        };

        debug!("✓ InMemory HSET {} {} (new: {})", key, field, created);
        Ok(created)
    }

    async fn hdel(&self, key: &str, field: &str, _flags: CommandFlags) -> Result<bool> {
        self.evict_expired(key);

        let removed = match self.store.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let (removed, now_empty) = match occupied.get_mut() {
                    Slot::Hash(fields) => (fields.remove(field).is_some(), fields.is_empty()),
                    Slot::String(_) => return Err(wrong_type(key)),
                };
                // Redis deletes a hash once its last field is gone
                if now_empty {
                    occupied.remove();
                }
                removed
            }
            Entry::Vacant(_) => false,
        };

        debug!("✓ InMemory HDEL {} {} -> {}", key, field, removed);
        Ok(removed)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn system(&self) -> &'static str {
        "memory"
    }
}

/// Store statistics.
#[derive(Clone, Debug, Default)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub hashes: usize,
    pub hash_fields: usize,
    pub total_bytes: usize,
}
