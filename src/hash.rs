//! Hash mapper: batch conversion between entities and hash entries.
//!
//! A [`HashEntry`] is one `(entry key, payload)` pair of a Redis hash. The
//! functions here only convert; they never touch the store. Conversion is
//! all-or-nothing in both directions: a batch containing a single bad entity
//! (or a single undecodable payload) fails as a whole, so callers never write
//! or observe a silently truncated collection.

use crate::entity::HashEntity;
use crate::error::Result;
use crate::key::KeyResolver;
use crate::serialization::{decode, encode};

/// One field of a hash: entry key and encoded entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashEntry {
    /// Entry key inside the hash
    pub key: String,
    /// Encoded entity
    pub value: Vec<u8>,
}

impl HashEntry {
    pub fn new(key: impl Into<String>, value: Vec<u8>) -> Self {
        HashEntry {
            key: key.into(),
            value,
        }
    }
}

impl From<(String, Vec<u8>)> for HashEntry {
    fn from((key, value): (String, Vec<u8>)) -> Self {
        HashEntry { key, value }
    }
}

impl From<HashEntry> for (String, Vec<u8>) {
    fn from(entry: HashEntry) -> Self {
        (entry.key, entry.value)
    }
}

/// Convert one entity into a hash entry.
///
/// # Errors
///
/// - `Error::ConfigurationError`: the entry key cannot be resolved
/// - `Error::SerializationError`: the entity cannot be encoded
pub fn to_entry<T: HashEntity>(entity: &T) -> Result<HashEntry> {
    let key = KeyResolver::entry_key(entity)?;
    let value = encode(entity)?;
    Ok(HashEntry { key, value })
}

/// Convert entities into hash entries, preserving order.
///
/// The entry key member is resolved once for the batch. Any failure fails
/// the whole batch and no entries are returned.
///
/// # Errors
///
/// - `Error::ConfigurationError`: `T` has no decidable entry key member, or an
///   entity's key value has no string form
/// - `Error::SerializationError`: an entity cannot be encoded
pub fn to_entries<T: HashEntity>(entities: &[T]) -> Result<Vec<HashEntry>> {
    let member = KeyResolver::entry_key_member::<T>()?;

    let entries = entities
        .iter()
        .map(|entity| {
            let key = KeyResolver::read_entry_key(&member, entity)?;
            let value = encode(entity)?;
            Ok(HashEntry { key, value })
        })
        .collect::<Result<Vec<_>>>()?;

    trace!(
        "Mapped {} {} entities to hash entries",
        entries.len(),
        T::type_name()
    );
    Ok(entries)
}

/// Decode hash entries into entities, preserving order.
///
/// # Errors
///
/// Returns the codec error of the first payload that fails to decode; no
/// partially decoded collection is returned.
pub fn from_entries<T, I>(entries: I) -> Result<Vec<T>>
where
    T: HashEntity,
    I: IntoIterator<Item = HashEntry>,
{
    entries
        .into_iter()
        .map(|entry| {
            decode::<T>(&entry.value).map_err(|e| {
                warn!(
                    "Failed to decode {} entry <{}>: {}",
                    T::type_name(),
                    entry.key,
                    e
                );
                e
            })
        })
        .collect()
}

/// Decode the payload of a single hash field lookup.
///
/// An absent payload is a lookup miss and yields `Ok(None)`.
///
/// # Errors
///
/// Returns a codec error if a present payload cannot be decoded.
pub fn single_from_payload<T: HashEntity>(payload: Option<&[u8]>) -> Result<Option<T>> {
    payload.map(decode::<T>).transpose()
}
