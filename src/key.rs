//! Hash key resolution.
//!
//! Two keys address an entity in the store:
//!
//! - the **collection key** names the hash holding every entity of a type
//! - the **entry key** names one entity's field inside that hash
//!
//! Both are pure functions of the entity's declared metadata (see
//! [`HashEntity`]) and, for the entry key, one member's runtime value.

use crate::entity::{HashEntity, KeyMember};
use crate::error::{Error, Result};

/// Prefix of the collection key used when a type declares no hash key.
pub const DEFAULT_HASH_KEY_PREFIX: &str = "h_";

/// Member name used when no member carries the entry-key marker.
pub const DEFAULT_ENTRY_KEY_MEMBER: &str = "id";

/// Resolver for collection and entry keys.
pub struct KeyResolver;

impl KeyResolver {
    /// Resolve the collection key of `T`.
    ///
    /// The declared hash key wins; otherwise `"h_" + T::type_name()`.
    pub fn collection_key<T: HashEntity>() -> String {
        match T::hash_key() {
            Some(key) => key.to_string(),
            None => format!("{}{}", DEFAULT_HASH_KEY_PREFIX, T::type_name()),
        }
    }

    /// Resolve which member of `T` supplies the entry key.
    ///
    /// A member marked as entry key takes precedence over the `id` convention.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigurationError` when more than one member carries the
    /// marker, or when no member is marked and there is not exactly one member
    /// named `id` or `Id`.
    pub fn entry_key_member<T: HashEntity>() -> Result<KeyMember<T>> {
        let members = T::key_members();

        let mut marked = members.iter().filter(|m| m.is_entry_key());
        if let Some(first) = marked.next() {
            if let Some(second) = marked.next() {
                return Err(Error::ConfigurationError(format!(
                    "Entity {} marks more than one entry key member ({}, {})",
                    T::type_name(),
                    first.name(),
                    second.name()
                )));
            }
            return Ok(*first);
        }

        let mut defaults = members.iter().filter(|m| is_default_member(m.name()));
        match (defaults.next(), defaults.next()) {
            (Some(member), None) => Ok(*member),
            (Some(first), Some(second)) => Err(Error::ConfigurationError(format!(
                "Entity {} declares more than one <{}> member ({}, {}) and marks none as entry key",
                T::type_name(),
                DEFAULT_ENTRY_KEY_MEMBER,
                first.name(),
                second.name()
            ))),
            (None, _) => Err(Error::ConfigurationError(format!(
                "Entity {} must declare an entry key member or an <{}> member",
                T::type_name(),
                DEFAULT_ENTRY_KEY_MEMBER
            ))),
        }
    }

    /// Resolve the entry key of `entity`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigurationError` if the entry key member cannot be
    /// decided, or its value has no string form.
    pub fn entry_key<T: HashEntity>(entity: &T) -> Result<String> {
        let member = Self::entry_key_member::<T>()?;
        Self::read_entry_key(&member, entity)
    }

    /// Read an already resolved entry key member from `entity`.
    pub(crate) fn read_entry_key<T: HashEntity>(member: &KeyMember<T>, entity: &T) -> Result<String> {
        member.read(entity).ok_or_else(|| {
            Error::ConfigurationError(format!(
                "Entity {} has no string value for entry key member <{}>",
                T::type_name(),
                member.name()
            ))
        })
    }
}

// `Id` is accepted for entities whose member names mirror an external schema.
fn is_default_member(name: &str) -> bool {
    name == DEFAULT_ENTRY_KEY_MEMBER || name == "Id"
}
