//! Entity metadata trait that every hash-cached entity implements.
//!
//! An entity describes, statically, the two things the key resolver needs:
//!
//! - an optional **hash key** naming the Redis hash that holds all entities of the type
//! - its **key members**: the fields that may supply the entry key, one of which
//!   may carry the entry-key marker
//!
//! Most entities use the [`hash_entity!`](crate::hash_entity) macro instead of a
//! hand-written impl.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Reads the string form of one member of `T`.
///
/// Returns `None` when the runtime value has no string form.
pub type MemberReader<T> = fn(&T) -> Option<String>;

/// One member of an entity that participates in entry-key resolution.
pub struct KeyMember<T> {
    name: &'static str,
    entry_key: bool,
    read: MemberReader<T>,
}

impl<T> KeyMember<T> {
    /// A plain member; eligible only through the `id` naming convention.
    pub fn field(name: &'static str, read: MemberReader<T>) -> Self {
        KeyMember {
            name,
            entry_key: false,
            read,
        }
    }

    /// A member carrying the entry-key marker.
    pub fn entry_key(name: &'static str, read: MemberReader<T>) -> Self {
        KeyMember {
            name,
            entry_key: true,
            read,
        }
    }

    /// Declared member name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the member carries the entry-key marker.
    pub fn is_entry_key(&self) -> bool {
        self.entry_key
    }

    /// Read the member's value from `entity` as a string.
    pub fn read(&self, entity: &T) -> Option<String> {
        (self.read)(entity)
    }
}

impl<T> Clone for KeyMember<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for KeyMember<T> {}

impl<T> fmt::Debug for KeyMember<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMember")
            .field("name", &self.name)
            .field("entry_key", &self.entry_key)
            .finish()
    }
}

/// Trait that all entities stored in a cache hash must implement.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use hashset_cache::entity::{HashEntity, KeyMember};
/// use hashset_cache::entity::EntryKeyValue;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// pub struct Employment {
///     pub id: String,
///     pub employer_name: String,
/// }
///
/// impl HashEntity for Employment {
///     fn hash_key() -> Option<&'static str> {
///         Some("employments")
///     }
///
///     fn key_members() -> Vec<KeyMember<Self>> {
///         vec![KeyMember::field("id", |e| e.id.to_entry_key())]
///     }
/// }
/// ```
pub trait HashEntity: Serialize + DeserializeOwned + Send + Sync {
    /// Explicit name of the hash holding this type.
    ///
    /// `None` falls back to `"h_" + type_name()`.
    fn hash_key() -> Option<&'static str> {
        None
    }

    /// Simple (unqualified) name of the type.
    fn type_name() -> &'static str {
        simple_type_name(std::any::type_name::<Self>())
    }

    /// Members eligible to supply the entry key, in declaration order.
    fn key_members() -> Vec<KeyMember<Self>>;
}

/// Strip module path and generic arguments from a `std::any::type_name` string.
pub(crate) fn simple_type_name(full: &'static str) -> &'static str {
    let base = match full.find('<') {
        Some(idx) => &full[..idx],
        None => full,
    };
    match base.rfind("::") {
        Some(idx) => &base[idx + 2..],
        None => base,
    }
}

/// Natural string form of an entry-key value.
pub trait EntryKeyValue {
    /// Convert to the entry key, or `None` if the value has no string form.
    fn to_entry_key(&self) -> Option<String>;
}

macro_rules! display_entry_key {
    ($($ty:ty),* $(,)?) => {
        $(
            impl EntryKeyValue for $ty {
                fn to_entry_key(&self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

display_entry_key!(
    String,
    str,
    char,
    bool,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    uuid::Uuid,
);

impl<T: EntryKeyValue + ?Sized> EntryKeyValue for &T {
    fn to_entry_key(&self) -> Option<String> {
        (**self).to_entry_key()
    }
}

impl<T: EntryKeyValue> EntryKeyValue for Option<T> {
    fn to_entry_key(&self) -> Option<String> {
        self.as_ref().and_then(EntryKeyValue::to_entry_key)
    }
}

impl<T: EntryKeyValue + ?Sized> EntryKeyValue for Box<T> {
    fn to_entry_key(&self) -> Option<String> {
        (**self).to_entry_key()
    }
}

/// Declare the hash metadata of an entity.
///
/// The type-level `#[hash_key = "..."]` overrides the hash name; a member-level
/// `#[entry_key]` designates the entry-key member. Members without a marker
/// are only considered through the `id` naming convention. Every listed
/// field's type must implement [`EntryKeyValue`].
///
/// ```
/// use hashset_cache::hash_entity;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct User { id: String, name: String }
///
/// #[derive(Serialize, Deserialize)]
/// struct Product { sku: String, id: String }
///
/// hash_entity!(User { id });
///
/// hash_entity! {
///     #[hash_key = "products_v2"]
///     Product {
///         #[entry_key] sku,
///         id,
///     }
/// }
/// ```
#[macro_export]
macro_rules! hash_entity {
    (
        #[hash_key = $hash_key:literal]
        $ty:ident { $($members:tt)* }
    ) => {
        $crate::hash_entity!(@impl $ty, ::core::option::Option::Some($hash_key), { $($members)* });
    };
    (
        $ty:ident { $($members:tt)* }
    ) => {
        $crate::hash_entity!(@impl $ty, ::core::option::Option::None, { $($members)* });
    };
    (@impl $ty:ident, $hash_key:expr, { $($members:tt)* }) => {
        impl $crate::entity::HashEntity for $ty {
            fn hash_key() -> ::core::option::Option<&'static str> {
                $hash_key
            }

            fn type_name() -> &'static str {
                ::core::stringify!($ty)
            }

            fn key_members() -> ::std::vec::Vec<$crate::entity::KeyMember<Self>> {
                #[allow(unused_mut)]
                let mut members = ::std::vec::Vec::new();
                $crate::hash_entity!(@members $ty, members, $($members)*);
                members
            }
        }
    };
    (@members $ty:ident, $acc:ident, ) => {};
    (@members $ty:ident, $acc:ident, #[entry_key] $field:ident $(, $($rest:tt)*)?) => {
        $acc.push($crate::entity::KeyMember::entry_key(
            ::core::stringify!($field),
            |entity: &$ty| $crate::entity::EntryKeyValue::to_entry_key(&entity.$field),
        ));
        $crate::hash_entity!(@members $ty, $acc, $($($rest)*)?);
    };
    (@members $ty:ident, $acc:ident, $field:ident $(, $($rest:tt)*)?) => {
        $acc.push($crate::entity::KeyMember::field(
            ::core::stringify!($field),
            |entity: &$ty| $crate::entity::EntryKeyValue::to_entry_key(&entity.$field),
        ));
        $crate::hash_entity!(@members $ty, $acc, $($($rest)*)?);
    };
}
