//! # hashset-cache
//!
//! A typed caching façade over a key-value store, with per-entity hash sets.
//!
//! ## Features
//!
//! - **Hash sets per type:** every entity type owns one Redis hash; each
//!   instance is one field, addressed by a designated key member
//! - **Declarative keys:** the `hash_entity!` macro records the collection key
//!   override and the entry key member, no runtime reflection
//! - **Versioned binary payloads:** Postcard inside a checked envelope
//! - **Backend Agnostic:** in-memory backend for tests, Redis behind the `redis` feature
//! - **Fire-and-forget:** per-command [`CommandFlags`] forwarded to the store
//! - **Traceable:** [`InstrumentedBackend`] wraps every store command in a `tracing` span
//!
//! ## Quick Start
//!
//! ```
//! use hashset_cache::{backend::InMemoryBackend, hash_entity, CacheService, CommandFlags};
//! use serde::{Deserialize, Serialize};
//!
//! // 1. Define your entity
//! #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
//! struct Product {
//!     id: u64,
//!     sku: String,
//!     name: String,
//! }
//!
//! // 2. Describe its keys
//! hash_entity! {
//!     #[hash_key = "products_v2"]
//!     Product {
//!         id,
//!         #[entry_key] sku,
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> hashset_cache::Result<()> {
//! // 3. Create the cache (Clone for sharing across tasks)
//! let cache = CacheService::new(InMemoryBackend::new());
//!
//! // 4. Write the collection and read it back
//! let widget = Product { id: 1, sku: "SKU-7".into(), name: "Widget".into() };
//! cache.hash_set(&[widget.clone()], CommandFlags::None).await?;
//!
//! let found: Option<Product> = cache.hash_get("SKU-7", CommandFlags::None).await?;
//! assert_eq!(found, Some(widget));
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! With the `redis` feature, build the pool once at startup and share it:
//!
//! ```ignore
//! use hashset_cache::{backend::RedisBackend, CacheService, InstrumentedBackend};
//!
//! let backend = RedisBackend::from_env().await?;  // reads REDIS_URL
//! let cache = CacheService::new(InstrumentedBackend::new(backend));
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod entity;
pub mod error;
pub mod flags;
pub mod hash;
pub mod key;
pub mod observability;
pub mod serialization;
pub mod service;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use entity::{EntryKeyValue, HashEntity, KeyMember};
pub use error::{Error, ErrorKind, Result};
pub use flags::CommandFlags;
pub use hash::HashEntry;
pub use key::KeyResolver;
pub use observability::{CacheMetrics, InstrumentedBackend};
pub use service::CacheService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
