//! Integration tests for hashset-cache
//!
//! These tests verify end-to-end cache behavior across all components.

use hashset_cache::backend::{CacheBackend, InMemoryBackend};
use hashset_cache::{hash_entity, CacheService, CommandFlags, Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Test entity definitions
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct Order {
    id: u64,
    customer: String,
    total_cents: u64,
    lines: Vec<OrderLine>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct OrderLine {
    sku: String,
    quantity: u32,
}

hash_entity!(Order { id, customer });

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct Session {
    token: uuid::Uuid,
    user_id: String,
}

hash_entity! {
    #[hash_key = "sessions"]
    Session {
        #[entry_key] token,
        user_id,
    }
}

fn order(id: u64, customer: &str) -> Order {
    Order {
        id,
        customer: customer.to_string(),
        total_cents: id * 100,
        lines: vec![OrderLine {
            sku: format!("SKU-{}", id),
            quantity: 1,
        }],
    }
}

/// Test 1: String values round-trip through the codec
#[tokio::test]
async fn test_string_value_roundtrip() {
    let _ = env_logger::builder().is_test(true).try_init();
    let cache = CacheService::new(InMemoryBackend::new());
    let flags = CommandFlags::None;

    let value = order(1, "acme");
    assert!(cache.set("order:1", &value, None, flags).await.unwrap());

    let cached: Option<Order> = cache.get("order:1", flags).await.unwrap();
    assert_eq!(cached, Some(value));

    assert!(cache.remove("order:1", flags).await.unwrap());
    let gone: Option<Order> = cache.get("order:1", flags).await.unwrap();
    assert!(gone.is_none());
}

/// Test 2: Expiry on string values
#[tokio::test]
async fn test_string_value_expiry() {
    let cache = CacheService::new(InMemoryBackend::new());
    let flags = CommandFlags::None;

    cache
        .set("short", "lived", Some(Duration::from_millis(50)), flags)
        .await
        .unwrap();
    assert!(cache.get_raw("short", flags).await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(cache.get_raw("short", flags).await.unwrap().is_none());
}

/// Test 3: Full hash lifecycle for one type
#[tokio::test]
async fn test_hash_lifecycle() {
    let _ = env_logger::builder().is_test(true).try_init();
    let cache = CacheService::new(InMemoryBackend::new());
    let flags = CommandFlags::None;

    let orders: Vec<Order> = (1..=4).map(|i| order(i, "acme")).collect();
    cache.hash_set(&orders, flags).await.unwrap();

    let mut all: Vec<Order> = cache.hash_get_all(flags).await.unwrap();
    all.sort_by_key(|o| o.id);
    assert_eq!(all, orders);

    assert!(cache.hash_append(&order(5, "globex"), flags).await.unwrap());
    assert!(cache.hash_remove::<Order>("1", flags).await.unwrap());
    assert!(!cache.hash_remove::<Order>("1", flags).await.unwrap());
    assert_eq!(
        cache
            .hash_remove_many::<Order>(&["2", "3", "99"], flags)
            .await
            .unwrap(),
        2
    );

    let mut rest: Vec<Order> = cache.hash_get_all(flags).await.unwrap();
    rest.sort_by_key(|o| o.id);
    assert_eq!(rest, vec![order(4, "acme"), order(5, "globex")]);

    assert!(cache.hash_drop::<Order>(flags).await.unwrap());
    assert!(!cache.hash_drop::<Order>(flags).await.unwrap());
}

/// Test 4: Different types live in different hashes
#[tokio::test]
async fn test_types_are_isolated() {
    let cache = CacheService::new(InMemoryBackend::new());
    let flags = CommandFlags::None;

    let session = Session {
        token: uuid::Uuid::now_v7(),
        user_id: "u1".to_string(),
    };
    cache.hash_set(&[order(1, "acme")], flags).await.unwrap();
    cache.hash_set(&[session.clone()], flags).await.unwrap();

    assert_eq!(cache.backend().hlen("h_Order").await, 1);
    assert_eq!(cache.backend().hlen("sessions").await, 1);

    let found: Option<Session> = cache
        .hash_get(&session.token.to_string(), flags)
        .await
        .unwrap();
    assert_eq!(found, Some(session));

    cache.hash_drop::<Order>(flags).await.unwrap();
    assert_eq!(cache.backend().hlen("sessions").await, 1);
}

/// Test 5: Corrupted hash payloads surface as codec errors
#[tokio::test]
async fn test_corrupted_payload_fails_whole_read() {
    let cache = CacheService::new(InMemoryBackend::new());
    let flags = CommandFlags::None;

    cache
        .hash_set(&[order(1, "acme"), order(2, "acme")], flags)
        .await
        .unwrap();
    cache
        .backend()
        .hset("h_Order", "3", b"not an envelope".to_vec(), flags)
        .await
        .unwrap();

    let err = cache.hash_get_all::<Order>(flags).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Codec);

    let err = cache.hash_get::<Order>("3", flags).await.unwrap_err();
    assert!(err.is_codec());

    // Intact fields are still readable one at a time
    let one: Option<Order> = cache.hash_get("1", flags).await.unwrap();
    assert_eq!(one, Some(order(1, "acme")));
}

/// Test 6: Store errors pass through untouched
#[tokio::test]
async fn test_store_errors_pass_through() {
    let cache = CacheService::new(InMemoryBackend::new());
    let flags = CommandFlags::None;

    // A string value squatting on the hash name
    cache.set_raw("h_Order", b"x".to_vec(), None, flags).await.unwrap();

    let err = cache
        .hash_set(&[order(1, "acme")], flags)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BackendError(_)));
    assert_eq!(err.kind(), ErrorKind::Backend);
}

/// Test 7: Fire-and-forget is accepted by every operation
#[tokio::test]
async fn test_fire_and_forget_flags() {
    let cache = CacheService::new(InMemoryBackend::new());
    let flags = CommandFlags::FireAndForget;

    cache.hash_set(&[order(1, "acme")], flags).await.unwrap();
    cache.hash_append(&order(2, "acme"), flags).await.unwrap();
    cache.set("k", &1u32, None, flags).await.unwrap();

    // The in-memory store applies commands before returning
    let all: Vec<Order> = cache.hash_get_all(CommandFlags::None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(
        cache.get::<u32>("k", CommandFlags::None).await.unwrap(),
        Some(1)
    );
}

/// Test 8: Concurrent writers through cloned services
#[tokio::test]
async fn test_concurrent_appends() {
    let cache = CacheService::new(InMemoryBackend::new());

    let handles: Vec<_> = (0..20u64)
        .map(|i| {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .hash_append(&order(i, "concurrent"), CommandFlags::None)
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.expect("Task failed").expect("Append failed");
    }

    let all: Vec<Order> = cache.hash_get_all(CommandFlags::None).await.unwrap();
    assert_eq!(all.len(), 20);
}
