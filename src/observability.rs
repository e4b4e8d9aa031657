//! Observability for store commands.
//!
//! Two pieces live here:
//!
//! - **Metrics (`CacheMetrics`)**: hooks for hits, misses, writes, deletes and
//!   errors, each with the command's duration
//! - **Tracing (`InstrumentedBackend`)**: a [`CacheBackend`] decorator that runs
//!   every store command inside a `tracing` span and reports it to a
//!   `CacheMetrics` recorder
//!
//! The key resolver, codec and hash mapper never emit spans themselves.
//! [`CacheService`](crate::CacheService) opens one `cache.operation` span per
//! call, with `cache.step` children around conversion and encoding; command
//! spans from this decorator nest inside it.
//!
//! # Example
//!
//! ```
//! use hashset_cache::backend::InMemoryBackend;
//! use hashset_cache::observability::{CacheMetrics, InstrumentedBackend};
//! use hashset_cache::CacheService;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct LatencyLog;
//!
//! impl CacheMetrics for LatencyLog {
//!     fn record_hit(&self, key: &str, duration: Duration) {
//!         println!("hit {} in {:?}", key, duration);
//!     }
//! }
//!
//! let backend = InstrumentedBackend::new(InMemoryBackend::new())
//!     .with_metrics(Arc::new(LatencyLog));
//! let cache = CacheService::new(backend);
//! ```
//!
//! # Span fields
//!
//! | field | value |
//! |-------|-------|
//! | `db.system` | store name from [`CacheBackend::system`], unless overridden with `with_system` |
//! | `db.operation` | command name (`GET`, `HSET`, `HGETALL`, ...) |
//! | `db.key` | key the command addresses |
//! | `db.field` | hash field, for single-field commands |
//! | `error` | error message, recorded on failure |

use crate::backend::CacheBackend;
use crate::error::Result;
use crate::flags::CommandFlags;
use crate::hash::HashEntry;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::field::{display, Empty};
use tracing::{info_span, Instrument, Span};

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Record a cache hit.
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    /// Record a cache miss.
    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    /// Record a cache set operation.
    fn record_set(&self, key: &str, duration: Duration) {
        debug!("Cache SET: {} took {:?}", key, duration);
    }

    /// Record a cache delete operation.
    fn record_delete(&self, key: &str, duration: Duration) {
        debug!("Cache DELETE: {} took {:?}", key, duration);
    }

    /// Record an error.
    fn record_error(&self, key: &str, error: &str) {
        warn!("Cache ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_set(&self, _key: &str, _duration: Duration) {}
    fn record_delete(&self, _key: &str, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// How a successful command is reported to `CacheMetrics`.
enum Outcome<T> {
    /// Read; the function tells a hit from a miss
    Read(fn(&T) -> bool),
    Write,
    Delete,
}

/// Backend decorator adding a `tracing` span and metrics to every command.
///
/// Results, errors and flags pass through untouched.
#[derive(Clone)]
pub struct InstrumentedBackend<B: CacheBackend> {
    inner: B,
    metrics: Arc<dyn CacheMetrics>,
    system: &'static str,
}

impl<B: CacheBackend> InstrumentedBackend<B> {
    /// Wrap a backend with no-op metrics.
    pub fn new(inner: B) -> Self {
        let system = inner.system();
        InstrumentedBackend {
            inner,
            metrics: Arc::new(NoOpMetrics),
            system,
        }
    }

    /// Report commands to a metrics recorder.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Override the `db.system` span field.
    pub fn with_system(mut self, system: &'static str) -> Self {
        self.system = system;
        self
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn span(&self, command: &'static str, key: &str) -> Span {
        info_span!(
            "cache.command",
            db.system = self.system,
            db.operation = command,
            db.key = key,
            db.field = Empty,
            error = Empty,
        )
    }

    async fn observe<T, F>(
        &self,
        span: Span,
        key: &str,
        outcome: Outcome<T>,
        command_future: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let result = command_future.instrument(span.clone()).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(value) => match outcome {
                Outcome::Read(is_hit) if is_hit(value) => self.metrics.record_hit(key, elapsed),
                Outcome::Read(_) => self.metrics.record_miss(key, elapsed),
                Outcome::Write => self.metrics.record_set(key, elapsed),
                Outcome::Delete => self.metrics.record_delete(key, elapsed),
            },
            Err(e) => {
                span.record("error", display(e));
                self.metrics.record_error(key, &e.to_string());
            }
        }

        result
    }
}

impl<B: CacheBackend> CacheBackend for InstrumentedBackend<B> {
    async fn get(&self, key: &str, flags: CommandFlags) -> Result<Option<Vec<u8>>> {
        let span = self.span("GET", key);
        self.observe(
            span,
            key,
            Outcome::Read(Option::is_some),
            self.inner.get(key, flags),
        )
        .await
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        flags: CommandFlags,
    ) -> Result<bool> {
        let span = self.span("SET", key);
        self.observe(
            span,
            key,
            Outcome::Write,
            self.inner.set(key, value, ttl, flags),
        )
        .await
    }

    async fn delete(&self, key: &str, flags: CommandFlags) -> Result<bool> {
        let span = self.span("DEL", key);
        self.observe(span, key, Outcome::Delete, self.inner.delete(key, flags))
            .await
    }

    async fn hset_many(
        &self,
        key: &str,
        entries: &[HashEntry],
        flags: CommandFlags,
    ) -> Result<()> {
        let span = self.span("HSET", key);
        self.observe(
            span,
            key,
            Outcome::Write,
            self.inner.hset_many(key, entries, flags),
        )
        .await
    }

    async fn hget_all(&self, key: &str, flags: CommandFlags) -> Result<Vec<HashEntry>> {
        let span = self.span("HGETALL", key);
        self.observe(
            span,
            key,
            Outcome::Read(|entries: &Vec<HashEntry>| !entries.is_empty()),
            self.inner.hget_all(key, flags),
        )
        .await
    }

    async fn hget(
        &self,
        key: &str,
        field: &str,
        flags: CommandFlags,
    ) -> Result<Option<Vec<u8>>> {
        let span = self.span("HGET", key);
        span.record("db.field", field);
        self.observe(
            span,
            key,
            Outcome::Read(Option::is_some),
            self.inner.hget(key, field, flags),
        )
        .await
    }

    async fn hset(
        &self,
        key: &str,
        field: &str,
        value: Vec<u8>,
        flags: CommandFlags,
    ) -> Result<bool> {
        let span = self.span("HSET", key);
        span.record("db.field", field);
        self.observe(
            span,
            key,
            Outcome::Write,
            self.inner.hset(key, field, value, flags),
        )
        .await
    }

    async fn hdel(&self, key: &str, field: &str, flags: CommandFlags) -> Result<bool> {
        let span = self.span("HDEL", key);
        span.record("db.field", field);
        self.observe(
            span,
            key,
            Outcome::Delete,
            self.inner.hdel(key, field, flags),
        )
        .await
    }

    async fn hdel_many(&self, key: &str, fields: &[&str], flags: CommandFlags) -> Result<u64> {
        let span = self.span("HDEL", key);
        self.observe(
            span,
            key,
            Outcome::Delete,
            self.inner.hdel_many(key, fields, flags),
        )
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        let span = self.span("PING", "");
        self.observe(
            span,
            "",
            Outcome::Read(|healthy: &bool| *healthy),
            self.inner.health_check(),
        )
        .await
    }

    fn system(&self) -> &'static str {
        self.system
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingMetrics {
        hits: AtomicUsize,
        misses: AtomicUsize,
        sets: AtomicUsize,
        deletes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl CacheMetrics for CountingMetrics {
        fn record_hit(&self, _key: &str, _duration: Duration) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        fn record_miss(&self, _key: &str, _duration: Duration) {
            self.misses.fetch_add(1, Ordering::SeqCst);
        }
        fn record_set(&self, _key: &str, _duration: Duration) {
            self.sets.fetch_add(1, Ordering::SeqCst);
        }
        fn record_delete(&self, _key: &str, _duration: Duration) {
            self.deletes.fetch_add(1, Ordering::SeqCst);
        }
        fn record_error(&self, _key: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn instrumented() -> (InstrumentedBackend<InMemoryBackend>, Arc<CountingMetrics>) {
        let metrics = Arc::new(CountingMetrics::default());
        let backend =
            InstrumentedBackend::new(InMemoryBackend::new()).with_metrics(metrics.clone());
        (backend, metrics)
    }

    #[test]
    fn test_noop_metrics() {
        let metrics = NoOpMetrics;
        metrics.record_hit("key", Duration::from_secs(1));
        metrics.record_miss("key", Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_instrumented_records_reads() {
        let (backend, metrics) = instrumented();
        let flags = CommandFlags::None;

        backend.hget("h", "missing", flags).await.unwrap();
        backend
            .hset("h", "a", vec![1], flags)
            .await
            .expect("Failed to hset");
        backend.hget("h", "a", flags).await.unwrap();
        backend.hget_all("h", flags).await.unwrap();

        assert_eq!(metrics.misses.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.hits.load(Ordering::SeqCst), 2);
        assert_eq!(metrics.sets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_instrumented_passes_results_through() {
        let (backend, metrics) = instrumented();
        let flags = CommandFlags::None;

        assert!(backend.hset("h", "a", vec![1], flags).await.unwrap());
        assert!(!backend.hset("h", "a", vec![2], flags).await.unwrap());
        assert_eq!(backend.hdel_many("h", &["a", "b"], flags).await.unwrap(), 1);
        assert!(!backend.delete("h", flags).await.unwrap());

        assert_eq!(metrics.deletes.load(Ordering::SeqCst), 2);
        assert!(backend.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_instrumented_records_errors() {
        let (backend, metrics) = instrumented();
        let flags = CommandFlags::None;

        backend
            .set("plain", b"v".to_vec(), None, flags)
            .await
            .expect("Failed to set");
        let err = backend.hget_all("plain", flags).await.unwrap_err();

        assert!(err.to_string().contains("WRONGTYPE"));
        assert_eq!(metrics.errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_instrumented_span_fields() {
        let captured = capture::CapturedSpans::default();
        let _guard = tracing::subscriber::set_default(captured.subscriber());

        let backend = InstrumentedBackend::new(InMemoryBackend::new());
        backend
            .hset("h_User", "u1", vec![1], CommandFlags::None)
            .await
            .expect("Failed to hset");
        backend
            .hget_all("h_User", CommandFlags::None)
            .await
            .expect("Failed to hget_all");

        let output = captured.output();
        assert!(output.contains("cache.command"));
        assert!(output.contains("db.system=\"memory\""));
        assert!(output.contains("db.operation=\"HSET\""));
        assert!(output.contains("db.operation=\"HGETALL\""));
        assert!(output.contains("db.key=\"h_User\""));
        assert!(output.contains("db.field=\"u1\""));
        assert!(!output.contains("error="));
    }

    #[tokio::test]
    async fn test_instrumented_records_error_on_span() {
        let captured = capture::CapturedSpans::default();
        let _guard = tracing::subscriber::set_default(captured.subscriber());

        let backend = InstrumentedBackend::new(InMemoryBackend::new());
        backend
            .set("plain", b"v".to_vec(), None, CommandFlags::None)
            .await
            .expect("Failed to set");
        backend
            .hget("plain", "a", CommandFlags::None)
            .await
            .unwrap_err();

        let output = captured.output();
        let failed = output
            .lines()
            .find(|line| line.contains("db.operation=\"HGET\""))
            .expect("HGET span not closed");
        assert!(failed.contains("error=Backend error: WRONGTYPE"));
    }

    #[test]
    fn test_system_follows_backend_unless_overridden() {
        let backend = InstrumentedBackend::new(InMemoryBackend::new());
        assert_eq!(backend.system(), "memory");

        let backend = backend.with_system("redis");
        assert_eq!(backend.system(), "redis");
    }
}
