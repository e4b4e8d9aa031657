//! Redis store backend.

use super::CacheBackend;
use crate::error::{Error, Result};
use crate::flags::CommandFlags;
use crate::hash::HashEntry;
use deadpool_redis::{redis::AsyncCommands, Config, Connection, Pool, PoolConfig, Runtime};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// Pool statistics information.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Default Redis connection pool size.
/// Formula: (CPU cores × 2) + 1
/// For 8-core systems: 16 connections is optimal
/// Override with REDIS_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: u32 = 16;

/// Environment variable holding the connection string.
pub const REDIS_URL_ENV: &str = "REDIS_URL";

/// Environment variable overriding the pool size.
pub const REDIS_POOL_SIZE_ENV: &str = "REDIS_POOL_SIZE";

/// Configuration for Redis backend.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u32,
    pub pool_size: u32,
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Build Redis connection string.
    pub fn connection_string(&self) -> String {
        if let Some(password) = &self.password {
            if let Some(username) = &self.username {
                format!(
                    "redis://{}:{}@{}:{}/{}",
                    username, password, self.host, self.port, self.database
                )
            } else {
                format!(
                    "redis://default:{}@{}:{}/{}",
                    password, self.host, self.port, self.database
                )
            }
        } else {
            format!("redis://{}:{}/{}", self.host, self.port, self.database)
        }
    }
}

/// Pool size from `REDIS_POOL_SIZE`, falling back to the default.
fn pool_size_from_env() -> u32 {
    std::env::var(REDIS_POOL_SIZE_ENV)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_POOL_SIZE)
}

/// Redis backend with connection pooling and async operations.
///
/// The pool is created once, up front, and shared by cloning the backend.
/// Connections are opened lazily by the pool as commands need them.
///
/// Commands issued with [`CommandFlags::FireAndForget`] are spawned on the
/// tokio runtime; the call returns the neutral value at once and failures
/// are logged.
///
/// # Example
///
/// ```no_run
/// # use hashset_cache::backend::{CacheBackend, RedisBackend, RedisConfig};
/// # use hashset_cache::{CommandFlags, Result};
/// # async fn example() -> Result<()> {
/// let backend = RedisBackend::new(RedisConfig::default()).await?;
///
/// backend.hset("h_User", "u1", b"alice".to_vec(), CommandFlags::None).await?;
/// let value = backend.hget("h_User", "u1", CommandFlags::None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// Create new Redis backend from configuration.
    ///
    /// # Errors
    /// Returns `Error::ConfigurationError` if the pool cannot be created.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let pool = Self::create_pool(
            &config.connection_string(),
            config.pool_size,
            Some(config.connection_timeout),
        )?;

        info!(
            "✓ Redis backend initialized: {}:{}",
            config.host, config.port
        );

        Ok(RedisBackend { pool })
    }

    /// Create from connection string directly.
    ///
    /// Pool size is determined by:
    /// 1. `REDIS_POOL_SIZE` environment variable (if set)
    /// 2. `DEFAULT_POOL_SIZE` constant (16)
    ///
    /// # Errors
    /// Returns `Error::ConfigurationError` if the pool cannot be created.
    pub async fn from_connection_string(conn_str: &str) -> Result<Self> {
        let pool_size = pool_size_from_env();
        let pool = Self::create_pool(conn_str, pool_size, None)?;

        info!(
            "✓ Redis backend initialized from connection string (pool size: {})",
            pool_size
        );

        Ok(RedisBackend { pool })
    }

    /// Create from the `REDIS_URL` environment variable.
    ///
    /// # Errors
    /// Returns `Error::ConfigurationError` if `REDIS_URL` is unset or the pool
    /// cannot be created.
    pub async fn from_env() -> Result<Self> {
        let conn_str = std::env::var(REDIS_URL_ENV).map_err(|_| {
            Error::ConfigurationError(format!("{} is not set", REDIS_URL_ENV))
        })?;
        Self::from_connection_string(&conn_str).await
    }

    fn create_pool(conn_str: &str, pool_size: u32, timeout: Option<Duration>) -> Result<Pool> {
        let mut cfg = Config::from_url(conn_str);
        let mut pool_cfg = PoolConfig::new(pool_size as usize);
        if let Some(timeout) = timeout {
            pool_cfg.timeouts.wait = Some(timeout);
            pool_cfg.timeouts.create = Some(timeout);
        }
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            Error::ConfigurationError(format!("Failed to create Redis pool: {}", e))
        })
    }

    /// Get current pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            connections: status.size as u32,
            idle_connections: status.available as u32,
        }
    }

    async fn connection(pool: &Pool) -> Result<Connection> {
        pool.get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))
    }

    /// Run `command` in the background; only its failure is reported, in the log.
    fn detach<F, T>(&self, command: &'static str, key: &str, command_future: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let key = key.to_string();
        tokio::spawn(async move {
            match command_future.await {
                Ok(_) => debug!("✓ Redis {} {} (fire-and-forget)", command, key),
                Err(e) => warn!("⚠ Redis {} {} (fire-and-forget) failed: {}", command, key, e),
            }
        });
    }
}

// Command bodies take the pool and owned arguments so they can run detached.

async fn get_cmd(pool: Pool, key: String) -> Result<Option<Vec<u8>>> {
    let mut conn = RedisBackend::connection(&pool).await?;
    conn.get(&key)
        .await
        .map_err(|e| Error::BackendError(format!("Redis GET failed for key {}: {}", key, e)))
}

/// Expiry in whole milliseconds; Redis rejects a zero expiry.
fn expiry_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

async fn set_cmd(pool: Pool, key: String, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
    let mut conn = RedisBackend::connection(&pool).await?;

    match ttl {
        Some(duration) => {
            let millis = expiry_millis(duration);
            conn.pset_ex::<_, _, ()>(&key, value, millis)
                .await
                .map_err(|e| {
                    Error::BackendError(format!("Redis PSETEX failed for key {}: {}", key, e))
                })?;
            debug!("✓ Redis SET {} (TTL: {}ms)", key, millis);
        }
        None => {
            conn.set::<_, _, ()>(&key, value).await.map_err(|e| {
                Error::BackendError(format!("Redis SET failed for key {}: {}", key, e))
            })?;
            debug!("✓ Redis SET {}", key);
        }
    }

    Ok(())
}

async fn del_cmd(pool: Pool, key: String) -> Result<bool> {
    let mut conn = RedisBackend::connection(&pool).await?;
    let removed: i64 = conn
        .del(&key)
        .await
        .map_err(|e| Error::BackendError(format!("Redis DEL failed for key {}: {}", key, e)))?;
    debug!("✓ Redis DELETE {} -> {}", key, removed);
    Ok(removed > 0)
}

async fn hset_many_cmd(pool: Pool, key: String, items: Vec<(String, Vec<u8>)>) -> Result<()> {
    let mut conn = RedisBackend::connection(&pool).await?;
    conn.hset_multiple::<_, _, _, ()>(&key, &items)
        .await
        .map_err(|e| Error::BackendError(format!("Redis HSET failed for key {}: {}", key, e)))?;
    debug!("✓ Redis HSET {} ({} fields)", key, items.len());
    Ok(())
}

async fn hget_all_cmd(pool: Pool, key: String) -> Result<Vec<HashEntry>> {
    let mut conn = RedisBackend::connection(&pool).await?;
    let fields: BTreeMap<String, Vec<u8>> = conn.hgetall(&key).await.map_err(|e| {
        Error::BackendError(format!("Redis HGETALL failed for key {}: {}", key, e))
    })?;
    debug!("✓ Redis HGETALL {} -> {} fields", key, fields.len());
    Ok(fields.into_iter().map(HashEntry::from).collect())
}

async fn hget_cmd(pool: Pool, key: String, field: String) -> Result<Option<Vec<u8>>> {
    let mut conn = RedisBackend::connection(&pool).await?;
    let value: Option<Vec<u8>> = conn.hget(&key, &field).await.map_err(|e| {
        Error::BackendError(format!("Redis HGET failed for key {} field {}: {}", key, field, e))
    })?;

    if value.is_some() {
        debug!("✓ Redis HGET {} {} -> HIT", key, field);
    } else {
        debug!("✓ Redis HGET {} {} -> MISS", key, field);
    }
    Ok(value)
}

async fn hset_cmd(pool: Pool, key: String, field: String, value: Vec<u8>) -> Result<bool> {
    let mut conn = RedisBackend::connection(&pool).await?;
    let created: i64 = conn.hset(&key, &field, value).await.map_err(|e| {
        Error::BackendError(format!("Redis HSET failed for key {} field {}: {}", key, field, e))
    })?;
    debug!("✓ Redis HSET {} {} (new: {})", key, field, created > 0);
    Ok(created > 0)
}

async fn hdel_cmd(pool: Pool, key: String, fields: Vec<String>) -> Result<u64> {
    let mut conn = RedisBackend::connection(&pool).await?;
    let removed: i64 = conn
        .hdel(&key, &fields)
        .await
        .map_err(|e| Error::BackendError(format!("Redis HDEL failed for key {}: {}", key, e)))?;
    debug!("✓ Redis HDEL {} ({} fields) -> {}", key, fields.len(), removed);
    Ok(removed.max(0) as u64)
}

impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str, _flags: CommandFlags) -> Result<Option<Vec<u8>>> {
        // A read has nothing to return without its reply, so flags do not apply
        get_cmd(self.pool.clone(), key.to_string()).await
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        flags: CommandFlags,
    ) -> Result<bool> {
        let command = set_cmd(self.pool.clone(), key.to_string(), value, ttl);
        if flags.is_fire_and_forget() {
            self.detach("SET", key, command);
            return Ok(false);
        }
        command.await?;
        Ok(true)
    }

    async fn delete(&self, key: &str, flags: CommandFlags) -> Result<bool> {
        let command = del_cmd(self.pool.clone(), key.to_string());
        if flags.is_fire_and_forget() {
            self.detach("DEL", key, command);
            return Ok(false);
        }
        command.await
    }

    async fn hset_many(
        &self,
        key: &str,
        entries: &[HashEntry],
        flags: CommandFlags,
    ) -> Result<()> {
        // HSET without fields is a protocol error
        if entries.is_empty() {
            return Ok(());
        }

        let items: Vec<(String, Vec<u8>)> = entries.iter().cloned().map(Into::into).collect();
        let command = hset_many_cmd(self.pool.clone(), key.to_string(), items);
        if flags.is_fire_and_forget() {
            self.detach("HSET", key, command);
            return Ok(());
        }
        command.await
    }

    async fn hget_all(&self, key: &str, _flags: CommandFlags) -> Result<Vec<HashEntry>> {
        hget_all_cmd(self.pool.clone(), key.to_string()).await
    }

    async fn hget(
        &self,
        key: &str,
        field: &str,
        _flags: CommandFlags,
    ) -> Result<Option<Vec<u8>>> {
        hget_cmd(self.pool.clone(), key.to_string(), field.to_string()).await
    }

    async fn hset(
        &self,
        key: &str,
        field: &str,
        value: Vec<u8>,
        flags: CommandFlags,
    ) -> Result<bool> {
        let command = hset_cmd(self.pool.clone(), key.to_string(), field.to_string(), value);
        if flags.is_fire_and_forget() {
            self.detach("HSET", key, command);
            return Ok(false);
        }
        command.await
    }

    async fn hdel(&self, key: &str, field: &str, flags: CommandFlags) -> Result<bool> {
        let command = hdel_cmd(self.pool.clone(), key.to_string(), vec![field.to_string()]);
        if flags.is_fire_and_forget() {
            self.detach("HDEL", key, command);
            return Ok(false);
        }
        Ok(command.await? > 0)
    }

    async fn hdel_many(&self, key: &str, fields: &[&str], flags: CommandFlags) -> Result<u64> {
        if fields.is_empty() {
            return Ok(0);
        }

        let fields = fields.iter().map(|f| f.to_string()).collect();
        let command = hdel_cmd(self.pool.clone(), key.to_string(), fields);
        if flags.is_fire_and_forget() {
            self.detach("HDEL", key, command);
            return Ok(0);
        }
        command.await
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = Self::connection(&self.pool).await?;

        // Use deadpool_redis::redis::cmd for PING command
        let pong: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis PING failed: {}", e)))?;

        Ok(pong == "PONG" || pong.contains("PONG"))
    }

    fn system(&self) -> &'static str {
        "redis"
    }
}
