//! Valkey (Redis-protocol) adapters: the presence-only rate-limit gate, the
//! serialized object cache, and the revoked-token set. All three are plain
//! key commands over one deadpool pool; concurrent writers race with
//! last-write-wins, which is fine for regenerable data.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::Pool;

use domains::{AppError, ObjectCache, RateLimitGate, Result, TokenBlacklist};

fn rate_limit_key(user_id: i64, kind: &str) -> String {
    format!("rate_limit:{user_id}:{kind}")
}

fn blacklist_key(token: &str) -> String {
    format!("jwt_blacklist:{token}")
}

/// Explicit-mark cooldown gate: `SETEX` on mark, `EXISTS` on check. The
/// key's TTL encodes the window, so `is_limited` ignores it.
#[derive(Clone)]
pub struct ValkeyRateLimitGate {
    pool: Pool,
}

impl ValkeyRateLimitGate {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitGate for ValkeyRateLimitGate {
    async fn is_limited(&self, user_id: i64, kind: &str, _window: Duration) -> Result<bool> {
        let mut conn = self.pool.get().await.map_err(AppError::internal)?;
        conn.exists(rate_limit_key(user_id, kind))
            .await
            .map_err(AppError::internal)
    }

    async fn mark(&self, user_id: i64, kind: &str, window: Duration) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(AppError::internal)?;
        let _: () = conn
            .set_ex(rate_limit_key(user_id, kind), "1", window.as_secs())
            .await
            .map_err(AppError::internal)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct ValkeyObjectCache {
    pool: Pool,
}

impl ValkeyObjectCache {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ObjectCache for ValkeyObjectCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.pool.get().await.map_err(AppError::internal)?;
        conn.get(key).await.map_err(AppError::internal)
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(AppError::internal)?;
        match ttl {
            Some(ttl) => {
                let _: () = conn
                    .set_ex(key, value, ttl.as_secs())
                    .await
                    .map_err(AppError::internal)?;
            }
            None => {
                let _: () = conn.set(key, value).await.map_err(AppError::internal)?;
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct ValkeyTokenBlacklist {
    pool: Pool,
}

impl ValkeyTokenBlacklist {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenBlacklist for ValkeyTokenBlacklist {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(AppError::internal)?;
        let _: () = conn
            .set_ex(blacklist_key(token), "1", ttl.as_secs().max(1))
            .await
            .map_err(AppError::internal)?;
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool> {
        let mut conn = self.pool.get().await.map_err(AppError::internal)?;
        conn.exists(blacklist_key(token))
            .await
            .map_err(AppError::internal)
    }
}
