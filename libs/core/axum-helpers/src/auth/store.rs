//! Server-side token allow-list and deny-list.

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Storage for issued (whitelisted) and revoked (blacklisted) token ids.
///
/// Entries expire after their TTL; an expired entry behaves as absent.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn whitelist(&self, jti: &str, user_id: &str, ttl_seconds: u64) -> eyre::Result<()>;

    async fn is_whitelisted(&self, jti: &str) -> eyre::Result<bool>;

    async fn blacklist(&self, jti: &str, ttl_seconds: u64) -> eyre::Result<()>;

    async fn is_blacklisted(&self, jti: &str) -> eyre::Result<bool>;

    /// Remove a token from the allow-list.
    async fn revoke(&self, jti: &str) -> eyre::Result<()>;

    /// Readiness probe.
    async fn ping(&self) -> eyre::Result<()>;
}

/// Redis-backed store; keys are `jwt:whitelist:{jti}` and `jwt:blacklist:{jti}`.
#[derive(Clone)]
pub struct RedisAuthStore {
    client: ConnectionManager,
}

impl RedisAuthStore {
    pub fn new(manager: ConnectionManager) -> Self {
        tracing::info!("Redis token store initialized");
        Self { client: manager }
    }
}

fn whitelist_key(jti: &str) -> String {
    format!("jwt:whitelist:{}", jti)
}

fn blacklist_key(jti: &str) -> String {
    format!("jwt:blacklist:{}", jti)
}

#[async_trait]
impl TokenStore for RedisAuthStore {
    async fn whitelist(&self, jti: &str, user_id: &str, ttl_seconds: u64) -> eyre::Result<()> {
        let mut conn = self.client.clone();
        conn.set_ex::<_, _, ()>(whitelist_key(jti), user_id, ttl_seconds)
            .await?;
        Ok(())
    }

    async fn is_whitelisted(&self, jti: &str) -> eyre::Result<bool> {
        let mut conn = self.client.clone();
        let exists: bool = conn.exists(whitelist_key(jti)).await?;
        Ok(exists)
    }

    async fn blacklist(&self, jti: &str, ttl_seconds: u64) -> eyre::Result<()> {
        let mut conn = self.client.clone();
        conn.set_ex::<_, _, ()>(blacklist_key(jti), "1", ttl_seconds.max(1))
            .await?;
        Ok(())
    }

    async fn is_blacklisted(&self, jti: &str) -> eyre::Result<bool> {
        let mut conn = self.client.clone();
        let exists: bool = conn.exists(blacklist_key(jti)).await?;
        Ok(exists)
    }

    async fn revoke(&self, jti: &str) -> eyre::Result<()> {
        let mut conn = self.client.clone();
        conn.del::<_, ()>(whitelist_key(jti)).await?;
        Ok(())
    }

    async fn ping(&self) -> eyre::Result<()> {
        let mut conn = self.client.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        eyre::ensure!(pong == "PONG", "unexpected PING response: {}", pong);
        Ok(())
    }
}

/// Process-local store used when no Redis is configured, and in tests.
#[derive(Clone, Default)]
pub struct InMemoryTokenStore {
    whitelist: Arc<RwLock<HashMap<String, Instant>>>,
    blacklist: Arc<RwLock<HashMap<String, Instant>>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

async fn live(entries: &RwLock<HashMap<String, Instant>>, jti: &str) -> bool {
    entries
        .read()
        .await
        .get(jti)
        .is_some_and(|expires_at| *expires_at > Instant::now())
}

async fn insert(entries: &RwLock<HashMap<String, Instant>>, jti: &str, ttl_seconds: u64) {
    let now = Instant::now();
    let mut entries = entries.write().await;
    entries.retain(|_, expires_at| *expires_at > now);
    entries.insert(jti.to_string(), now + Duration::from_secs(ttl_seconds));
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn whitelist(&self, jti: &str, _user_id: &str, ttl_seconds: u64) -> eyre::Result<()> {
        insert(&self.whitelist, jti, ttl_seconds).await;
        Ok(())
    }

    async fn is_whitelisted(&self, jti: &str) -> eyre::Result<bool> {
        Ok(live(&self.whitelist, jti).await)
    }

    async fn blacklist(&self, jti: &str, ttl_seconds: u64) -> eyre::Result<()> {
        insert(&self.blacklist, jti, ttl_seconds.max(1)).await;
        Ok(())
    }

    async fn is_blacklisted(&self, jti: &str) -> eyre::Result<bool> {
        Ok(live(&self.blacklist, jti).await)
    }

    async fn revoke(&self, jti: &str) -> eyre::Result<()> {
        self.whitelist.write().await.remove(jti);
        Ok(())
    }

    async fn ping(&self) -> eyre::Result<()> {
        Ok(())
    }
}
