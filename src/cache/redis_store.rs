// src/cache/redis_store.rs
//! Redis-backed `KeyStore` for sharing cached keyword results across processes.

use super::{KeyStore, KeyTtl};
use crate::error::Result;
use anyhow::{anyhow, Result as AnyhowResult};
use async_trait::async_trait;
use log::{debug, error, info};
use redis::{aio::ConnectionManager, AsyncCommands};
use std::fmt; // For manual Debug impl

/// Uses a `ConnectionManager` for automatic reconnection.
#[derive(Clone)]
pub struct RedisKeyStore {
    conn_manager: ConnectionManager,
    redis_url: String, // Store for debug purposes
}

impl fmt::Debug for RedisKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisKeyStore")
            .field("redis_url", &self.redis_url)
            .field("conn_manager", &"<ConnectionManager instance>")
            .finish()
    }
}

impl RedisKeyStore {
    pub async fn new(redis_url: &str) -> AnyhowResult<Self> {
        info!("Initializing Redis connection manager for URL: {}", redis_url);
        let client = redis::Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to create Redis ConnectionManager: {}", e);
            anyhow!("Failed to create Redis ConnectionManager: {}", e)
        })?;
        info!("Redis ConnectionManager initialized successfully");
        Ok(Self {
            conn_manager,
            redis_url: redis_url.to_string(),
        })
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{}*", escape_glob(prefix));
        let mut conn = self.conn_manager.clone();
        let mut keys = Vec::new();
        let mut iter = conn.scan_match::<_, String>(&pattern).await?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}

/// Escapes Redis glob metacharacters so a prefix matches literally.
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl KeyStore for RedisKeyStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        debug!("Attempting to GET cache for key: {}", key);
        let mut conn = self.conn_manager.clone();
        Ok(conn.get::<_, Option<String>>(key).await?)
    }

    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        debug!("Attempting to DEL cache for key: {}", key);
        let mut conn = self.conn_manager.clone();
        let count: i32 = conn.del(key).await?;
        Ok(count > 0)
    }

    async fn clear(&self, prefix: &str) -> Result<usize> {
        let keys = self.keys_with_prefix(prefix).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn_manager.clone();
        let removed: usize = conn.del(&keys).await?;
        info!("Cleared {} Redis keys under prefix '{}'", removed, prefix);
        Ok(removed)
    }

    async fn ttl_listing(&self, prefix: &str) -> Result<Vec<KeyTtl>> {
        let keys = self.keys_with_prefix(prefix).await?;
        let mut conn = self.conn_manager.clone();
        let mut listing = Vec::with_capacity(keys.len());
        for key in keys {
            // -2: key vanished since SCAN, -1: no expiry set
            let ttl: i64 = conn.ttl(&key).await?;
            if ttl >= 0 {
                listing.push(KeyTtl {
                    key,
                    ttl_seconds: ttl as u64,
                });
            }
        }
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_metacharacters_are_escaped() {
        assert_eq!(escape_glob("trending:"), "trending:");
        assert_eq!(escape_glob("a*b?[c]"), "a\\*b\\?\\[c\\]");
    }

    // Requires a local Redis: cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn redis_round_trip() {
        let store = RedisKeyStore::new("redis://127.0.0.1/").await.unwrap();
        store
            .set_raw("trending-test:rust", "payload".to_string(), 30)
            .await
            .unwrap();
        assert_eq!(
            store.get_raw("trending-test:rust").await.unwrap(),
            Some("payload".to_string())
        );
        let listing = store.ttl_listing("trending-test:").await.unwrap();
        assert!(listing.iter().any(|k| k.key == "trending-test:rust" && k.ttl_seconds <= 30));
        assert_eq!(store.clear("trending-test:").await.unwrap(), 1);
        assert_eq!(store.get_raw("trending-test:rust").await.unwrap(), None);
    }
}
