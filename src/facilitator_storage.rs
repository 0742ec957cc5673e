//! Nonce ledger backing facilitator replay protection
//!
//! A proof is single-use: settlement claims its authorization nonce and any later
//! settlement of the same proof finds the nonce taken. Claiming is an atomic
//! insert-if-absent so two concurrent settlements of one proof cannot both win.

use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// How long a claimed nonce is remembered, in seconds
///
/// Longer than any authorization window a facilitator accepts, so a proof cannot
/// outlive its ledger entry.
pub const NONCE_TTL_SECS: u64 = 86_400;

/// Storage for consumed authorization nonces
#[async_trait]
pub trait NonceStorage: Send + Sync {
    /// Check if a nonce has been consumed
    async fn has_nonce(&self, nonce: &str) -> Result<bool>;

    /// Claim a nonce; `false` if it was already claimed
    async fn mark_nonce(&self, nonce: &str) -> Result<bool>;
}

/// In-memory ledger; lost on restart
///
/// Entries expire after the TTL like the Redis backend's, and expired entries are
/// pruned on every claim.
#[derive(Debug, Clone)]
pub struct InMemoryStorage {
    nonces: Arc<RwLock<HashMap<String, Instant>>>,
    ttl: Duration,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::with_ttl(Duration::from_secs(NONCE_TTL_SECS))
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            nonces: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Number of remembered nonces, expired ones included until the next claim
    pub async fn len(&self) -> usize {
        self.nonces.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nonces.read().await.is_empty()
    }
}

#[async_trait]
impl NonceStorage for InMemoryStorage {
    async fn has_nonce(&self, nonce: &str) -> Result<bool> {
        let nonces = self.nonces.read().await;
        Ok(nonces
            .get(nonce)
            .is_some_and(|claimed| claimed.elapsed() < self.ttl))
    }

    async fn mark_nonce(&self, nonce: &str) -> Result<bool> {
        let mut nonces = self.nonces.write().await;
        let ttl = self.ttl;
        nonces.retain(|_, claimed| claimed.elapsed() < ttl);

        if nonces.contains_key(nonce) {
            return Ok(false);
        }
        nonces.insert(nonce.to_string(), Instant::now());
        Ok(true)
    }
}


#[cfg(feature = "redis")]
pub mod redis_storage {
    use super::{NonceStorage, Result, NONCE_TTL_SECS};
    use crate::X402Error;
    use redis::{aio::MultiplexedConnection, AsyncCommands, Client};

    /// Redis ledger, shared by every facilitator instance pointing at the same server
    #[derive(Debug, Clone)]
    pub struct RedisStorage {
        client: Client,
        key_prefix: String,
    }

    impl RedisStorage {
        /// `redis_url` e.g. "redis://localhost:6379"; `key_prefix` defaults to "x402:nonce:"
        pub async fn new(redis_url: &str, key_prefix: Option<&str>) -> Result<Self> {
            let client = Client::open(redis_url)
                .map_err(|e| X402Error::config(format!("Invalid Redis URL: {}", e)))?;

            let storage = Self {
                client,
                key_prefix: key_prefix.unwrap_or("x402:nonce:").to_string(),
            };
            // Fail at startup rather than on the first settlement
            storage.connection().await?;
            Ok(storage)
        }

        fn make_key(&self, nonce: &str) -> String {
            format!("{}{}", self.key_prefix, nonce)
        }

        async fn connection(&self) -> Result<MultiplexedConnection> {
            self.client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| X402Error::storage(format!("Failed to get Redis connection: {}", e)))
        }
    }

    #[async_trait::async_trait]
    impl NonceStorage for RedisStorage {
        async fn has_nonce(&self, nonce: &str) -> Result<bool> {
            let mut conn = self.connection().await?;
            conn.exists(self.make_key(nonce))
                .await
                .map_err(|e| X402Error::storage(format!("Redis EXISTS failed: {}", e)))
        }

        async fn mark_nonce(&self, nonce: &str) -> Result<bool> {
            let mut conn = self.connection().await?;
            // SET NX replies OK when the key was written and nil when it already existed
            let reply: Option<String> = redis::cmd("SET")
                .arg(self.make_key(nonce))
                .arg("1")
                .arg("NX")
                .arg("EX")
                .arg(NONCE_TTL_SECS)
                .query_async(&mut conn)
                .await
                .map_err(|e| X402Error::storage(format!("Redis SET NX failed: {}", e)))?;
            Ok(reply.is_some())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::env;

        /// Skip when no Redis server is reachable
        async fn storage_or_skip() -> Option<RedisStorage> {
            let redis_url =
                env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
            let prefix = format!("test:{}:", uuid::Uuid::new_v4());
            match RedisStorage::new(&redis_url, Some(&prefix)).await {
                Ok(storage) => Some(storage),
                Err(_) => {
                    println!("Skipping Redis test: Redis not available at {}", redis_url);
                    None
                }
            }
        }

        #[tokio::test]
        async fn test_redis_storage_claim_once() {
            let Some(storage) = storage_or_skip().await else {
                return;
            };

            assert!(!storage.has_nonce("n1").await.unwrap());
            assert!(storage.mark_nonce("n1").await.unwrap());
            assert!(!storage.mark_nonce("n1").await.unwrap());
            assert!(storage.has_nonce("n1").await.unwrap());
        }

        #[tokio::test]
        async fn test_redis_storage_ttl() {
            let Some(storage) = storage_or_skip().await else {
                return;
            };

            storage.mark_nonce("ttl").await.unwrap();
            let mut conn = storage.connection().await.unwrap();
            let ttl: i64 = conn.ttl(storage.make_key("ttl")).await.unwrap();
            assert!(ttl > 0 && ttl <= NONCE_TTL_SECS as i64);
        }
    }
}
