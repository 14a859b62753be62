//! Redis-backed ledger
//!
//! Each delivered notice is a `{prefix}:{id}` key holding `"1"` with a TTL,
//! so expiry is Redis' job and nothing is ever deleted by us.

use super::{keys, DedupLedger, ExpiryPolicy};
use crate::clock::{Clock, SystemClock};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::sync::Arc;
use tracing::debug;

const TOMBSTONE: &str = "1";

/// Redis ledger configuration
#[derive(Debug, Clone)]
pub struct RedisLedgerConfig {
    /// Redis URL (redis://host:port)
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: String,
    pub expiry: ExpiryPolicy,
}

impl RedisLedgerConfig {
    pub fn key(&self, id: &str) -> String {
        keys::notice(&self.key_prefix, id)
    }

    /// Seconds for `EX`; never 0, which Redis rejects
    pub fn ttl_secs(&self, now: DateTime<Utc>) -> u64 {
        self.expiry.ttl(now).as_secs().max(1)
    }
}

/// Redis ledger client
pub struct RedisLedger {
    connection: ConnectionManager,
    config: RedisLedgerConfig,
    clock: Arc<dyn Clock>,
}

impl RedisLedger {
    /// Connect to Redis
    pub async fn new(config: RedisLedgerConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn with_clock(config: RedisLedgerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| AppError::Ledger {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Ledger {
                message: format!("Failed to connect to Redis at {}: {}", config.url, e),
            })?;

        Ok(Self {
            connection,
            config,
            clock,
        })
    }

    fn key(&self, id: &str) -> String {
        self.config.key(id)
    }
}

#[async_trait]
impl DedupLedger for RedisLedger {
    async fn contains(&self, id: &str) -> Result<bool> {
        let key = self.key(id);
        let mut conn = self.connection.clone();

        let exists: bool = conn.exists(&key).await.map_err(|e| AppError::Ledger {
            message: format!("Failed to check key '{}': {}", key, e),
        })?;

        debug!(key = %key, exists, "Ledger lookup");
        Ok(exists)
    }

    async fn mark_processed(&self, id: &str) -> Result<()> {
        let key = self.key(id);
        let ttl_secs = self.config.ttl_secs(self.clock.now());
        let mut conn = self.connection.clone();

        // SET overwrites, so re-marking refreshes the expiry and never duplicates
        let _: () = conn
            .set_ex(&key, TOMBSTONE, ttl_secs)
            .await
            .map_err(|e| AppError::Ledger {
                message: format!("Failed to set key '{}': {}", key, e),
            })?;

        debug!(key = %key, ttl_secs, "Ledger mark");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| AppError::Ledger {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
