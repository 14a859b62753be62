//! In-process ledger
//!
//! Same contract as the Redis ledger, kept in a map. Used for dry runs and
//! tests; nothing survives a restart.

use super::{DedupLedger, ExpiryPolicy};
use crate::clock::{Clock, SystemClock};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub struct InMemoryLedger {
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
    expiry: ExpiryPolicy,
    clock: Arc<dyn Clock>,
}

impl InMemoryLedger {
    pub fn new(expiry: ExpiryPolicy) -> Self {
        Self::with_clock(expiry, Arc::new(SystemClock))
    }

    pub fn with_clock(expiry: ExpiryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            expiry,
            clock,
        }
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .read()
            .await
            .values()
            .filter(|expires_at| **expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Expiry of a live entry
    pub async fn expires_at(&self, id: &str) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        self.entries
            .read()
            .await
            .get(id)
            .copied()
            .filter(|expires_at| *expires_at > now)
    }
}

#[async_trait]
impl DedupLedger for InMemoryLedger {
    async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.expires_at(id).await.is_some())
    }

    async fn mark_processed(&self, id: &str) -> Result<()> {
        let now = self.clock.now();
        let expires_at = self.expiry.expires_at(now);

        let mut entries = self.entries.write().await;
        entries.retain(|_, exp| *exp > now);
        entries.insert(id.to_string(), expires_at);

        debug!(notice_id = %id, %expires_at, "Ledger mark");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
