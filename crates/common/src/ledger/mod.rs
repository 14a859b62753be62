//! Dedup ledger
//!
//! Remembers which notice ids were already delivered, for a bounded time.
//! Provides:
//! - `DedupLedger` trait with the fail-open `is_processed` policy
//! - `ExpiryPolicy` (next local midnight, or a rolling window)
//! - Redis and in-memory backends

mod memory;
mod redis_store;

pub use memory::InMemoryLedger;
pub use redis_store::{RedisLedger, RedisLedgerConfig};

use crate::errors::Result;
use crate::metrics;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use std::time::Duration;
use tracing::warn;

/// How long a ledger entry lives after insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPolicy {
    /// Until the next midnight at `offset` (one delivery per notice per local day)
    NextLocalMidnight { offset: FixedOffset },
    /// Fixed window from insertion
    Rolling { window: Duration },
}

impl ExpiryPolicy {
    /// Instant at which an entry inserted at `now` disappears
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let fallback = now + chrono::Duration::days(1);
        match self {
            ExpiryPolicy::NextLocalMidnight { offset } => now
                .with_timezone(offset)
                .date_naive()
                .succ_opt()
                .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
                .and_then(|midnight| offset.from_local_datetime(&midnight).single())
                .map(|midnight| midnight.with_timezone(&Utc))
                .unwrap_or(fallback),
            ExpiryPolicy::Rolling { window } => chrono::Duration::from_std(*window)
                .map(|w| now + w)
                .unwrap_or(fallback),
        }
    }

    /// Time-to-live for an entry inserted at `now`, never below one second
    pub fn ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at(now) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
            .max(Duration::from_secs(1))
    }
}

/// Time-bounded record of delivered notice ids
#[async_trait]
pub trait DedupLedger: Send + Sync {
    /// Raw membership query against live entries
    async fn contains(&self, id: &str) -> Result<bool>;

    /// Record `id` with a fresh expiry; re-marking overwrites
    async fn mark_processed(&self, id: &str) -> Result<()>;

    /// Connectivity check
    async fn ping(&self) -> Result<()>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Membership query that never fails.
    ///
    /// A store error answers "not processed": a broken ledger may cause a
    /// duplicate notification but must never silently suppress one.
    async fn is_processed(&self, id: &str) -> bool {
        match self.contains(id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    notice_id = %id,
                    backend = self.backend_name(),
                    error = %e,
                    "Ledger lookup failed, treating notice as unprocessed"
                );
                metrics::record_ledger_error("lookup");
                false
            }
        }
    }
}

/// Ledger key builder
pub mod keys {
    /// `{prefix}:{notice_id}`
    pub fn notice(prefix: &str, notice_id: &str) -> String {
        format!("{}:{}", prefix, notice_id)
    }
}
