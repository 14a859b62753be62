//! Outcome of one pipeline run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-source outcome
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: String,
    /// Rows dated today that yielded a notice
    pub scraped: usize,
    /// Notices whose title matched a keyword
    pub matched: usize,
    /// Matched notices skipped because the ledger already had them
    pub already_seen: usize,
    /// Ids delivered and marked this run, in delivery order
    pub delivered: Vec<String>,
    /// Ids whose delivery failed; left unmarked for the next run
    pub failed_deliveries: Vec<String>,
    /// Source-level failure (fetch or parse); nothing else was attempted
    pub error: Option<String>,
}

impl SourceReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn failed(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Merged outcome of a run across all sources
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// In configuration order
    pub sources: Vec<SourceReport>,
    pub heartbeat_sent: bool,
}

impl DeliveryReport {
    pub fn total_delivered(&self) -> usize {
        self.sources.iter().map(|s| s.delivered.len()).sum()
    }

    pub fn total_failed_deliveries(&self) -> usize {
        self.sources.iter().map(|s| s.failed_deliveries.len()).sum()
    }

    pub fn failed_sources(&self) -> Vec<&str> {
        self.sources
            .iter()
            .filter(|s| s.is_failed())
            .map(|s| s.source.as_str())
            .collect()
    }

    /// True when nothing new was delivered anywhere
    pub fn is_empty_run(&self) -> bool {
        self.total_delivered() == 0
    }

    /// True when there was at least one source and every one of them failed
    pub fn all_sources_failed(&self) -> bool {
        !self.sources.is_empty() && self.sources.iter().all(SourceReport::is_failed)
    }

    pub fn delivered_ids(&self) -> impl Iterator<Item = &str> {
        self.sources
            .iter()
            .flat_map(|s| s.delivered.iter().map(String::as_str))
    }
}
