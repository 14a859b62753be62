//! Noticewatch Common Library
//!
//! Shared code for the Noticewatch crates including:
//! - Notice and report models
//! - Error types and handling
//! - Configuration management
//! - The dedup ledger (Redis and in-memory)
//! - Clock abstraction
//! - Metrics and observability

pub mod clock;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod metrics;
pub mod models;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use ledger::DedupLedger;
pub use models::{DeliveryReport, Notice, NoticeCategory, SourceReport};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
