//! Noticewatch Worker
//!
//! Wires the crawler, the ledger and the notifier into a scheduled pipeline.

pub mod pipeline;
pub mod schedule;

pub use pipeline::{NoticePipeline, WatchedSource};
pub use schedule::{Schedule, Scheduler};
