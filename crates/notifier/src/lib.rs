//! Noticewatch Notifier
//!
//! Delivery side of the bot:
//! - `Notifier` trait used by the pipeline
//! - Telegram Bot API implementation
//! - Recording and log-only implementations for tests and dry runs
//! - Message rendering

pub mod render;
pub mod telegram;

pub use render::{render_heartbeat, render_notice};
pub use telegram::{BotUser, TelegramNotifier};

use async_trait::async_trait;
use noticewatch_common::errors::{AppError, Result};
use noticewatch_common::models::Notice;
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::info;

/// Sends text to the configured chat
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, text: &str) -> Result<()>;

    /// Render and send one notice
    async fn send_notice(&self, notice: &Notice) -> Result<()> {
        self.send_message(&render_notice(notice)).await
    }

    /// Implementation name for logs
    fn name(&self) -> &'static str;
}

/// Keeps every sent message in memory
///
/// Messages containing a string registered with `fail_when_contains` are
/// rejected with a delivery error instead of being recorded.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_when_contains(&self, needle: impl Into<String>) {
        self.failing.lock().await.insert(needle.into());
    }

    pub async fn clear_failures(&self) {
        self.failing.lock().await.clear();
    }

    pub async fn messages(&self) -> Vec<String> {
        self.sent.lock().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, text: &str) -> Result<()> {
        let rejected = self
            .failing
            .lock()
            .await
            .iter()
            .any(|needle| text.contains(needle.as_str()));
        if rejected {
            return Err(AppError::Delivery {
                message: "forced failure".to_string(),
            });
        }

        self.sent.lock().await.push(text.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Writes messages to the log instead of a chat
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_message(&self, text: &str) -> Result<()> {
        info!(message = %text, "Dry run, message not sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
