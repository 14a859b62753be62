//! Configuration management for Noticewatch
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values
//!
//! Everything is validated once after loading; a config that fails validation
//! never reaches the scheduler.

use crate::errors::{AppError, Result};
use crate::ledger::ExpiryPolicy;
use crate::models::NoticeCategory;
use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AppConfig {
    /// Telegram delivery configuration
    #[validate(nested)]
    pub telegram: TelegramConfig,

    /// Dedup ledger configuration
    #[serde(default)]
    #[validate(nested)]
    pub ledger: LedgerConfig,

    /// Outbound HTTP configuration for board fetches
    #[serde(default)]
    #[validate(nested)]
    pub http: HttpConfig,

    /// When runs happen
    #[serde(default)]
    #[validate(nested)]
    pub schedule: ScheduleConfig,

    /// Run behaviour
    #[serde(default)]
    #[validate(nested)]
    pub runtime: RuntimeConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Boards to watch
    #[validate(length(min = 1, message = "at least one source must be configured"), nested)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct TelegramConfig {
    /// Bot API token
    #[serde(default)]
    #[validate(length(min = 1, message = "telegram.bot_token must be set"))]
    pub bot_token: String,

    /// Destination chat
    #[serde(default)]
    pub chat_id: i64,

    /// API base URL (overridable for self-hosted Bot API servers)
    #[serde(default = "default_telegram_api_base")]
    #[validate(url)]
    pub api_base: String,

    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_secs: u64,

    /// Suppress link previews in delivered messages
    #[serde(default = "default_true")]
    pub disable_preview: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryMode {
    NextLocalMidnight,
    Rolling,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LedgerConfig {
    /// Backing store
    #[serde(default = "default_ledger_backend")]
    pub backend: LedgerBackend,

    /// Redis URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Key prefix; entries live under `{key_prefix}:{notice_id}`
    #[serde(default = "default_key_prefix")]
    #[validate(length(min = 1))]
    pub key_prefix: String,

    /// How long an entry lives
    #[serde(default = "default_expiry_mode")]
    pub expiry: ExpiryMode,

    /// Window length when `expiry = "rolling"`
    #[serde(default = "default_rolling_window")]
    #[validate(range(min = 1))]
    pub rolling_window_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_secs: u64,

    /// User agent sent to boards
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Redirects followed before giving up
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ScheduleConfig {
    /// Local wall-clock times ("HH:MM") at which to run
    #[serde(default = "default_daily_times")]
    #[validate(custom(function = "validate_daily_times"))]
    pub daily_times: Vec<String>,

    /// Fixed interval; overrides `daily_times` when set
    #[validate(range(min = 1))]
    pub interval_secs: Option<u64>,

    /// Run once immediately on start
    #[serde(default = "default_true")]
    pub run_on_start: bool,

    /// A run taking longer than this is abandoned
    #[serde(default = "default_run_timeout")]
    #[validate(range(min = 1))]
    pub run_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RuntimeConfig {
    /// Boards' local time zone as a fixed offset from UTC
    #[serde(default = "default_utc_offset_hours")]
    #[validate(range(min = -14, max = 14))]
    pub utc_offset_hours: i32,

    /// Send a "nothing found" message when a run delivers nothing
    #[serde(default = "default_true")]
    pub heartbeat_when_empty: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,
}

/// One board to watch
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SourceConfig {
    /// Human-readable name, used in logs and reports
    #[validate(length(min = 1))]
    pub name: String,

    /// Board list page
    #[validate(url)]
    pub url: String,

    /// Prefix joined with scraped detail links; defaults to `url`
    #[validate(url)]
    pub base_url: Option<String>,

    /// First segment of every notice id from this source
    #[validate(length(min = 1))]
    pub id_prefix: String,

    /// Category segment of the notice id; omit for single-category sources
    pub id_suffix: Option<String>,

    pub category: NoticeCategory,

    /// Overrides the category's default tag line
    pub label: Option<String>,

    /// Titles must contain at least one of these (case-sensitive)
    #[validate(
        length(min = 1, message = "each source needs at least one keyword"),
        custom(function = "validate_keywords")
    )]
    pub keywords: Vec<String>,

    #[serde(default)]
    #[validate(nested)]
    pub schema: BoardSchema,
}

/// Where to find each field on a board page
///
/// Selectors are CSS selector strings; they are compiled by the crawler at
/// startup so a typo is caught before the first run.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, PartialEq, Eq)]
pub struct BoardSchema {
    /// Element that holds the list; its absence means the layout changed
    #[serde(default = "default_container_selector")]
    #[validate(length(min = 1))]
    pub container_selector: String,

    #[serde(default = "default_row_selector")]
    #[validate(length(min = 1))]
    pub row_selector: String,

    #[serde(default = "default_id_selector")]
    #[validate(length(min = 1))]
    pub id_selector: String,

    #[serde(default = "default_title_selector")]
    #[validate(length(min = 1))]
    pub title_selector: String,

    #[serde(default = "default_link_selector")]
    #[validate(length(min = 1))]
    pub link_selector: String,

    #[serde(default = "default_date_selector")]
    #[validate(length(min = 1))]
    pub date_selector: String,

    /// chrono strftime format of the post-date column
    #[serde(default = "default_date_format")]
    #[validate(length(min = 1))]
    pub date_format: String,
}

// Default value functions
fn default_true() -> bool { true }
fn default_telegram_api_base() -> String { "https://api.telegram.org".to_string() }
fn default_http_timeout() -> u64 { 30 }
fn default_ledger_backend() -> LedgerBackend { LedgerBackend::Redis }
fn default_redis_url() -> String { "redis://localhost:6379".to_string() }
fn default_key_prefix() -> String { "notice".to_string() }
fn default_expiry_mode() -> ExpiryMode { ExpiryMode::NextLocalMidnight }
fn default_rolling_window() -> u64 { 86_400 }
fn default_user_agent() -> String { format!("noticewatch/{}", env!("CARGO_PKG_VERSION")) }
fn default_max_redirects() -> usize { 5 }
fn default_daily_times() -> Vec<String> { vec!["11:00".to_string(), "23:00".to_string()] }
fn default_run_timeout() -> u64 { 300 }
fn default_utc_offset_hours() -> i32 { 9 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_container_selector() -> String { "table".to_string() }
fn default_row_selector() -> String { "table tbody tr".to_string() }
fn default_id_selector() -> String { ".b-num-box".to_string() }
fn default_title_selector() -> String { ".b-title".to_string() }
fn default_link_selector() -> String { ".b-title-box a".to_string() }
fn default_date_selector() -> String { "td:nth-child(4)".to_string() }
fn default_date_format() -> String { "%Y.%m.%d".to_string() }

fn validate_daily_times(times: &[String]) -> std::result::Result<(), ValidationError> {
    for time in times {
        if parse_daily_time(time).is_none() {
            let mut err = ValidationError::new("daily_time");
            err.message = Some(format!("'{}' is not an HH:MM time", time).into());
            return Err(err);
        }
    }
    Ok(())
}

fn validate_keywords(keywords: &[String]) -> std::result::Result<(), ValidationError> {
    if keywords.iter().any(|k| k.is_empty()) {
        let mut err = ValidationError::new("keyword");
        err.message = Some("keywords must not be empty strings".into());
        return Err(err);
    }
    Ok(())
}

fn parse_daily_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

impl AppConfig {
    /// Load configuration from environment and files, then validate
    pub fn load() -> Result<Self> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__TELEGRAM__BOT_TOKEN=123:abc
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load from a specific file, then validate
    pub fn from_file(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate_all()?;
        Ok(config)
    }

    /// Field-level validation plus the cross-source checks derive can't express
    pub fn validate_all(&self) -> Result<()> {
        self.validate()?;

        if self.telegram.chat_id == 0 {
            return Err(AppError::config("telegram.chat_id must be set"));
        }

        let mut names = HashSet::new();
        let mut id_spaces = HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name.as_str()) {
                return Err(AppError::config(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            // Ids are only disjoint across sources if no two share a prefix/suffix pair
            if !id_spaces.insert((source.id_prefix.as_str(), source.id_suffix.as_deref())) {
                return Err(AppError::config(format!(
                    "source '{}' reuses id prefix '{}' with the same suffix",
                    source.name, source.id_prefix
                )));
            }
        }

        Ok(())
    }

    /// Boards' local offset
    pub fn utc_offset(&self) -> FixedOffset {
        self.runtime.utc_offset()
    }

    /// Whole-run budget as Duration
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.schedule.run_timeout_secs)
    }

    /// Ledger expiry policy in the boards' local offset
    pub fn expiry_policy(&self) -> ExpiryPolicy {
        match self.ledger.expiry {
            ExpiryMode::NextLocalMidnight => ExpiryPolicy::NextLocalMidnight {
                offset: self.utc_offset(),
            },
            ExpiryMode::Rolling => ExpiryPolicy::Rolling {
                window: Duration::from_secs(self.ledger.rolling_window_secs),
            },
        }
    }
}

impl RuntimeConfig {
    pub fn utc_offset(&self) -> FixedOffset {
        // Range-checked by validation; fall back to UTC rather than panic
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }
}

impl ScheduleConfig {
    /// Parsed `daily_times`, sorted and deduplicated
    pub fn parsed_daily_times(&self) -> Result<Vec<NaiveTime>> {
        let mut times = self
            .daily_times
            .iter()
            .map(|s| {
                parse_daily_time(s)
                    .ok_or_else(|| AppError::config(format!("'{}' is not an HH:MM time", s)))
            })
            .collect::<Result<Vec<_>>>()?;
        times.sort();
        times.dedup();
        Ok(times)
    }
}

impl SourceConfig {
    /// Prefix for detail links
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(&self.url)
    }

    /// Tag line used when rendering this source's notices
    pub fn label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.category.default_label())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: default_ledger_backend(),
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
            expiry: default_expiry_mode(),
            rolling_window_secs: default_rolling_window(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_times: default_daily_times(),
            interval_secs: None,
            run_on_start: true,
            run_timeout_secs: default_run_timeout(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset_hours(),
            heartbeat_when_empty: true,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
        }
    }
}

impl Default for BoardSchema {
    fn default() -> Self {
        Self {
            container_selector: default_container_selector(),
            row_selector: default_row_selector(),
            id_selector: default_id_selector(),
            title_selector: default_title_selector(),
            link_selector: default_link_selector(),
            date_selector: default_date_selector(),
            date_format: default_date_format(),
        }
    }
}
