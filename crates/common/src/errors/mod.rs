//! Error types for Noticewatch
//!
//! Provides one error enum shared by every crate with:
//! - Distinct variants per failure class (transport, parse, configuration, ledger, delivery)
//! - Machine-readable error codes
//! - Retry / fatality classification used by the pipeline and the scheduler

use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Transport errors (1xxx)
    TransportError,
    UpstreamStatus,

    // Parse errors (2xxx)
    ParseError,

    // Configuration errors (3xxx)
    ConfigurationError,
    ValidationError,

    // Ledger errors (4xxx)
    LedgerError,

    // Delivery errors (5xxx)
    DeliveryError,

    // Internal errors (9xxx)
    InternalError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::TransportError => 1001,
            ErrorCode::UpstreamStatus => 1002,

            ErrorCode::ParseError => 2001,

            ErrorCode::ConfigurationError => 3001,
            ErrorCode::ValidationError => 3002,

            ErrorCode::LedgerError => 4001,

            ErrorCode::DeliveryError => 5001,

            ErrorCode::InternalError => 9001,
            ErrorCode::SerializationError => 9002,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Transport errors
    #[error("Transport error for {source_name}: {message}")]
    Transport {
        source_name: String,
        message: String,
        status: Option<u16>,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Parse errors
    #[error("Parse error for {source_name}: {message}")]
    Parse { source_name: String, message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    // Ledger errors
    #[error("Ledger error: {message}")]
    Ledger { message: String },

    // Delivery errors
    #[error("Delivery failed: {message}")]
    Delivery { message: String },

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        AppError::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for a transport error without an HTTP status
    pub fn transport(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Transport {
            source_name: source_name.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Transport { status: Some(_), .. } => ErrorCode::UpstreamStatus,
            AppError::Transport { .. } => ErrorCode::TransportError,
            AppError::HttpClient(_) => ErrorCode::TransportError,
            AppError::Parse { .. } => ErrorCode::ParseError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::ConfigLoad(_) => ErrorCode::ConfigurationError,
            AppError::Validation(_) => ErrorCode::ValidationError,
            AppError::Ledger { .. } => ErrorCode::LedgerError,
            AppError::Delivery { .. } => ErrorCode::DeliveryError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the next scheduled run may succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::TransportError
                | ErrorCode::UpstreamStatus
                | ErrorCode::LedgerError
                | ErrorCode::DeliveryError
        )
    }

    /// Whether the process must refuse to start
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::ConfigurationError | ErrorCode::ValidationError
        )
    }
}
