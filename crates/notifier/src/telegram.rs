//! Telegram Bot API client
//!
//! Only the two calls the bot needs: `getMe` to check the token at startup and
//! `sendMessage` for delivery.

use crate::Notifier;
use async_trait::async_trait;
use noticewatch_common::config::TelegramConfig;
use noticewatch_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: i64,
    disable_preview: bool,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

/// Envelope every Bot API method answers with
#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// `getMe` result
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub username: Option<String>,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
            chat_id: config.chat_id,
            disable_preview: config.disable_preview,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Check the token; fails when the API rejects it
    pub async fn get_me(&self) -> Result<BotUser> {
        let response = self
            .client
            .get(self.method_url("getMe"))
            .send()
            .await
            .map_err(|e| delivery_error("getMe", e))?;

        unwrap_response(response, "getMe").await
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, text), fields(chat_id = self.chat_id))]
    async fn send_message(&self, text: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: self.chat_id,
            text,
            disable_web_page_preview: self.disable_preview,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await
            .map_err(|e| delivery_error("sendMessage", e))?;

        let _: serde_json::Value = unwrap_response(response, "sendMessage").await?;
        debug!("Message sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

// reqwest errors carry the request URL, which embeds the token
fn delivery_error(method: &str, err: reqwest::Error) -> AppError {
    let reason = if err.is_timeout() { "timed out" } else { "request failed" };
    AppError::Delivery {
        message: format!("{} {}: {}", method, reason, err.without_url()),
    }
}

async fn unwrap_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    method: &str,
) -> Result<T> {
    let status = response.status();
    let body = response.text().await.map_err(|e| delivery_error(method, e))?;

    let parsed: Option<ApiResponse<T>> = serde_json::from_str(&body).ok();
    match parsed {
        Some(ApiResponse {
            ok: true,
            result: Some(result),
            ..
        }) if status.is_success() => Ok(result),
        Some(ApiResponse { description, .. }) => Err(AppError::Delivery {
            message: format!(
                "{} rejected ({}): {}",
                method,
                status,
                description.unwrap_or_else(|| "no description".to_string())
            ),
        }),
        None => Err(AppError::Delivery {
            message: format!("{} answered {} with an unreadable body", method, status),
        }),
    }
}
