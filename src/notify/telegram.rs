use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde::Serialize;

use super::{BatchMarker, Sink, SinkError};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

/// Sends messages through the Telegram Bot API `sendMessage` endpoint with
/// HTML formatting.
pub struct TelegramSink {
    client: Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(bot_token: String, chat_id: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            bot_token,
            chat_id,
        }
    }

    async fn send_message(&self, text: &str) -> Result<(), SinkError> {
        let url = format!(
            "{TELEGRAM_API_URL}/bot{}/sendMessage",
            self.bot_token
        );
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: false,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if body.get("ok") == Some(&serde_json::Value::Bool(true)) {
            return Ok(());
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = body
                .get("parameters")
                .and_then(|p| p.get("retry_after"))
                .and_then(|v| v.as_u64())
                .unwrap_or(30);
            return Err(SinkError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let description = body
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown Telegram API error");
        Err(SinkError::Api(description.to_string()))
    }

    /// Pre-flight credential and connectivity probe.
    pub async fn check_connection(&self, timeout: Duration) -> Result<String, SinkError> {
        let url = format!("{TELEGRAM_API_URL}/bot{}/getMe", self.bot_token);
        let response = self.client.get(&url).timeout(timeout).send().await?;
        let body: serde_json::Value = response.json().await?;

        if body.get("ok") == Some(&serde_json::Value::Bool(true)) {
            let username = body
                .get("result")
                .and_then(|r| r.get("username"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            Ok(username)
        } else {
            let description = body
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or("getMe failed");
            Err(SinkError::Api(description.to_string()))
        }
    }
}

#[async_trait]
impl Sink for TelegramSink {
    async fn send(&self, text: &str) -> Result<(), SinkError> {
        self.send_message(text).await
    }

    async fn send_batch_marker(&self, marker: BatchMarker) -> Result<(), SinkError> {
        let now = Local::now().format("%H:%M");
        let text = match marker {
            BatchMarker::Start { count } => format!(
                "📰 <b>HN Digest</b> ({count} stories)\n\n\
                 ⏰ {now} | 🔥 news.ycombinator.com\n\n\
                 ━━━━━━━━━━━━━━━━━━━━"
            ),
            BatchMarker::Completion {
                success,
                total,
                next_run_minutes,
            } => {
                let next = (Local::now() + chrono::Duration::minutes(next_run_minutes as i64))
                    .format("%H:%M");
                format!(
                    "✅ <b>Delivery complete</b>\n\n\
                     📊 Delivered: {success}/{total}\n\
                     ⏰ Next run: {next}\n\n\
                     ━━━━━━━━━━━━━━━━━━━━"
                )
            }
        };
        self.send_message(&text).await
    }
}
