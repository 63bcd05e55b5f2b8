// Telegram Bot API notification sender

use crate::transport_error;
use async_trait::async_trait;
use pricewatch_core::domain::TrackingResult;
use pricewatch_core::error::{AppError, Result};
use pricewatch_core::port::NotificationSender;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// HTML body of a price-drop notification
pub fn render_message(result: &TrackingResult) -> String {
    format!(
        "<b>{name}</b>\n\n\
         <a href=\"{url}\">Product link</a>\n\n\
         <b>Size:</b> {size}\n\n\
         <b>Old price:</b> {previous:.0}\n\n\
         <b>New price:</b> {current:.0}\n\n\
         <b>Price drop:</b> {diff}%",
        name = escape_html(&result.product_name),
        url = escape_html(&result.product_url),
        size = escape_html(&result.size),
        previous = result.previous_price,
        current = result.current_price,
        diff = result.diff_percent,
    )
}

/// NotificationSender posting `sendMessage` to the Bot API
pub struct TelegramSender {
    client: reqwest::Client,
    endpoint: String,
}

impl TelegramSender {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(AppError::Config("telegram token is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_url.trim_end_matches('/'), token),
        })
    }
}

// The endpoint embeds the bot token
impl fmt::Debug for TelegramSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramSender")
            .field("endpoint", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn send(&self, result: &TrackingResult) -> Result<()> {
        let text = render_message(result);
        let body = SendMessage {
            chat_id: result.chat_id,
            text: &text,
            parse_mode: "HTML",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Notification(transport_error("sendMessage failed", e)))?;

        let status = response.status();
        let reply: ApiReply = response.json().await.map_err(|e| {
            AppError::Notification(transport_error(
                &format!("unreadable sendMessage reply ({})", status),
                e,
            ))
        })?;

        if !reply.ok {
            return Err(AppError::Notification(format!(
                "chat {}: {}",
                result.chat_id,
                reply.description.as_deref().unwrap_or("request rejected")
            )));
        }

        debug!(chat_id = result.chat_id, product_id = result.product_id, "Notification sent");
        Ok(())
    }
}
