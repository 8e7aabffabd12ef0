//! Alert delivery
//!
//! Sinks are fire-and-forget from the monitor's point of view: a failed
//! delivery is logged by the caller and never aborts a cycle.

use reqwest::blocking::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::TelegramConfig;
use crate::error::AlertError;

/// Receives formatted alert text
pub trait AlertSink {
    fn send(&self, message: &str) -> Result<(), AlertError>;
}

impl<S: AlertSink + ?Sized> AlertSink for Box<S> {
    fn send(&self, message: &str) -> Result<(), AlertError> {
        (**self).send(message)
    }
}

/// Oversold alert text (Telegram Markdown)
pub fn format_oversold_alert(symbol: &str, rsi: f64) -> String {
    format!(
        "🚨 *Oversold Alert!* 🚨\n\n*Token:* {}\n*RSI:* {:.2}",
        escape_markdown(symbol),
        rsi
    )
}

/// Backslash-escape the characters legacy Markdown treats as entity markers
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Sends alerts through the Telegram Bot API
pub struct TelegramSink {
    http_client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(
        api_base: impl Into<String>,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AlertError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        })
    }

    /// `None` when the token or chat id is missing
    pub fn from_config(config: &TelegramConfig) -> Result<Option<Self>, AlertError> {
        match (config.bot_token.as_deref(), config.chat_id.as_deref()) {
            (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
                Self::new(
                    config.api_base.as_str(),
                    token,
                    chat_id,
                    Duration::from_secs(config.timeout_secs),
                )
                .map(Some)
            }
            _ => Ok(None),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

impl AlertSink for TelegramSink {
    fn send(&self, message: &str) -> Result<(), AlertError> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "Markdown",
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AlertError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("Telegram alert delivered to chat {}", self.chat_id);
        Ok(())
    }
}

/// Writes alerts to the log instead of delivering them (dry runs)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn send(&self, message: &str) -> Result<(), AlertError> {
        warn!("[dry-run alert] {}", message.replace('\n', " "));
        Ok(())
    }
}

/// The sink chosen at startup
pub enum Notifier {
    Telegram(TelegramSink),
    Log(LogSink),
}

impl AlertSink for Notifier {
    fn send(&self, message: &str) -> Result<(), AlertError> {
        match self {
            Notifier::Telegram(sink) => sink.send(message),
            Notifier::Log(sink) => sink.send(message),
        }
    }
}
