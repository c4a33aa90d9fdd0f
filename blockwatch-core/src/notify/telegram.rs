use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, warn};

use super::{Delivery, Notifier};
use crate::config::TelegramConfig;
use crate::error::{BlockwatchError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const PARSE_MODE: &str = "MarkdownV2";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone)]
struct Destination {
    bot_token: String,
    chat_id: String,
}

/// Sends messages through the Telegram Bot API `sendMessage` method.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: Client,
    api_url: String,
    destination: Option<Destination>,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!("blockwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let destination = config
            .credentials()
            .map(|(bot_token, chat_id)| Destination {
                bot_token: bot_token.to_string(),
                chat_id: chat_id.to_string(),
            });

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            destination,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.destination.is_some()
    }

    async fn post(&self, destination: &Destination, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, destination.bot_token);

        let response = self
            .http
            .post(&url)
            .form(&[
                ("chat_id", destination.chat_id.as_str()),
                ("text", text),
                ("parse_mode", PARSE_MODE),
            ])
            .send()
            .await
            // reqwest includes the URL, and with it the bot token, in its errors.
            .map_err(|e| BlockwatchError::Notify(e.without_url().to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let api: Option<ApiResponse> = serde_json::from_str(&body).ok();

        match api {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(ApiResponse {
                description: Some(description),
                ..
            }) => Err(BlockwatchError::Notify(format!(
                "status {}: {}",
                status.as_u16(),
                description
            ))),
            _ => Err(BlockwatchError::Notify(format!(
                "status {}",
                status.as_u16()
            ))),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Delivery {
        let Some(destination) = &self.destination else {
            warn!("Telegram bot token or chat id not set, skipping notification");
            return Delivery::Skipped;
        };

        match self.post(destination, text).await {
            Ok(()) => {
                debug!(chat_id = %destination.chat_id, "Telegram message sent");
                Delivery::Sent
            }
            Err(e) => {
                error!(error = %e, "Failed to send Telegram message");
                Delivery::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    fn config(api_url: &str, token: Option<&str>, chat: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            bot_token: token.map(String::from),
            chat_id: chat.map(String::from),
            api_url: api_url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_skips_without_credentials() {
        // Nothing listens on the discard port; a network call would fail, not skip.
        for (token, chat) in [(None, Some("1")), (Some("t"), None), (None, None)] {
            let notifier = TelegramNotifier::new(&config("http://127.0.0.1:9", token, chat)).unwrap();
            assert!(!notifier.is_configured());
            assert_eq!(notifier.send("hello").await, Delivery::Skipped);
        }
    }

    #[tokio::test]
    async fn test_posts_markdown_message() {
        let (base, server) = serve_once(200, r#"{"ok":true,"result":{"message_id":7}}"#).await;
        let notifier = TelegramNotifier::new(&config(&base, Some("123:abc"), Some("-100"))).unwrap();

        let delivery = notifier.send("\\[0\\] NOT BLOCKED ✅").await;
        assert_eq!(delivery, Delivery::Sent);

        let request = server.await.unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.target, "/bot123:abc/sendMessage");
        assert_eq!(request.form_field("chat_id").as_deref(), Some("-100"));
        assert_eq!(request.form_field("parse_mode").as_deref(), Some("MarkdownV2"));
        assert_eq!(
            request.form_field("text").as_deref(),
            Some("\\[0\\] NOT BLOCKED ✅")
        );
    }

    #[tokio::test]
    async fn test_api_rejection_is_swallowed() {
        let (base, server) = serve_once(
            400,
            r#"{"ok":false,"error_code":400,"description":"Bad Request: can't parse entities"}"#,
        )
        .await;
        let notifier = TelegramNotifier::new(&config(&base, Some("t"), Some("1"))).unwrap();

        match notifier.send("bad [markup").await {
            Delivery::Failed(reason) => assert!(reason.contains("can't parse entities")),
            other => panic!("Expected Failed, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_network_failure_is_swallowed() {
        let notifier =
            TelegramNotifier::new(&config("http://127.0.0.1:9", Some("secret-token"), Some("1")))
                .unwrap();

        match notifier.send("hello").await {
            Delivery::Failed(reason) => assert!(!reason.contains("secret-token")),
            other => panic!("Expected Failed, got {:?}", other),
        }
    }
}
