use crate::config::TelegramConfig;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Best-effort Telegram notifier. Send failures are logged and
/// swallowed - a broken notification channel must never abort the run.
pub struct Notifier {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl Notifier {
    pub fn from_config(config: &TelegramConfig) -> Option<Self> {
        let bot_token = config.bot_token.clone().filter(|t| !t.is_empty())?;
        let chat_id = config.chat_id.clone().filter(|c| !c.is_empty())?;
        Some(Self {
            http: reqwest::Client::new(),
            bot_token,
            chat_id,
        })
    }

    /// Sends an HTML-formatted message to the configured chat.
    pub async fn send(&self, text: &str) {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let body = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let result = self
            .http
            .post(&url)
            .json(&body)
            .timeout(Duration::from_secs(10))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!("Telegram notification sent");
            }
            Ok(response) => {
                warn!("Telegram API returned {}", response.status());
            }
            Err(e) => {
                warn!("Failed to send Telegram notification: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifier_disabled_without_token() {
        let config = TelegramConfig {
            bot_token: None,
            chat_id: Some("123".to_string()),
        };
        assert!(Notifier::from_config(&config).is_none());

        let config = TelegramConfig {
            bot_token: Some("".to_string()),
            chat_id: Some("123".to_string()),
        };
        assert!(Notifier::from_config(&config).is_none());
    }

    #[test]
    fn notifier_enabled_with_token_and_chat() {
        let config = TelegramConfig {
            bot_token: Some("token".to_string()),
            chat_id: Some("123".to_string()),
        };
        assert!(Notifier::from_config(&config).is_some());
    }
}
