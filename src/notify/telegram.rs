use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::Notifier;
use crate::config::TelegramConfig;
use crate::errors::NotifyError;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .user_agent(concat!("mongodumptool/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NotifyError::Telegram(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", TELEGRAM_API_BASE, self.config.token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        debug!("Sending Telegram notification to chat {}", self.config.chat_id);
        let response = self
            .client
            .post(self.send_message_url())
            .form(&[("chat_id", self.config.chat_id.as_str()), ("text", message)])
            .send()
            .await
            .map_err(|e| NotifyError::Telegram(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(NotifyError::Telegram(format!("{} - {}", status, text)));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_message_url() -> anyhow::Result<()> {
        let notifier = TelegramNotifier::new(&TelegramConfig {
            token: "123:abc".to_string(),
            chat_id: "42".to_string(),
        })?;
        assert_eq!(
            notifier.send_message_url(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
        Ok(())
    }
}
