use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::Notifier;
use crate::config::EmailConfig;
use crate::errors::NotifyError;

const SENDER: &str = "mongodumptool@localhost";
const SUBJECT: &str = "📑 [mongodumptool] status report";

/// Plain-text mail through an unauthenticated SMTP relay.
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn build_message(&self, body: &str) -> Result<Message, NotifyError> {
        let from: Mailbox = SENDER
            .parse()
            .map_err(|e| NotifyError::Email(format!("invalid sender {}: {}", SENDER, e)))?;
        let to: Mailbox = self
            .config
            .to
            .parse()
            .map_err(|e| NotifyError::Email(format!("invalid recipient {}: {}", self.config.to, e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::Email(e.to_string()))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let email = self.build_message(message)?;
        debug!(
            "Sending email to {} via smtp relay {}",
            self.config.to, self.config.smtp_relay
        );

        let mailer =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.smtp_relay).build();
        mailer.send(email).await.map_err(|e| {
            NotifyError::Email(format!(
                "smtp relay server \"{}\" is not available: {}",
                self.config.smtp_relay, e
            ))
        })?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Email"
    }
}
