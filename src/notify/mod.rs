//! Status notifications sent once a run has finished.

pub mod email;
pub mod telegram;

use async_trait::async_trait;
use tracing::{error, info};

use crate::backup::RunReport;
use crate::config::NotificationConfig;
use crate::errors::NotifyError;
use crate::utils::size::format_elapsed;
use email::EmailNotifier;
use telegram::TelegramNotifier;

pub const FAILURE_MESSAGE: &str = "💩 mongodumptool failed. Please see logs.";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotifyError>;

    fn name(&self) -> &'static str;
}

/// One notifier per configured channel. A channel whose client cannot be
/// built is logged and left out.
pub fn create_notifiers(config: &NotificationConfig) -> Vec<Box<dyn Notifier>> {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

    if let Some(email) = &config.email {
        notifiers.push(Box::new(EmailNotifier::new(email)));
    }

    if let Some(telegram) = &config.telegram {
        match TelegramNotifier::new(telegram) {
            Ok(notifier) => notifiers.push(Box::new(notifier)),
            Err(e) => error!("{}", e),
        }
    }

    notifiers
}

/// The single line summary users get: size and duration on success, a
/// pointer to the logs otherwise.
pub fn status_message(report: &RunReport) -> String {
    if report.succeeded() {
        format!(
            "💥 mongodumptool finished the job.\n🦺 Dump size is {}.\n🌒 Processing time is {}",
            report.size.as_deref().unwrap_or("unknown"),
            format_elapsed(report.elapsed)
        )
    } else {
        FAILURE_MESSAGE.to_string()
    }
}

/// Sends `message` on every channel; returns how many deliveries succeeded.
pub async fn dispatch(notifiers: &[Box<dyn Notifier>], message: &str) -> usize {
    let mut delivered = 0;
    for notifier in notifiers {
        match notifier.send(message).await {
            Ok(()) => {
                info!("{} notification sent.", notifier.name());
                delivered += 1;
            }
            Err(e) => error!("{}", e),
        }
    }
    delivered
}
