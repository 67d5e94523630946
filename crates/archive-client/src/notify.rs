//! Fire-and-forget notifications for retry and terminal-failure events.
//!
//! Delivery (e-mail or any other channel) is a collaborator behind the
//! `Notifier` trait; the default implementation just logs. A notifier
//! must never block or fail the pipeline on its own account.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

/// Events emitted by the retry wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// An attempt failed transiently; the fetch will retry after `delay`.
    Retry {
        attempt: u32,
        delay: Duration,
        context: String,
    },
    /// The retry budget is exhausted; the fetch is abandoned.
    FinalFailure {
        attempts: u32,
        error: String,
        context: String,
    },
}

/// Notification sink, fire-and-forget.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: Notification);
}

/// Default notifier: structured log records, nothing else.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: Notification) {
        match event {
            Notification::Retry {
                attempt,
                delay,
                context,
            } => {
                warn!(
                    attempt = attempt,
                    delay_secs = delay.as_secs(),
                    context = %context,
                    "Fetch attempt failed, will retry"
                );
            }
            Notification::FinalFailure {
                attempts,
                error,
                context,
            } => {
                error!(
                    attempts = attempts,
                    error = %error,
                    context = %context,
                    "Fetch abandoned after exhausting retry budget"
                );
            }
        }
    }
}
