//! Report delivery
//!
//! Delivery is best-effort: a notifier never returns an error, it reports what
//! happened through [`Delivery`] and logs failures.

mod telegram;

pub use telegram::TelegramNotifier;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Destination not configured, nothing was sent
    Skipped,
    Failed(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a MarkdownV2 message.
    async fn send(&self, text: &str) -> Delivery;
}
