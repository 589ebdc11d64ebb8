//! Outbound notification channel trait (chat + email).

use async_trait::async_trait;

use crate::NotifyError;

/// Delivery side of the notification boundary.
///
/// The engine only ever calls this from spawned tasks; failures are logged
/// and never propagated back into liveness or rewards processing.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_chat_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError>;

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}
