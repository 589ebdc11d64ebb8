//! Nullable notifier — record notifications without sending them.

use async_trait::async_trait;
use keeper_store::{Notifier, NotifyError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// A sent email: `(to, subject, body)`.
pub type SentEmail = (String, String, String);

/// A test notifier that records messages instead of delivering them.
pub struct NullNotifier {
    chats: Mutex<Vec<(String, String)>>,
    emails: Mutex<Vec<SentEmail>>,
    fail: AtomicBool,
}

impl NullNotifier {
    pub fn new() -> Self {
        Self {
            chats: Mutex::new(Vec::new()),
            emails: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Make every delivery fail (nothing is recorded while failing).
    pub fn fail_deliveries(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// All chat messages "sent", as `(chat_id, text)`.
    pub fn chats(&self) -> Vec<(String, String)> {
        self.chats.lock().unwrap().clone()
    }

    /// All emails "sent".
    pub fn emails(&self) -> Vec<SentEmail> {
        self.emails.lock().unwrap().clone()
    }
}

impl Default for NullNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for NullNotifier {
    async fn send_chat_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("null notifier set to fail".into()));
        }
        self.chats
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("null notifier set to fail".into()));
        }
        self.emails
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}
