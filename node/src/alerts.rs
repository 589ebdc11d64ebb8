//! Offline alerting over the notification boundary.
//!
//! Deliveries are spawned onto the runtime and never awaited by the caller;
//! a failed chat or email send is logged and otherwise ignored.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use keeper_store::Notifier;
use keeper_types::KeeperRecord;
use keeper_utils::format_duration;

use crate::config::AlertConfig;

pub struct OfflineAlerter {
    notifier: Arc<dyn Notifier>,
    chat_id: Option<String>,
    email_to: Option<String>,
}

impl OfflineAlerter {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        chat_id: Option<String>,
        email_to: Option<String>,
    ) -> Self {
        Self {
            notifier,
            chat_id,
            email_to,
        }
    }

    /// Build an alerter from config, or `None` if alerting is disabled or
    /// no destination is configured.
    pub fn from_config(notifier: Arc<dyn Notifier>, config: &AlertConfig) -> Option<Self> {
        if !config.enabled || (config.chat_id.is_none() && config.email_to.is_none()) {
            return None;
        }
        Some(Self::new(
            notifier,
            config.chat_id.clone(),
            config.email_to.clone(),
        ))
    }

    /// Fire one notification per configured channel for each keeper that
    /// just went offline. The returned handles may be dropped.
    pub fn notify_offline(
        &self,
        keepers: &[KeeperRecord],
        now: DateTime<Utc>,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for keeper in keepers {
            let text = offline_message(keeper, now);

            if let Some(chat_id) = self.chat_id.clone() {
                let notifier = Arc::clone(&self.notifier);
                let text = text.clone();
                let address = keeper.address.clone();
                handles.push(tokio::spawn(async move {
                    if let Err(e) = notifier.send_chat_message(&chat_id, &text).await {
                        tracing::warn!(keeper = %address, error = %e, "offline chat alert failed");
                    }
                }));
            }

            if let Some(to) = self.email_to.clone() {
                let notifier = Arc::clone(&self.notifier);
                let subject = format!("Keeper offline: {}", display_name(keeper));
                let address = keeper.address.clone();
                let body = text.clone();
                handles.push(tokio::spawn(async move {
                    if let Err(e) = notifier.send_email(&to, &subject, &body).await {
                        tracing::warn!(keeper = %address, error = %e, "offline email alert failed");
                    }
                }));
            }
        }
        handles
    }
}

fn display_name(keeper: &KeeperRecord) -> &str {
    if keeper.name.is_empty() {
        keeper.address.as_str()
    } else {
        &keeper.name
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "unknown"
    } else {
        value
    }
}

fn offline_message(keeper: &KeeperRecord, now: DateTime<Utc>) -> String {
    let silence = match keeper.seconds_since_check_in(now) {
        Some(secs) => format!("last check-in {} ago", format_duration(secs.max(0) as u64)),
        None => "no check-in on record".to_string(),
    };
    format!(
        "Keeper {} ({}) is offline: {}. Version {}, peer {}.",
        display_name(keeper),
        keeper.address,
        silence,
        or_unknown(&keeper.version),
        or_unknown(&keeper.peer_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use keeper_nullables::NullNotifier;
    use keeper_types::KeeperAddress;

    fn offline_keeper(name: &str) -> (KeeperRecord, DateTime<Utc>) {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut rec = KeeperRecord::new(KeeperAddress::parse("0xdead").unwrap());
        rec.name = name.to_string();
        rec.last_checked_in = Some(now - Duration::seconds(95));
        (rec, now)
    }

    #[test]
    fn disabled_config_builds_nothing() {
        let notifier = Arc::new(NullNotifier::new());
        assert!(OfflineAlerter::from_config(notifier.clone(), &AlertConfig::default()).is_none());
        let no_destination = AlertConfig {
            enabled: true,
            ..AlertConfig::default()
        };
        assert!(OfflineAlerter::from_config(notifier, &no_destination).is_none());
    }

    #[tokio::test]
    async fn sends_chat_and_email_per_keeper() {
        let notifier = Arc::new(NullNotifier::new());
        let alerter = OfflineAlerter::new(
            notifier.clone(),
            Some("-100".into()),
            Some("ops@example.org".into()),
        );
        let (rec, now) = offline_keeper("alpha");
        for handle in alerter.notify_offline(&[rec], now) {
            handle.await.unwrap();
        }
        let chats = notifier.chats();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].0, "-100");
        assert!(chats[0].1.contains("alpha"));
        assert!(chats[0].1.contains("1m 35s"));
        let emails = notifier.emails();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].1, "Keeper offline: alpha");
    }

    #[tokio::test]
    async fn delivery_failures_are_swallowed() {
        let notifier = Arc::new(NullNotifier::new());
        notifier.fail_deliveries(true);
        let alerter = OfflineAlerter::new(notifier.clone(), Some("-1".into()), None);
        let (rec, now) = offline_keeper("");
        for handle in alerter.notify_offline(&[rec], now) {
            assert!(handle.await.is_ok());
        }
        assert!(notifier.chats().is_empty());
    }

    #[test]
    fn message_falls_back_to_address() {
        let (rec, now) = offline_keeper("");
        let text = offline_message(&rec, now);
        assert!(text.starts_with("Keeper 0xdead (0xdead)"));
        assert!(text.contains("Version unknown"));
    }
}
