use crate::core::message::MessageFormatter;
use crate::domain::model::{ChannelKind, DaySlots};
use crate::domain::ports::Channel;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutcome {
    pub kind: ChannelKind,
    pub error: Option<String>,
}

impl ChannelOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    /// 至少一個通道成功才算送達
    pub fn any_succeeded(&self) -> bool {
        self.outcomes.iter().any(ChannelOutcome::succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ChannelOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.succeeded())
    }
}

/// 依序嘗試每個通道，任一通道失敗不影響其他通道
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn Channel>>,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Arc<dyn Channel>>) -> Self {
        Self { channels }
    }

    pub fn channel_kinds(&self) -> Vec<ChannelKind> {
        self.channels.iter().map(|channel| channel.kind()).collect()
    }

    pub async fn dispatch(
        &self,
        formatter: &MessageFormatter,
        new_slots: &[DaySlots],
        now: DateTime<Utc>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for channel in &self.channels {
            let kind = channel.kind();
            let message = formatter.render(kind, new_slots, now);

            tracing::debug!(facility = formatter.facility(), channel = %kind, "Sending notification");
            let error = match channel.send(&message).await {
                Ok(()) => {
                    tracing::info!(facility = formatter.facility(), channel = %kind, "📨 Notification sent");
                    None
                }
                Err(e) => {
                    tracing::warn!(
                        facility = formatter.facility(),
                        channel = %kind,
                        error = %e,
                        "Notification channel failed"
                    );
                    Some(e.to_string())
                }
            };

            report.outcomes.push(ChannelOutcome { kind, error });
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Message, Snapshot};
    use crate::utils::error::{Result, WatchError};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct RecordingChannel {
        kind: ChannelKind,
        fail: bool,
        sent: Mutex<Vec<Message>>,
    }

    impl RecordingChannel {
        fn new(kind: ChannelKind, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                kind,
                fail,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn send(&self, message: &Message) -> Result<()> {
            if self.fail {
                return Err(WatchError::DispatchError {
                    channel: self.kind.to_string(),
                    message: "535 authentication failed".to_string(),
                });
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn new_slots() -> Vec<DaySlots> {
        let mut snapshot = Snapshot::new();
        snapshot.insert_raw(
            NaiveDate::from_ymd_opt(2025, 10, 26).unwrap(),
            &["Book 4:00 pm as 48hr", "Book 6:00 pm as 48hr"],
        );
        snapshot.days().to_vec()
    }

    fn formatter() -> MessageFormatter {
        MessageFormatter::new("Test Club", "https://club.example.com/grid")
    }

    #[tokio::test]
    async fn test_one_message_per_channel() {
        let email = RecordingChannel::new(ChannelKind::Email, false);
        let sms = RecordingChannel::new(ChannelKind::Sms, false);
        let dispatcher = NotificationDispatcher::new(vec![email.clone() as Arc<dyn Channel>, sms.clone()]);

        let report = dispatcher.dispatch(&formatter(), &new_slots(), Utc::now()).await;

        assert!(report.any_succeeded());
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(email.sent_count(), 1);
        assert_eq!(sms.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_does_not_block_other_channels() {
        let email = RecordingChannel::new(ChannelKind::Email, true);
        let sms = RecordingChannel::new(ChannelKind::Sms, false);
        let console = RecordingChannel::new(ChannelKind::Console, false);
        let dispatcher = NotificationDispatcher::new(vec![
            email.clone() as Arc<dyn Channel>,
            sms.clone(),
            console.clone(),
        ]);

        let report = dispatcher.dispatch(&formatter(), &new_slots(), Utc::now()).await;

        assert!(report.any_succeeded());
        assert_eq!(sms.sent_count(), 1);
        assert_eq!(console.sent_count(), 1);

        let failed: Vec<_> = report.failed().map(|outcome| outcome.kind).collect();
        assert_eq!(failed, vec![ChannelKind::Email]);
        assert!(report.outcomes[0].error.as_deref().unwrap().contains("535"));
    }

    #[tokio::test]
    async fn test_all_channels_failing() {
        let email = RecordingChannel::new(ChannelKind::Email, true);
        let sms = RecordingChannel::new(ChannelKind::Sms, true);
        let dispatcher = NotificationDispatcher::new(vec![email as Arc<dyn Channel>, sms]);

        let report = dispatcher.dispatch(&formatter(), &new_slots(), Utc::now()).await;

        assert!(!report.any_succeeded());
        assert_eq!(report.failed().count(), 2);
    }

    #[tokio::test]
    async fn test_no_channels_is_failure() {
        let dispatcher = NotificationDispatcher::default();
        let report = dispatcher.dispatch(&formatter(), &new_slots(), Utc::now()).await;
        assert!(!report.any_succeeded());
    }
}
