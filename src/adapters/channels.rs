use crate::domain::model::{ChannelKind, Message};
use crate::domain::ports::{Channel, MailTransport};
use crate::utils::error::{Result, WatchError};
use async_trait::async_trait;
use std::sync::Arc;

pub struct EmailChannel {
    mailer: Arc<dyn MailTransport>,
    to: String,
}

impl EmailChannel {
    pub fn new(mailer: Arc<dyn MailTransport>, to: impl Into<String>) -> Self {
        Self {
            mailer,
            to: to.into(),
        }
    }
}

#[async_trait]
impl Channel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, message: &Message) -> Result<()> {
        self.mailer
            .send_mail(&self.to, &message.subject, &message.body)
            .await
    }
}

/// 透過電信商的 email-to-SMS 閘道發簡訊，依序嘗試直到一個成功
pub struct SmsChannel {
    mailer: Arc<dyn MailTransport>,
    phone_number: String,
    gateways: Vec<String>,
}

impl SmsChannel {
    pub fn new(mailer: Arc<dyn MailTransport>, phone_number: impl Into<String>, gateways: Vec<String>) -> Self {
        Self {
            mailer,
            phone_number: phone_number.into(),
            gateways,
        }
    }

    pub fn gateway_addresses(&self) -> Vec<String> {
        self.gateways
            .iter()
            .map(|gateway| format!("{}@{}", self.phone_number, gateway))
            .collect()
    }
}

#[async_trait]
impl Channel for SmsChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn send(&self, message: &Message) -> Result<()> {
        let addresses = self.gateway_addresses();
        for address in &addresses {
            match self.mailer.send_mail(address, &message.subject, &message.body).await {
                Ok(()) => {
                    tracing::info!("SMS sent via gateway {}", address);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "SMS via {} failed", address);
                }
            }
        }

        Err(WatchError::DispatchError {
            channel: ChannelKind::Sms.to_string(),
            message: format!("all {} SMS gateways failed", addresses.len()),
        })
    }
}

/// 最後的退路：印到標準輸出，永遠成功
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleChannel;

#[async_trait]
impl Channel for ConsoleChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Console
    }

    async fn send(&self, message: &Message) -> Result<()> {
        println!("{}", message.body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMailer {
        rejected: HashSet<String>,
        sent: Mutex<Vec<(String, String, String)>>,
    }

    impl FakeMailer {
        fn rejecting(addresses: &[&str]) -> Self {
            Self {
                rejected: addresses.iter().map(|a| a.to_string()).collect(),
                ..Self::default()
            }
        }

        fn recipients(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(to, _, _)| to.clone()).collect()
        }
    }

    #[async_trait]
    impl MailTransport for FakeMailer {
        async fn send_mail(&self, to: &str, subject: &str, body: &str) -> Result<()> {
            if self.rejected.contains(to) {
                return Err(WatchError::DispatchError {
                    channel: "smtp".to_string(),
                    message: format!("550 mailbox unavailable: {}", to),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn message() -> Message {
        Message {
            subject: "Courts available".to_string(),
            body: "2 new slots".to_string(),
        }
    }

    #[tokio::test]
    async fn test_email_channel_sends_to_recipient() {
        let mailer = Arc::new(FakeMailer::default());
        let channel = EmailChannel::new(mailer.clone(), "player@example.com");

        channel.send(&message()).await.unwrap();
        assert_eq!(channel.kind(), ChannelKind::Email);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent[0].0, "player@example.com");
        assert_eq!(sent[0].1, "Courts available");
    }

    #[tokio::test]
    async fn test_sms_stops_at_first_working_gateway() {
        let mailer = Arc::new(FakeMailer::rejecting(&["6045550100@pcs.rogers.com"]));
        let channel = SmsChannel::new(
            mailer.clone(),
            "6045550100",
            vec![
                "pcs.rogers.com".to_string(),
                "txt.bell.ca".to_string(),
                "msg.telus.com".to_string(),
            ],
        );

        channel.send(&message()).await.unwrap();
        assert_eq!(mailer.recipients(), vec!["6045550100@txt.bell.ca".to_string()]);
    }

    #[tokio::test]
    async fn test_sms_fails_when_every_gateway_fails() {
        let mailer = Arc::new(FakeMailer::rejecting(&["6045550100@pcs.rogers.com"]));
        let channel = SmsChannel::new(mailer.clone(), "6045550100", vec!["pcs.rogers.com".to_string()]);

        let err = channel.send(&message()).await.unwrap_err();
        assert!(err.to_string().contains("all 1 SMS gateways failed"));
        assert!(mailer.recipients().is_empty());
    }

    #[tokio::test]
    async fn test_console_always_succeeds() {
        tokio_test::assert_ok!(ConsoleChannel.send(&message()).await);
    }
}
