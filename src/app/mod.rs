// 把配置組裝成實際運作的輪詢迴圈
use crate::adapters::{
    ConsoleChannel, EmailChannel, HttpSiteAdapter, JsonFileStore, MemoryStore, SmsChannel, SmtpMailer, SystemClock,
};
use crate::config::toml_config::{FacilityConfig, NotificationsConfig, WatchConfig};
use crate::core::dispatcher::NotificationDispatcher;
use crate::core::message::MessageFormatter;
use crate::core::poll_loop::{PollLoop, PollSettings};
use crate::domain::model::ChannelKind;
use crate::domain::ports::{Channel, Clock, MailTransport, SiteAdapter, SnapshotStore};
use crate::utils::error::{Result, WatchError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// 依 `channels` 的順序建立通道；email 與 sms 共用同一個 SMTP 連線
pub fn build_channels(notifications: &NotificationsConfig) -> Result<Vec<Arc<dyn Channel>>> {
    let mut mailer: Option<Arc<dyn MailTransport>> = None;
    let mut shared_mailer = || -> Result<Arc<dyn MailTransport>> {
        if let Some(mailer) = &mailer {
            return Ok(mailer.clone());
        }
        let email = notifications.email.as_ref().ok_or_else(|| WatchError::MissingConfigError {
            field: "notifications.email".to_string(),
        })?;
        let created: Arc<dyn MailTransport> = Arc::new(SmtpMailer::new(email)?);
        mailer = Some(created.clone());
        Ok(created)
    };

    let mut channels: Vec<Arc<dyn Channel>> = Vec::with_capacity(notifications.channels.len());
    for kind in &notifications.channels {
        let channel: Arc<dyn Channel> = match kind {
            ChannelKind::Email => {
                let to = notifications
                    .email
                    .as_ref()
                    .map(|email| email.to.clone())
                    .unwrap_or_default();
                Arc::new(EmailChannel::new(shared_mailer()?, to))
            }
            ChannelKind::Sms => {
                let sms = notifications.sms.as_ref().ok_or_else(|| WatchError::MissingConfigError {
                    field: "notifications.sms".to_string(),
                })?;
                Arc::new(SmsChannel::new(
                    shared_mailer()?,
                    sms.phone_number.clone(),
                    sms.gateways.clone(),
                ))
            }
            ChannelKind::Console => Arc::new(ConsoleChannel),
        };
        channels.push(channel);
    }

    Ok(channels)
}

pub fn build_dispatcher(notifications: &NotificationsConfig) -> Result<NotificationDispatcher> {
    Ok(NotificationDispatcher::new(build_channels(notifications)?))
}

async fn run_poll_loop<A, S>(
    facility: &FacilityConfig,
    adapter: A,
    store: S,
    dispatcher: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    settings: PollSettings,
    shutdown: watch::Receiver<bool>,
) -> u64
where
    A: SiteAdapter,
    S: SnapshotStore,
{
    let formatter = MessageFormatter::new(facility.name.clone(), facility.booking_url.clone());
    let mut poll_loop = PollLoop::new(adapter, store, dispatcher, formatter, clock, settings);
    poll_loop.run(shutdown).await
}

/// 執行單一場地直到停止，回傳完成的輪數
pub async fn run_facility(
    facility: FacilityConfig,
    dispatcher: NotificationDispatcher,
    settings: PollSettings,
    request_timeout: Duration,
    ephemeral: bool,
    shutdown: watch::Receiver<bool>,
) -> Result<u64> {
    let adapter = HttpSiteAdapter::new(&facility, request_timeout)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let cycles = if ephemeral {
        tracing::info!(facility = %facility.name, "Using in-memory state (nothing is persisted)");
        run_poll_loop(&facility, adapter, MemoryStore::new(), dispatcher, clock, settings, shutdown).await
    } else {
        let store = JsonFileStore::new(facility.state_path());
        tracing::info!(facility = %facility.name, "State file: {}", store.path().display());
        run_poll_loop(&facility, adapter, store, dispatcher, clock, settings, shutdown).await
    };

    Ok(cycles)
}

/// 每個場地一個獨立的 task，共用同一個停止訊號
pub async fn run_facilities(config: &WatchConfig, ephemeral: bool, shutdown: watch::Receiver<bool>) -> Result<u64> {
    let dispatcher = build_dispatcher(&config.notifications)?;
    tracing::info!(
        "Notification channels: {:?}",
        dispatcher.channel_kinds()
    );

    let settings = config.poll_settings();
    let request_timeout = config.request_timeout();

    let mut handles = Vec::with_capacity(config.facilities.len());
    for facility in &config.facilities {
        let name = facility.name.clone();
        let handle = tokio::spawn(run_facility(
            facility.clone(),
            dispatcher.clone(),
            settings,
            request_timeout,
            ephemeral,
            shutdown.clone(),
        ));
        handles.push((name, handle));
    }

    let mut total_cycles = 0;
    let mut first_error = None;
    for (name, handle) in handles {
        match handle.await {
            Ok(Ok(cycles)) => total_cycles += cycles,
            Ok(Err(e)) => {
                tracing::error!(facility = %name, error = %e, "Facility monitor failed to start");
                first_error.get_or_insert(e);
            }
            Err(e) => {
                tracing::error!(facility = %name, error = %e, "Facility task aborted");
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(total_cycles),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::toml_config::{EmailConfig, SmsConfig};

    fn notifications(channels: Vec<ChannelKind>) -> NotificationsConfig {
        NotificationsConfig {
            channels,
            email: Some(EmailConfig {
                smtp_host: "smtp.example.com".to_string(),
                smtp_port: 587,
                username: "bot@example.com".to_string(),
                password: "app-password".to_string(),
                from: None,
                to: "player@example.com".to_string(),
            }),
            sms: Some(SmsConfig {
                phone_number: "6045550100".to_string(),
                gateways: vec!["txt.bell.ca".to_string()],
            }),
        }
    }

    #[tokio::test]
    async fn test_channels_follow_configured_order() {
        let config = notifications(vec![ChannelKind::Console, ChannelKind::Sms, ChannelKind::Email]);
        let dispatcher = build_dispatcher(&config).unwrap();

        assert_eq!(
            dispatcher.channel_kinds(),
            vec![ChannelKind::Console, ChannelKind::Sms, ChannelKind::Email]
        );
    }

    #[test]
    fn test_console_only_needs_no_email_section() {
        let mut config = notifications(vec![ChannelKind::Console]);
        config.email = None;
        config.sms = None;

        let channels = build_channels(&config).unwrap();
        assert_eq!(channels.len(), 1);
    }

    #[test]
    fn test_sms_without_email_section_fails() {
        let mut config = notifications(vec![ChannelKind::Sms]);
        config.email = None;

        assert!(build_channels(&config).is_err());
    }
}
