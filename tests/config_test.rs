use court_watch::domain::model::ChannelKind;
use court_watch::utils::validation::Validate;
use court_watch::WatchConfig;

const EXAMPLE: &str = include_str!("../court-watch.example.toml");

const VARS: [(&str, &str); 6] = [
    ("COURT_WATCH_EMAIL", "bot@example.com"),
    ("COURT_WATCH_EMAIL_PASSWORD", "app-password"),
    ("COURT_WATCH_NOTIFY_EMAIL", "player@example.com"),
    ("COURT_WATCH_PHONE", "6045550100"),
    ("BTC_USERNAME", "player"),
    ("BTC_PASSWORD", "secret"),
];

#[test]
fn test_example_config_with_env() {
    for (name, value) in VARS {
        std::env::set_var(name, value);
    }

    let config = WatchConfig::from_toml_str(EXAMPLE).unwrap();
    config.validate().unwrap();

    assert_eq!(
        config.notifications.channels,
        vec![ChannelKind::Email, ChannelKind::Sms, ChannelKind::Console]
    );
    let sms = config.notifications.sms.as_ref().unwrap();
    assert_eq!(sms.phone_number, "6045550100");
    assert_eq!(sms.gateways.len(), 6);
    assert_eq!(config.facilities[0].username.as_deref(), Some("player"));
    assert_eq!(config.poll_settings().scan_days, 3);
}
