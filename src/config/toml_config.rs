use crate::core::poll_loop::PollSettings;
use crate::domain::model::ChannelKind;
use crate::utils::error::{Result, WatchError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    pub notifications: NotificationsConfig,
    pub facilities: Vec<FacilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_scan_days")]
    pub scan_days: u32,
    #[serde(default)]
    pub max_cycles: u64,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            scan_days: default_scan_days(),
            max_cycles: 0,
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelKind>,
    pub email: Option<EmailConfig>,
    pub sms: Option<SmsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: Option<String>,
    pub to: String,
}

impl EmailConfig {
    pub fn sender(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    pub phone_number: String,
    #[serde(default = "default_gateways")]
    pub gateways: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityConfig {
    pub name: String,
    pub booking_url: String,
    pub login_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub state_path: Option<String>,
}

impl FacilityConfig {
    /// 未設定時用場地名稱產生 `state/<name>.json`
    pub fn state_path(&self) -> String {
        if let Some(path) = &self.state_path {
            return path.clone();
        }

        let slug: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        let slug = slug
            .split('-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        format!("state/{}.json", slug)
    }
}

fn default_interval_seconds() -> u64 {
    300
}

fn default_scan_days() -> u32 {
    3
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_channels() -> Vec<ChannelKind> {
    vec![ChannelKind::Email, ChannelKind::Sms, ChannelKind::Console]
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_gateways() -> Vec<String> {
    [
        "pcs.rogers.com",
        "txt.bell.ca",
        "msg.telus.com",
        "fido.ca",
        "vmobile.ca",
        "msg.koodomobile.com",
    ]
    .iter()
    .map(|gateway| gateway.to_string())
    .collect()
}

impl WatchConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(WatchError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| WatchError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${BTC_PASSWORD})，找不到的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}]+)\}").expect("valid env var regex");

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        result.to_string()
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.monitoring.interval_seconds),
            scan_days: self.monitoring.scan_days,
            max_cycles: self.monitoring.max_cycles,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.monitoring.request_timeout_seconds)
    }

    fn validate_monitoring(&self) -> Result<()> {
        validation::validate_range("monitoring.interval_seconds", self.monitoring.interval_seconds, 1, 86_400)?;
        validation::validate_range("monitoring.scan_days", self.monitoring.scan_days, 1, 14)?;
        validation::validate_range(
            "monitoring.request_timeout_seconds",
            self.monitoring.request_timeout_seconds,
            1,
            300,
        )?;
        Ok(())
    }

    fn validate_notifications(&self) -> Result<()> {
        let notifications = &self.notifications;
        if notifications.channels.is_empty() {
            return Err(WatchError::InvalidConfigValueError {
                field: "notifications.channels".to_string(),
                value: "[]".to_string(),
                reason: "At least one channel is required".to_string(),
            });
        }
        validation::validate_unique("notifications.channels", &notifications.channels)?;

        let wants_email = notifications.channels.contains(&ChannelKind::Email);
        let wants_sms = notifications.channels.contains(&ChannelKind::Sms);

        // 簡訊閘道也走 SMTP，所以兩者都需要 email 區段
        if wants_email || wants_sms {
            let email = validation::validate_required_field("notifications.email", &notifications.email)?;
            validation::validate_non_empty_string("notifications.email.smtp_host", &email.smtp_host)?;
            validation::validate_range("notifications.email.smtp_port", email.smtp_port, 1, u16::MAX)?;
            for (field, value) in [
                ("notifications.email.username", email.username.as_str()),
                ("notifications.email.password", email.password.as_str()),
                ("notifications.email.to", email.to.as_str()),
                ("notifications.email.from", email.sender()),
            ] {
                validation::validate_non_empty_string(field, value)?;
                validation::validate_resolved(field, value)?;
            }
        }

        if wants_sms {
            let sms = validation::validate_required_field("notifications.sms", &notifications.sms)?;
            validation::validate_non_empty_string("notifications.sms.phone_number", &sms.phone_number)?;
            validation::validate_resolved("notifications.sms.phone_number", &sms.phone_number)?;
            if sms.gateways.is_empty() {
                return Err(WatchError::InvalidConfigValueError {
                    field: "notifications.sms.gateways".to_string(),
                    value: "[]".to_string(),
                    reason: "At least one SMS gateway is required".to_string(),
                });
            }
        }

        Ok(())
    }

    fn validate_facility(index: usize, facility: &FacilityConfig) -> Result<()> {
        let field = |name: &str| format!("facilities[{}].{}", index, name);

        validation::validate_non_empty_string(&field("name"), &facility.name)?;
        validation::validate_url(&field("booking_url"), &facility.booking_url)?;
        if !facility.booking_url.contains("{date}") {
            return Err(WatchError::InvalidConfigValueError {
                field: field("booking_url"),
                value: facility.booking_url.clone(),
                reason: "booking_url must contain a {date} placeholder".to_string(),
            });
        }
        validation::validate_path(&field("state_path"), &facility.state_path())?;

        if let Some(login_url) = &facility.login_url {
            validation::validate_url(&field("login_url"), login_url)?;
            let username = validation::validate_required_field(&field("username"), &facility.username)?;
            let password = validation::validate_required_field(&field("password"), &facility.password)?;
            validation::validate_resolved(&field("username"), username)?;
            validation::validate_resolved(&field("password"), password)?;
        }

        Ok(())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        self.validate_monitoring()?;
        self.validate_notifications()?;

        if self.facilities.is_empty() {
            return Err(WatchError::MissingConfigError {
                field: "facilities".to_string(),
            });
        }
        for (index, facility) in self.facilities.iter().enumerate() {
            Self::validate_facility(index, facility)?;
        }

        // 每個狀態檔只能有一個實例寫入
        let names: Vec<String> = self.facilities.iter().map(|f| f.name.clone()).collect();
        validation::validate_unique("facilities.name", &names)?;
        let paths: Vec<String> = self.facilities.iter().map(|f| f.state_path()).collect();
        validation::validate_unique("facilities.state_path", &paths)?;

        Ok(())
    }
}

impl Validate for WatchConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[monitoring]
interval_seconds = 60
scan_days = 2

[notifications]
channels = ["email", "console"]

[notifications.email]
username = "bot@example.com"
password = "app-password"
to = "player@example.com"

[[facilities]]
name = "Burnaby Tennis Club"
booking_url = "https://club.example.com/grid?date={date}"
login_url = "https://club.example.com/login"
username = "player"
password = "secret"
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = WatchConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.monitoring.interval_seconds, 60);
        assert_eq!(config.monitoring.scan_days, 2);
        assert_eq!(config.monitoring.request_timeout_seconds, 30);
        assert_eq!(config.notifications.channels, vec![ChannelKind::Email, ChannelKind::Console]);

        let email = config.notifications.email.as_ref().unwrap();
        assert_eq!(email.smtp_host, "smtp.gmail.com");
        assert_eq!(email.smtp_port, 587);
        assert_eq!(email.sender(), "bot@example.com");

        assert_eq!(config.facilities[0].state_path(), "state/burnaby-tennis-club.json");
        assert!(config.validate().is_ok());

        let settings = config.poll_settings();
        assert_eq!(settings.interval, Duration::from_secs(60));
        assert_eq!(settings.max_cycles, 0);
    }

    #[test]
    fn test_defaults() {
        let config = WatchConfig::from_toml_str(
            r#"
[notifications]
channels = ["console"]

[[facilities]]
name = "UBC"
booking_url = "https://ubc.example.com/book/{date}"
state_path = "/var/lib/court-watch/ubc.json"
"#,
        )
        .unwrap();

        assert_eq!(config.monitoring.interval_seconds, 300);
        assert_eq!(config.monitoring.scan_days, 3);
        assert_eq!(config.facilities[0].state_path(), "/var/lib/court-watch/ubc.json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("COURT_WATCH_TEST_SMTP_PASSWORD", "from-env");

        let content = BASIC.replace("app-password", "${COURT_WATCH_TEST_SMTP_PASSWORD}");
        let config = WatchConfig::from_toml_str(&content).unwrap();
        assert_eq!(config.notifications.email.unwrap().password, "from-env");

        std::env::remove_var("COURT_WATCH_TEST_SMTP_PASSWORD");
    }

    #[test]
    fn test_unset_env_var_fails_validation() {
        let content = BASIC.replace("app-password", "${COURT_WATCH_TEST_NEVER_SET}");
        let config = WatchConfig::from_toml_str(&content).unwrap();

        assert_eq!(
            config.notifications.email.as_ref().unwrap().password,
            "${COURT_WATCH_TEST_NEVER_SET}"
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sms_requires_sections() {
        let content = BASIC.replace(r#"channels = ["email", "console"]"#, r#"channels = ["sms"]"#);
        let config = WatchConfig::from_toml_str(&content).unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, WatchError::MissingConfigError { ref field } if field == "notifications.sms"));
    }

    #[test]
    fn test_booking_url_needs_date_placeholder() {
        let content = BASIC.replace("grid?date={date}", "grid");
        let config = WatchConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_facilities_rejected() {
        let duplicate = r#"
[[facilities]]
name = "Burnaby Tennis Club"
booking_url = "https://other.example.com/grid?date={date}"
state_path = "state/other.json"
"#;
        let config = WatchConfig::from_toml_str(&format!("{}{}", BASIC, duplicate)).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_channels_rejected() {
        let content = BASIC.replace(r#"["email", "console"]"#, r#"["console", "console"]"#);
        let config = WatchConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_channel_is_parse_error() {
        let content = BASIC.replace(r#"["email", "console"]"#, r#"["pager"]"#);
        assert!(WatchConfig::from_toml_str(&content).is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = WatchConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.facilities[0].name, "Burnaby Tennis Club");
    }
}
