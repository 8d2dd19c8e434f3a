use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("SMTP error: {0}")]
    SmtpError(#[from] lettre::transport::smtp::Error),

    #[error("Email build error: {0}")]
    EmailBuildError(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    AddressError(#[from] lettre::address::AddressError),

    #[error("Login failed for {facility}: {message}")]
    LoginError { facility: String, message: String },

    #[error("Fetch failed for {date}: {message}")]
    FetchError { date: NaiveDate, message: String },

    #[error("Channel {channel} failed: {message}")]
    DispatchError { channel: String, message: String },

    #[error("Persistence error: {message}")]
    PersistenceError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Fetch,
    Dispatch,
    Persistence,
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl WatchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            WatchError::HttpError(_) | WatchError::LoginError { .. } | WatchError::FetchError { .. } => {
                ErrorCategory::Fetch
            }
            WatchError::SmtpError(_)
            | WatchError::EmailBuildError(_)
            | WatchError::AddressError(_)
            | WatchError::DispatchError { .. } => ErrorCategory::Dispatch,
            WatchError::IoError(_)
            | WatchError::SerializationError(_)
            | WatchError::PersistenceError { .. } => ErrorCategory::Persistence,
            WatchError::ConfigError { .. }
            | WatchError::InvalidConfigValueError { .. }
            | WatchError::MissingConfigError { .. } => ErrorCategory::Config,
        }
    }

    /// 抓取與通知錯誤在下一輪重試；設定錯誤只在啟動時出現，直接結束程序
    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Fetch => ErrorSeverity::Medium,
            ErrorCategory::Dispatch => ErrorSeverity::Medium,
            ErrorCategory::Persistence => ErrorSeverity::High,
            ErrorCategory::Config => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            WatchError::LoginError { .. } => "Check the facility username/password in the config file",
            WatchError::HttpError(_) | WatchError::FetchError { .. } => {
                "The booking site may be down; the next poll cycle will retry"
            }
            WatchError::SmtpError(_) => "Check smtp_host/smtp_port and the app password for the mail account",
            WatchError::AddressError(_) => "Check the from/to addresses and SMS phone number",
            WatchError::EmailBuildError(_) | WatchError::DispatchError { .. } => {
                "Other channels are still attempted; slots are retried if every channel fails"
            }
            WatchError::IoError(_) | WatchError::PersistenceError { .. } => {
                "Make sure the state_path directory exists and is writable"
            }
            WatchError::SerializationError(_) => "The state file may be corrupt; move it aside to start fresh",
            WatchError::ConfigError { .. }
            | WatchError::InvalidConfigValueError { .. }
            | WatchError::MissingConfigError { .. } => "Fix the configuration file and restart",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Config => format!("Invalid configuration: {}", self),
            ErrorCategory::Fetch => format!("Could not read the booking site: {}", self),
            ErrorCategory::Dispatch => format!("Could not send notification: {}", self),
            ErrorCategory::Persistence => format!("Could not access saved state: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
