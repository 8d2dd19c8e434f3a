use crate::config::toml_config::FacilityConfig;
use crate::domain::ports::SiteAdapter;
use crate::utils::error::{Result, WatchError};
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;

const USER_AGENT: &str = concat!("court-watch/", env!("CARGO_PKG_VERSION"));

fn button_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<button\b[^>]*>(.*?)</button>").expect("valid button regex"))
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]+>").expect("valid tag regex"))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// 取出所有含 "book" 的按鈕文字，雜訊過濾交給 Snapshot
pub fn extract_book_labels(html: &str) -> Vec<String> {
    button_regex()
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|inner| {
            let text = tag_regex().replace_all(inner.as_str(), " ");
            decode_entities(&text)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| text.to_lowercase().contains("book"))
        .collect()
}

fn password_input_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<input\b[^>]*\b(?:type|name)\s*=\s*["']?password\b"#).expect("valid password input regex")
    })
}

/// 回應裡仍有密碼欄位就代表還停在登入頁
pub fn is_login_page(html: &str) -> bool {
    password_input_regex().is_match(html)
}

#[derive(Debug, Clone)]
struct LoginForm {
    url: String,
    username: String,
    password: String,
}

/// 直接用 HTTP 讀預約表頁面；登入的 session 放在 cookie jar
pub struct HttpSiteAdapter {
    facility: String,
    booking_url: String,
    login: Option<LoginForm>,
    client: Client,
}

impl HttpSiteAdapter {
    pub fn new(config: &FacilityConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let login = match (&config.login_url, &config.username, &config.password) {
            (Some(url), Some(username), Some(password)) => Some(LoginForm {
                url: url.clone(),
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            facility: config.name.clone(),
            booking_url: config.booking_url.clone(),
            login,
            client,
        })
    }

    pub fn page_url(&self, date: NaiveDate) -> String {
        self.booking_url
            .replace("{date}", &date.format("%Y-%m-%d").to_string())
    }
}

#[async_trait]
impl SiteAdapter for HttpSiteAdapter {
    async fn begin_cycle(&self) -> Result<()> {
        let Some(login) = &self.login else {
            return Ok(());
        };

        tracing::debug!(facility = %self.facility, "Logging in at {}", login.url);
        let response = self
            .client
            .post(&login.url)
            .form(&[
                ("username", login.username.as_str()),
                ("password", login.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| WatchError::LoginError {
                facility: self.facility.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(WatchError::LoginError {
                facility: self.facility.clone(),
                message: format!("login returned HTTP {}", response.status()),
            });
        }

        // 帳密錯誤時網站多半回 200 並重新顯示登入表單
        let body = response.text().await.map_err(|e| WatchError::LoginError {
            facility: self.facility.clone(),
            message: e.to_string(),
        })?;
        if is_login_page(&body) {
            return Err(WatchError::LoginError {
                facility: self.facility.clone(),
                message: "login form shown again, credentials were probably rejected".to_string(),
            });
        }

        Ok(())
    }

    async fn fetch_slots(&self, date: NaiveDate) -> Result<Vec<String>> {
        let url = self.page_url(date);
        tracing::debug!(facility = %self.facility, date = %date, "Fetching {}", url);

        let fetch_error = |message: String| WatchError::FetchError { date, message };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("booking page returned HTTP {}", status)));
        }

        let body = response.text().await.map_err(|e| fetch_error(e.to_string()))?;
        Ok(extract_book_labels(&body))
    }
}
