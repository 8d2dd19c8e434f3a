use crate::utils::error::{Result, WatchError};
use std::collections::HashSet;
use std::hash::Hash;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(WatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    // {date} 佔位符不是合法的 URL 字元，先代入一個日期再解析
    let candidate = url_str.replace("{date}", "2000-01-01");

    match Url::parse(&candidate) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(WatchError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(WatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(WatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(WatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(WatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| WatchError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(WatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// 環境變數未設定時 `${VAR}` 會原樣保留，這裡把它當成缺值
pub fn validate_resolved(field_name: &str, value: &str) -> Result<()> {
    if value.contains("${") {
        return Err(WatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Environment variable is not set".to_string(),
        });
    }
    Ok(())
}

pub fn validate_unique<'a, T, I>(field_name: &str, values: I) -> Result<()>
where
    T: Eq + Hash + std::fmt::Display + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(value) {
            return Err(WatchError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: value.to_string(),
                reason: "Duplicate value".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("booking_url", "https://example.com").is_ok());
        assert!(validate_url("booking_url", "http://example.com/grid?date={date}").is_ok());
        assert!(validate_url("booking_url", "").is_err());
        assert!(validate_url("booking_url", "invalid-url").is_err());
        assert!(validate_url("booking_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("scan_days", 3u32, 1, 14).is_ok());
        assert!(validate_range("scan_days", 0u32, 1, 14).is_err());
        assert!(validate_range("scan_days", 15u32, 1, 14).is_err());
    }

    #[test]
    fn test_validate_resolved() {
        assert!(validate_resolved("email.password", "hunter2").is_ok());
        assert!(validate_resolved("email.password", "${GMAIL_APP_PASSWORD}").is_err());
    }

    #[test]
    fn test_validate_unique() {
        let names = vec!["btc".to_string(), "ubc".to_string()];
        assert!(validate_unique("facilities.name", &names).is_ok());

        let dupes = vec!["btc".to_string(), "btc".to_string()];
        assert!(validate_unique("facilities.name", &dupes).is_err());
    }
}
