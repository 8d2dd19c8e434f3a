use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// 頁面上看起來像按鈕、實際上不能預約的文字
const NOISE_INDICATORS: &[&str] = &[
    "Booking Grid",
    "None",
    "N/A",
    "disabled",
    "unavailable",
    "closed",
    "maintenance",
];

fn book_time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bbook\s+(\d{1,2}:\d{2})\s*(?:(am|pm)\b)?").expect("valid book-time regex")
    })
}

fn bare_time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d{1,2}:\d{2})\s*(?:(am|pm)\b)?").expect("valid time regex")
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_noise(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || NOISE_INDICATORS.iter().any(|indicator| trimmed.contains(indicator))
}

/// 從 "Book 4:00 PM as 48hr" 這類文字取出正規化後的時間 ("4:00 pm")
pub fn extract_time_label(raw: &str) -> Option<String> {
    let caps = book_time_regex()
        .captures(raw)
        .or_else(|| bare_time_regex().captures(raw))?;

    let time = caps.get(1)?.as_str();
    match caps.get(2) {
        Some(meridiem) => Some(format!("{} {}", time, meridiem.as_str().to_lowercase())),
        None => Some(time.to_string()),
    }
}

/// 一個時段的身分：同一天、同一個時間就是同一個時段
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub time_label: String,
}

impl SlotKey {
    pub fn new(date: NaiveDate, time_label: impl Into<String>) -> Self {
        Self {
            date,
            time_label: time_label.into(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time_label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRecord {
    date: NaiveDate,
    time_label: String,
    raw_text: String,
}

impl SlotRecord {
    pub fn new(date: NaiveDate, time_label: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            date,
            time_label: time_label.into(),
            raw_text: raw_text.into(),
        }
    }

    /// 雜訊、空字串、或看不出時間的按鈕 ("Book a Court") 回傳 None
    pub fn from_raw(date: NaiveDate, raw: &str) -> Option<Self> {
        if is_noise(raw) {
            return None;
        }

        let raw_text = collapse_whitespace(raw);
        let time_label = match extract_time_label(&raw_text) {
            Some(time_label) => time_label,
            // 有冒號但格式怪異的時間仍然保留原文
            None if raw_text.contains(':') => raw_text.clone(),
            None => return None,
        };

        Some(Self::new(date, time_label, raw_text))
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn time_label(&self) -> &str {
        &self.time_label
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.date, self.time_label.clone())
    }
}

// raw_text 只是顯示用，比較時忽略
impl PartialEq for SlotRecord {
    fn eq(&self, other: &Self) -> bool {
        self.date == other.date && self.time_label == other.time_label
    }
}

impl Eq for SlotRecord {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub slots: Vec<SlotRecord>,
}

/// 一輪輪詢看到的所有時段，日期維持掃描順序
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    days: Vec<DaySlots>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 過濾雜訊並加入某一天的原始標籤，回傳實際加入的時段數
    pub fn insert_raw<S: AsRef<str>>(&mut self, date: NaiveDate, raw_labels: &[S]) -> usize {
        let index = match self.days.iter().position(|day| day.date == date) {
            Some(index) => index,
            None => {
                self.days.push(DaySlots {
                    date,
                    slots: Vec::new(),
                });
                self.days.len() - 1
            }
        };

        let day = &mut self.days[index];
        let mut added = 0;
        for raw in raw_labels {
            let raw: &str = raw.as_ref();
            let Some(record) = SlotRecord::from_raw(date, raw) else {
                tracing::debug!("Skipping placeholder label: {:?}", raw);
                continue;
            };
            if day.slots.contains(&record) {
                continue;
            }
            day.slots.push(record);
            added += 1;
        }
        added
    }

    pub fn days(&self) -> &[DaySlots] {
        &self.days
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.days.iter().any(|day| day.date == date)
    }

    pub fn slot_count(&self) -> usize {
        self.days.iter().map(|day| day.slots.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slot_count() == 0
    }

    pub fn slots(&self) -> impl Iterator<Item = &SlotRecord> {
        self.days.iter().flat_map(|day| day.slots.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifiedEntry {
    pub date: NaiveDate,
    pub time_label: String,
    pub notified_at: DateTime<Utc>,
}

/// 已經通知過的時段；跨輪詢、跨重啟保存
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifiedSet {
    entries: BTreeMap<SlotKey, DateTime<Utc>>,
}

impl NotifiedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = NotifiedEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (SlotKey::new(entry.date, entry.time_label), entry.notified_at))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> Vec<NotifiedEntry> {
        self.entries
            .iter()
            .map(|(key, notified_at)| NotifiedEntry {
                date: key.date,
                time_label: key.time_label.clone(),
                notified_at: *notified_at,
            })
            .collect()
    }

    pub fn contains(&self, key: &SlotKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn notified_at(&self, key: &SlotKey) -> Option<DateTime<Utc>> {
        self.entries.get(key).copied()
    }

    /// 已存在的 key 保留第一次通知的時間
    pub fn mark(&mut self, key: SlotKey, at: DateTime<Utc>) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, at);
        true
    }

    pub fn mark_all(&mut self, keys: impl IntoIterator<Item = SlotKey>, at: DateTime<Utc>) -> usize {
        keys.into_iter()
            .map(|key| self.mark(key, at))
            .filter(|added| *added)
            .count()
    }

    /// 移除日期早於 `today` 的 key，回傳移除數量
    pub fn prune_before(&mut self, today: NaiveDate) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.date >= today);
        before - self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SlotKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Sms,
    Console,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
            ChannelKind::Console => "console",
        };
        f.write_str(name)
    }
}

/// 已依通道格式化好的訊息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub body: String,
}
