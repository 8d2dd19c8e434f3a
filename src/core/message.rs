use crate::domain::model::{ChannelKind, DaySlots, Message};
use chrono::{DateTime, Utc};

/// SMS 只列出前幾個時間
const SMS_PREVIEW_SLOTS: usize = 3;

#[derive(Debug, Clone)]
pub struct MessageFormatter {
    facility: String,
    booking_url: String,
}

impl MessageFormatter {
    /// `booking_url` 可以含 `{date}`，會換成第一個有新時段的日期
    pub fn new(facility: impl Into<String>, booking_url: impl Into<String>) -> Self {
        Self {
            facility: facility.into(),
            booking_url: booking_url.into(),
        }
    }

    pub fn facility(&self) -> &str {
        &self.facility
    }

    fn link(&self, new_slots: &[DaySlots]) -> String {
        match new_slots.first() {
            Some(day) => self
                .booking_url
                .replace("{date}", &day.date.format("%Y-%m-%d").to_string()),
            None => self.booking_url.replace("{date}", ""),
        }
    }

    pub fn render(&self, kind: ChannelKind, new_slots: &[DaySlots], now: DateTime<Utc>) -> Message {
        let total: usize = new_slots.iter().map(|day| day.slots.len()).sum();
        match kind {
            ChannelKind::Email => Message {
                subject: self.subject(total),
                body: self.full_body(new_slots, total, now),
            },
            ChannelKind::Sms => Message {
                subject: String::new(),
                body: self.sms_body(new_slots, total),
            },
            ChannelKind::Console => {
                let rule = "=".repeat(50);
                Message {
                    subject: self.subject(total),
                    body: format!("{rule}\n{}\n{rule}", self.full_body(new_slots, total, now).trim_end()),
                }
            }
        }
    }

    fn subject(&self, total: usize) -> String {
        format!("🎾 {} courts available - {} slots found!", self.facility, total)
    }

    fn full_body(&self, new_slots: &[DaySlots], total: usize, now: DateTime<Utc>) -> String {
        let mut lines = vec![
            format!("🎾 {} - COURTS AVAILABLE! 🎾", self.facility.to_uppercase()),
            String::new(),
            format!("{} new court slots have become available:", total),
        ];

        let mut counter = 1;
        for day in new_slots {
            lines.push(String::new());
            lines.push(format!("📅 {}:", day.date.format("%A, %B %d, %Y")));
            for slot in &day.slots {
                lines.push(format!("   {}. {} - {}", counter, slot.raw_text(), slot.time_label()));
                counter += 1;
            }
        }

        lines.push(String::new());
        lines.push(format!("⏰ Detected: {}", now.format("%Y-%m-%d %H:%M:%S UTC")));
        lines.push(format!("🌐 Booking URL: {}", self.link(new_slots)));

        let mut body = lines.join("\n");
        body.push('\n');
        body
    }

    fn sms_body(&self, new_slots: &[DaySlots], total: usize) -> String {
        let times: Vec<&str> = new_slots
            .iter()
            .flat_map(|day| day.slots.iter().map(|slot| slot.time_label()))
            .take(SMS_PREVIEW_SLOTS)
            .collect();

        let mut sms = format!("🎾 {}: {} courts available! {}", self.facility, total, times.join(", "));
        if total > SMS_PREVIEW_SLOTS {
            sms.push_str(&format!(" +{} more", total - SMS_PREVIEW_SLOTS));
        }
        sms.push_str(&format!(" Book: {}", self.link(new_slots)));
        sms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Snapshot;
    use chrono::{NaiveDate, TimeZone};

    fn new_slots() -> Vec<DaySlots> {
        let mut snapshot = Snapshot::new();
        snapshot.insert_raw(
            NaiveDate::from_ymd_opt(2025, 10, 26).unwrap(),
            &["Book 4:00 pm as 48hr", "Book 6:00 pm as 48hr"],
        );
        snapshot.insert_raw(
            NaiveDate::from_ymd_opt(2025, 10, 27).unwrap(),
            &["Book 2:00 pm as 48hr", "Book 8:00 pm as 48hr"],
        );
        snapshot.days().to_vec()
    }

    fn formatter() -> MessageFormatter {
        MessageFormatter::new("Burnaby Tennis Club", "https://club.example.com/grid?date={date}")
    }

    #[test]
    fn test_email_lists_every_date_and_slot() {
        let now = Utc.with_ymd_and_hms(2025, 10, 26, 8, 30, 0).unwrap();
        let message = formatter().render(ChannelKind::Email, &new_slots(), now);

        assert_eq!(message.subject, "🎾 Burnaby Tennis Club courts available - 4 slots found!");
        assert!(message.body.contains("📅 Sunday, October 26, 2025:"));
        assert!(message.body.contains("📅 Monday, October 27, 2025:"));
        assert!(message.body.contains("   1. Book 4:00 pm as 48hr - 4:00 pm"));
        assert!(message.body.contains("   4. Book 8:00 pm as 48hr - 8:00 pm"));
        assert!(message.body.contains("2025-10-26 08:30:00 UTC"));
        assert!(message.body.contains("https://club.example.com/grid?date=2025-10-26"));

        let lines: Vec<&str> = message.body.lines().collect();
        assert_eq!(lines[0], "🎾 BURNABY TENNIS CLUB - COURTS AVAILABLE! 🎾");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "4 new court slots have become available:");
        assert!(message.body.ends_with("🌐 Booking URL: https://club.example.com/grid?date=2025-10-26\n"));
    }

    #[test]
    fn test_sms_is_short() {
        let message = formatter().render(ChannelKind::Sms, &new_slots(), Utc::now());

        assert!(message.subject.is_empty());
        assert!(message.body.contains("4 courts available! 4:00 pm, 6:00 pm, 2:00 pm +1 more"));
        assert!(!message.body.contains("8:00 pm"));
        assert!(message.body.ends_with("Book: https://club.example.com/grid?date=2025-10-26"));
    }

    #[test]
    fn test_console_is_framed() {
        let message = formatter().render(ChannelKind::Console, &new_slots(), Utc::now());
        assert!(message.body.starts_with(&"=".repeat(50)));
        assert!(message.body.ends_with(&"=".repeat(50)));
        assert!(message.body.contains("COURTS AVAILABLE"));
    }
}
