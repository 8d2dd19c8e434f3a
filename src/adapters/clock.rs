use crate::domain::ports::Clock;
use chrono::{DateTime, Local, NaiveDate, Utc};

/// 以本機時區判斷「今天」，場地與程式在同一時區
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
