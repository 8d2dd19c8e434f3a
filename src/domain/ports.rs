use crate::domain::model::{ChannelKind, Message, NotifiedSet, Snapshot};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// 預約網站：每個日期回傳一串原始按鈕文字
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// 每輪抓取前呼叫一次（例如登入）
    async fn begin_cycle(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_slots(&self, date: NaiveDate) -> Result<Vec<String>>;
}

#[async_trait]
pub trait Channel: Send + Sync {
    fn kind(&self) -> ChannelKind;
    async fn send(&self, message: &Message) -> Result<()>;
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> impl std::future::Future<Output = Result<NotifiedSet>> + Send;
    fn save(
        &self,
        notified: &NotifiedSet,
        last_snapshot: &Snapshot,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait Clock: Send + Sync {
    /// 場地當地的日期
    fn today(&self) -> NaiveDate;
    fn now(&self) -> DateTime<Utc>;
}
