pub mod differ;
pub mod dispatcher;
pub mod message;
pub mod poll_loop;

pub use crate::domain::model::{ChannelKind, DaySlots, Message, NotifiedSet, SlotKey, SlotRecord, Snapshot};
pub use crate::domain::ports::{Channel, Clock, MailTransport, SiteAdapter, SnapshotStore};
pub use crate::utils::error::Result;
