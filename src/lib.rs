pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::WatchConfig;

pub use self::core::{
    differ::{diff, Diff},
    dispatcher::NotificationDispatcher,
    message::MessageFormatter,
    poll_loop::{CycleOutcome, PollLoop, PollSettings, PollState},
};
pub use utils::error::{Result, WatchError};
