// Adapters layer: concrete implementations of the domain ports (http site, smtp, channels, state store, clock).

pub mod channels;
pub mod clock;
pub mod mailer;
pub mod site;
pub mod storage;

pub use channels::{ConsoleChannel, EmailChannel, SmsChannel};
pub use clock::SystemClock;
pub use mailer::SmtpMailer;
pub use site::HttpSiteAdapter;
pub use storage::{JsonFileStore, MemoryStore};
