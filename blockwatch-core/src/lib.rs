pub mod checker;
pub mod config;
pub mod cycle;
pub mod domains;
pub mod error;
pub mod liveness;
pub mod notify;
pub mod report;
pub mod sheets;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{BlockwatchError, Result};

pub use checker::{BlockStatus, CheckSession, ResultRow, SessionLauncher, WebDriverLauncher};
pub use config::{environment_summary, Config};
pub use cycle::{CycleOutcome, Monitor, RunMode, Stage};
pub use domains::DomainList;
pub use liveness::LivenessStub;
pub use notify::{Delivery, Notifier, TelegramNotifier};
pub use report::CheckReport;
pub use sheets::{DomainSource, SheetsClient};
