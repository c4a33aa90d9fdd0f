//! The fetch → check → report loop.
//!
//! A cycle runs its stages in order and stops at the first failure. Cycles
//! never overlap; the loop sleeps for the configured interval between them and
//! keeps going whatever a cycle did, panics included.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tracing::{error, info, info_span, instrument, Instrument};

use crate::checker::{run_session, SessionLauncher, WebDriverLauncher};
use crate::config::{Config, ScheduleConfig};
use crate::error::{panic_message, BlockwatchError, Result};
use crate::notify::{Delivery, Notifier, TelegramNotifier};
use crate::report::{escape_markdown_v2, CheckReport, MESSAGE_LIMIT};
use crate::sheets::{DomainSource, SheetsClient};

/// Whether a cycle reports its own failures to the chat.
///
/// Only the first cycle does, so operators get immediate feedback at startup
/// without a notice for every transient failure afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    FirstRun,
    Subsequent,
}

impl RunMode {
    pub fn notifies_failures(self) -> bool {
        matches!(self, RunMode::FirstRun)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    InputFetch,
    BrowserLaunch,
    PageInteraction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::InputFetch => "input fetch",
            Stage::BrowserLaunch => "browser launch",
            Stage::PageInteraction => "page interaction",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum CycleOutcome {
    Reported {
        report: CheckReport,
        delivery: Delivery,
    },
    /// The domain list was empty
    Skipped,
    Failed {
        stage: Stage,
        error: BlockwatchError,
    },
}

/// Text of the notice sent when a first-run stage fails.
pub fn failure_notice(stage: Stage) -> String {
    escape_markdown_v2(&format!("❌ Domain check failed ({}).", stage))
}

/// Result of a run of stages, tagged with the stage that failed.
pub type StageResult<T> = std::result::Result<T, (Stage, BlockwatchError)>;

pub struct Monitor {
    source: Arc<dyn DomainSource>,
    launcher: Arc<dyn SessionLauncher>,
    notifier: Arc<dyn Notifier>,
    schedule: ScheduleConfig,
}

impl Monitor {
    pub fn new(
        source: Arc<dyn DomainSource>,
        launcher: Arc<dyn SessionLauncher>,
        notifier: Arc<dyn Notifier>,
        schedule: ScheduleConfig,
    ) -> Self {
        Self {
            source,
            launcher,
            notifier,
            schedule,
        }
    }

    /// Wire up the Sheets, WebDriver and Telegram implementations.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            Arc::new(SheetsClient::new(&config.sheet)?),
            Arc::new(WebDriverLauncher::new(&config.checker)),
            Arc::new(TelegramNotifier::new(&config.telegram)?),
            config.schedule.clone(),
        ))
    }

    /// Check the domains once and report the result without sending it.
    pub async fn check_once(&self) -> StageResult<Option<CheckReport>> {
        let domains = self
            .source
            .fetch_domains()
            .await
            .map_err(|e| (Stage::InputFetch, e))?;
        if domains.is_empty() {
            return Ok(None);
        }

        info!(domains = domains.len(), "Checking domains");
        let session = self
            .launcher
            .launch()
            .await
            .map_err(|e| (Stage::BrowserLaunch, e))?;
        let rows = run_session(session, &domains)
            .await
            .map_err(|e| (Stage::PageInteraction, e))?;

        Ok(Some(CheckReport::from_rows(&rows)))
    }

    /// Run one full cycle.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self, mode: RunMode) -> CycleOutcome {
        let report = match self.check_once().await {
            Ok(Some(report)) => report,
            Ok(None) => {
                info!("Domain list is empty, skipping cycle");
                return CycleOutcome::Skipped;
            }
            Err((stage, error)) => return self.fail(mode, stage, error).await,
        };

        let delivery = self.deliver(&report).await;
        info!(
            rows = report.row_count,
            blocked = report.blocked_count,
            delivery = ?delivery,
            "Cycle complete"
        );

        CycleOutcome::Reported { report, delivery }
    }

    /// Send the report in as many parts as the channel needs, stopping at the
    /// first part that is not sent.
    async fn deliver(&self, report: &CheckReport) -> Delivery {
        for part in report.to_markdown_v2_parts(MESSAGE_LIMIT) {
            match self.notifier.send(&part).await {
                Delivery::Sent => {}
                other => return other,
            }
        }
        Delivery::Sent
    }

    async fn fail(&self, mode: RunMode, stage: Stage, error: BlockwatchError) -> CycleOutcome {
        error!(stage = %stage, error = %error, "Cycle failed");

        if mode.notifies_failures() {
            self.notifier.send(&failure_notice(stage)).await;
        }

        CycleOutcome::Failed { stage, error }
    }

    /// Run one cycle, containing any panic. Returns `None` if the cycle panicked.
    pub async fn run_guarded(&self, mode: RunMode) -> Option<CycleOutcome> {
        match AssertUnwindSafe(self.run_cycle(mode)).catch_unwind().await {
            Ok(outcome) => Some(outcome),
            Err(payload) => {
                error!(
                    panic = %panic_message(payload.as_ref()),
                    "Cycle panicked, continuing with the next one"
                );
                None
            }
        }
    }

    /// Repeat cycles forever.
    ///
    /// The first cycle runs immediately when `run_on_startup` is set, otherwise
    /// after one interval. Only the first cycle sends failure notices.
    pub async fn run_forever(&self) {
        info!(
            interval_secs = self.schedule.interval.as_secs(),
            run_on_startup = self.schedule.run_on_startup,
            "Starting check loop"
        );

        let mut number: u64 = 0;
        if !self.schedule.run_on_startup {
            tokio::time::sleep(self.schedule.interval).await;
        }

        loop {
            number += 1;
            let mode = if number == 1 {
                RunMode::FirstRun
            } else {
                RunMode::Subsequent
            };

            let span = info_span!("cycle", number, mode = ?mode);
            self.run_guarded(mode).instrument(span).await;

            tokio::time::sleep(self.schedule.interval).await;
        }
    }
}
