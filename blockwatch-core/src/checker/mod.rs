//! Checker page automation
//!
//! The checker is an untyped third-party page. It is only reached through the
//! [`SessionLauncher`] and [`CheckSession`] traits, so every DOM detail stays in
//! the WebDriver implementation.

mod types;
mod webdriver;

pub use types::{BlockStatus, ResultRow};
pub use webdriver::{PageSelectors, WebDriverLauncher};

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::domains::DomainList;
use crate::error::{panic_message, BlockwatchError, Result};

/// One live browser session against the checker page.
#[async_trait]
pub trait CheckSession: Send {
    /// Open the page, submit the list and scrape the results table.
    async fn submit_domains(&mut self, domains: &DomainList) -> Result<Vec<ResultRow>>;

    /// Tear the session down.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Creates a fresh session for each cycle.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn CheckSession>>;
}

/// Run the check on an open session and close it exactly once, whether the
/// interaction succeeded, failed or panicked.
pub async fn run_session(
    mut session: Box<dyn CheckSession>,
    domains: &DomainList,
) -> Result<Vec<ResultRow>> {
    let outcome = AssertUnwindSafe(session.submit_domains(domains))
        .catch_unwind()
        .await;

    match session.close().await {
        Ok(()) => debug!("Browser session closed"),
        Err(e) => warn!(error = %e, "Failed to close browser session"),
    }

    match outcome {
        Ok(result) => result,
        Err(payload) => Err(BlockwatchError::PageInteraction(format!(
            "page interaction panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Script {
        Rows(Vec<ResultRow>),
        Fail,
        Panic,
    }

    struct TrackedSession {
        script: Script,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CheckSession for TrackedSession {
        async fn submit_domains(&mut self, _domains: &DomainList) -> Result<Vec<ResultRow>> {
            match &self.script {
                Script::Rows(rows) => Ok(rows.clone()),
                Script::Fail => Err(BlockwatchError::Timeout("results table".to_string())),
                Script::Panic => panic!("selector exploded"),
            }
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn session(script: Script, closes: &Arc<AtomicUsize>) -> Box<dyn CheckSession> {
        Box::new(TrackedSession {
            script,
            closes: closes.clone(),
        })
    }

    #[tokio::test]
    async fn test_session_closed_after_success() {
        let closes = Arc::new(AtomicUsize::new(0));
        let rows = vec![ResultRow::new("a.com", BlockStatus::Blocked)];

        let result = run_session(
            session(Script::Rows(rows.clone()), &closes),
            &DomainList::new(["a.com"]),
        )
        .await;

        assert_eq!(result.unwrap(), rows);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_closed_after_error() {
        let closes = Arc::new(AtomicUsize::new(0));

        let result = run_session(session(Script::Fail, &closes), &DomainList::new(["a.com"])).await;

        assert!(matches!(result, Err(BlockwatchError::Timeout(_))));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_closed_after_panic() {
        let closes = Arc::new(AtomicUsize::new(0));

        let result =
            run_session(session(Script::Panic, &closes), &DomainList::new(["a.com"])).await;

        match result {
            Err(BlockwatchError::PageInteraction(msg)) => assert!(msg.contains("selector exploded")),
            other => panic!("Expected PageInteraction, got {:?}", other),
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
