use serde::{Deserialize, Serialize};

use crate::error::{BlockwatchError, Result};

/// Verdict reported by the checker page for one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum BlockStatus {
    NotBlocked,
    Blocked,
    /// Any other text the page shows, kept verbatim.
    Unknown(String),
}

impl BlockStatus {
    /// Classify the status cell text. Matching is exact after whitespace is
    /// collapsed and ignores case.
    pub fn parse(text: &str) -> Self {
        let text = collapse_whitespace(text);
        match text.to_lowercase().as_str() {
            "blocked" => BlockStatus::Blocked,
            "not blocked" => BlockStatus::NotBlocked,
            _ => BlockStatus::Unknown(text),
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, BlockStatus::Blocked)
    }
}

/// One row of the checker's results table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub domain: String,
    pub status: BlockStatus,
}

impl ResultRow {
    pub fn new(domain: impl Into<String>, status: BlockStatus) -> Self {
        Self {
            domain: domain.into(),
            status,
        }
    }

    /// Build a row from the cell texts of a table row. Rows with fewer than two
    /// cells are not results.
    pub fn from_cells<S: AsRef<str>>(cells: &[S]) -> Result<Self> {
        match cells {
            [domain, status, ..] => Ok(Self::new(
                collapse_whitespace(domain.as_ref()),
                BlockStatus::parse(status.as_ref()),
            )),
            _ => Err(BlockwatchError::Format(format!(
                "expected domain and status cells, found {}",
                cells.len()
            ))),
        }
    }
}

/// Wrapped cells come back from the browser with embedded line breaks.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
