//! Domain list retrieval from Google Sheets
//!
//! Authenticates with a service-account key and reads a single column of a
//! sheet, keeping row order.

mod auth;
mod client;

pub use auth::{ServiceAccountKey, TokenProvider, SHEETS_READONLY_SCOPE};
pub use client::{a1_column_range, column_letter, SheetsClient};

use async_trait::async_trait;

use crate::domains::DomainList;
use crate::error::Result;

/// Source of the domains checked each cycle.
///
/// An empty list is a valid answer and distinct from an error.
#[async_trait]
pub trait DomainSource: Send + Sync {
    async fn fetch_domains(&self) -> Result<DomainList>;
}
