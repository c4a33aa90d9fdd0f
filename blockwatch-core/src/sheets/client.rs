use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::auth::{ServiceAccountKey, TokenProvider};
use super::DomainSource;
use crate::config::SheetConfig;
use crate::domains::DomainList;
use crate::error::{BlockwatchError, Result};

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Reads the domain column of a Google Sheets tab.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: Client,
    api_base: String,
    spreadsheet_id: Option<String>,
    sheet_name: String,
    column: u32,
    credentials_json: Option<String>,
}

impl SheetsClient {
    pub fn new(config: &SheetConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!("blockwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_base: SHEETS_API_BASE.to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            sheet_name: config.sheet_name.clone(),
            column: config.column,
            credentials_json: config.credentials_json.clone(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Read the configured column with an already-issued bearer token.
    pub async fn fetch_column(&self, spreadsheet_id: &str, token: &str) -> Result<DomainList> {
        let range = a1_column_range(&self.sheet_name, self.column);
        let url = values_url(&self.api_base, spreadsheet_id, &range)?;
        debug!(range = %range, "Reading sheet values");

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[("majorDimension", "COLUMNS")])
            .send()
            .await
            .map_err(|e| BlockwatchError::InputFetch(format!("Sheets request failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(BlockwatchError::InputFetch(format!(
                    "spreadsheet {} or sheet {:?} not found",
                    spreadsheet_id, self.sheet_name
                )));
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(BlockwatchError::InputFetch(format!(
                    "access to spreadsheet {} denied (status {})",
                    spreadsheet_id,
                    response.status().as_u16()
                )));
            }
            // The API answers 400 for a range on a tab that does not exist.
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                return Err(BlockwatchError::InputFetch(format!(
                    "range {} rejected: {}",
                    range,
                    body.trim()
                )));
            }
            status => {
                return Err(BlockwatchError::InputFetch(format!(
                    "Sheets API returned status {}",
                    status.as_u16()
                )));
            }
        }

        let value_range: ValueRange = response
            .json()
            .await
            .map_err(|e| BlockwatchError::InputFetch(format!("bad Sheets response: {}", e)))?;

        Ok(DomainList::new(
            value_range.values.into_iter().next().unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl DomainSource for SheetsClient {
    #[instrument(skip(self), fields(sheet = %self.sheet_name))]
    async fn fetch_domains(&self) -> Result<DomainList> {
        let spreadsheet_id = self
            .spreadsheet_id
            .as_deref()
            .ok_or(BlockwatchError::ConfigMissing("SPREADSHEET_ID"))?;
        let credentials = self
            .credentials_json
            .as_deref()
            .ok_or(BlockwatchError::ConfigMissing("GSPREAD_CREDENTIALS"))?;

        let key = ServiceAccountKey::from_json(credentials)?;
        let token = TokenProvider::new(self.http.clone(), key)
            .access_token()
            .await?;

        let domains = self.fetch_column(spreadsheet_id, &token).await?;
        debug!(count = domains.len(), "Fetched domain list");
        Ok(domains)
    }
}

/// Convert a 1-based column index to its A1 letters (1 = A, 27 = AA).
pub fn column_letter(index: u32) -> String {
    let mut letters = Vec::new();
    let mut n = index;
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// A1 range covering a whole column of a tab, e.g. `'My Sheet'!B:B`.
pub fn a1_column_range(sheet_name: &str, column: u32) -> String {
    let letter = column_letter(column);
    format!(
        "'{}'!{}:{}",
        sheet_name.replace('\'', "''"),
        letter,
        letter
    )
}

fn values_url(api_base: &str, spreadsheet_id: &str, range: &str) -> Result<Url> {
    let mut url = Url::parse(api_base)
        .map_err(|e| BlockwatchError::InputFetch(format!("bad Sheets API base: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| BlockwatchError::InputFetch("Sheets API base cannot hold a path".to_string()))?
        .pop_if_empty()
        .extend(["v4", "spreadsheets", spreadsheet_id, "values", range]);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    fn client(api_base: &str) -> SheetsClient {
        SheetsClient::new(&SheetConfig {
            spreadsheet_id: Some("sheet-id".to_string()),
            sheet_name: "TELEGRAM UPDATE".to_string(),
            column: 2,
            credentials_json: None,
        })
        .unwrap()
        .with_api_base(api_base)
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(2), "B");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(703), "AAA");
    }

    #[test]
    fn test_a1_range_quotes_sheet_name() {
        assert_eq!(a1_column_range("TELEGRAM UPDATE", 2), "'TELEGRAM UPDATE'!B:B");
        assert_eq!(a1_column_range("Bob's list", 1), "'Bob''s list'!A:A");
    }

    #[test]
    fn test_values_url_encodes_range() {
        let url = values_url("https://sheets.googleapis.com", "abc", "'A B'!B:B").unwrap();
        assert!(url
            .as_str()
            .starts_with("https://sheets.googleapis.com/v4/spreadsheets/abc/values/"));
        assert!(!url.path().contains(' '));
    }

    #[tokio::test]
    async fn test_fetch_column_preserves_order() {
        let (base, server) = serve_once(
            200,
            r#"{"range":"'TELEGRAM UPDATE'!B1:B4","majorDimension":"COLUMNS","values":[["b.com","a.com","","b.com"]]}"#,
        )
        .await;

        let domains = client(&base).fetch_column("sheet-id", "tok").await.unwrap();
        assert_eq!(domains.iter().collect::<Vec<_>>(), vec!["b.com", "a.com", "b.com"]);

        let request = server.await.unwrap();
        assert_eq!(request.method, "GET");
        assert!(request.target.starts_with("/v4/spreadsheets/sheet-id/values/"));
        assert!(request.target.contains("majorDimension=COLUMNS"));
        assert_eq!(request.header("authorization"), Some("Bearer tok"));
    }

    #[tokio::test]
    async fn test_fetch_column_empty_is_not_an_error() {
        let (base, server) = serve_once(
            200,
            r#"{"range":"'TELEGRAM UPDATE'!B1:B1000","majorDimension":"COLUMNS"}"#,
        )
        .await;

        let domains = client(&base).fetch_column("sheet-id", "tok").await.unwrap();
        assert!(domains.is_empty());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_column_not_found() {
        let (base, server) = serve_once(404, r#"{"error":{"code":404}}"#).await;

        let err = client(&base).fetch_column("missing", "tok").await.unwrap_err();
        match err {
            BlockwatchError::InputFetch(msg) => assert!(msg.contains("not found")),
            other => panic!("Expected InputFetch, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_column_access_denied() {
        let (base, server) = serve_once(
            403,
            r#"{"error":{"code":403,"status":"PERMISSION_DENIED"}}"#,
        )
        .await;

        let err = client(&base).fetch_column("sheet-id", "tok").await.unwrap_err();
        match err {
            BlockwatchError::InputFetch(msg) => {
                assert!(msg.contains("denied"), "{}", msg);
                assert!(msg.contains("403"), "{}", msg);
            }
            other => panic!("Expected InputFetch, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_column_missing_tab_rejected() {
        let (base, server) = serve_once(
            400,
            r#"{"error":{"code":400,"message":"Unable to parse range: 'TELEGRAM UPDATE'!B:B"}}"#,
        )
        .await;

        let err = client(&base).fetch_column("sheet-id", "tok").await.unwrap_err();
        match err {
            BlockwatchError::InputFetch(msg) => {
                assert!(msg.starts_with("range 'TELEGRAM UPDATE'!B:B rejected"), "{}", msg);
                assert!(msg.contains("Unable to parse range"), "{}", msg);
            }
            other => panic!("Expected InputFetch, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_domains_requires_settings() {
        let err = client("http://127.0.0.1:9").fetch_domains().await.unwrap_err();
        assert!(matches!(err, BlockwatchError::ConfigMissing("GSPREAD_CREDENTIALS")));

        let mut no_id = client("http://127.0.0.1:9");
        no_id.spreadsheet_id = None;
        no_id.credentials_json = Some(r#"{"client_email":"a@b.c","private_key":"k"}"#.to_string());
        let err = no_id.fetch_domains().await.unwrap_err();
        assert!(matches!(err, BlockwatchError::ConfigMissing("SPREADSHEET_ID")));
    }
}
