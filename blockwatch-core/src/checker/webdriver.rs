use std::time::Duration;

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use super::types::ResultRow;
use super::{CheckSession, SessionLauncher};
use crate::config::CheckerConfig;
use crate::domains::DomainList;
use crate::error::{BlockwatchError, Result};

const CHROME_ARGS: &[&str] = &[
    "--headless=new",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--window-size=1920,1080",
];
const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// DOM hooks of the checker page.
#[derive(Debug, Clone)]
pub struct PageSelectors {
    /// Element id of the domain textarea
    pub domain_input_id: String,
    pub submit_button: String,
    /// Rows of the results table, one per domain
    pub result_rows: String,
    pub result_cell: String,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            domain_input_id: "domains".to_string(),
            submit_button: "button[type='submit']".to_string(),
            result_rows: "table.min-w-full tbody tr".to_string(),
            result_cell: "td".to_string(),
        }
    }
}

/// Starts headless Chrome sessions through a WebDriver server.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    webdriver_url: String,
    page_url: String,
    chrome_binary: Option<String>,
    wait_timeout: Duration,
    settle_delay: Duration,
    selectors: PageSelectors,
}

impl WebDriverLauncher {
    pub fn new(config: &CheckerConfig) -> Self {
        Self {
            webdriver_url: config.webdriver_url.clone(),
            page_url: config.url.clone(),
            chrome_binary: config.chrome_binary.clone(),
            wait_timeout: config.wait_timeout,
            settle_delay: config.settle_delay,
            selectors: PageSelectors::default(),
        }
    }

    pub fn with_selectors(mut self, selectors: PageSelectors) -> Self {
        self.selectors = selectors;
        self
    }

    /// WebDriver capabilities for a headless, sandboxless Chrome with a fixed
    /// viewport.
    pub fn capabilities(&self) -> Map<String, Value> {
        let mut chrome_options = json!({ "args": CHROME_ARGS });
        if let Some(binary) = &self.chrome_binary {
            chrome_options["binary"] = json!(binary);
        }

        let mut caps = Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("goog:chromeOptions".to_string(), chrome_options);
        caps.insert(
            "timeouts".to_string(),
            json!({ "pageLoad": PAGE_LOAD_TIMEOUT.as_millis() as u64 }),
        );
        caps
    }
}

#[async_trait]
impl SessionLauncher for WebDriverLauncher {
    #[instrument(skip(self), fields(webdriver = %self.webdriver_url))]
    async fn launch(&self) -> Result<Box<dyn CheckSession>> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities());

        let client = builder.connect(&self.webdriver_url).await.map_err(|e| {
            BlockwatchError::PageInteraction(format!(
                "could not start browser session at {}: {}",
                self.webdriver_url, e
            ))
        })?;
        debug!("Browser session started");

        Ok(Box::new(WebDriverSession {
            client,
            page_url: self.page_url.clone(),
            wait_timeout: self.wait_timeout,
            settle_delay: self.settle_delay,
            selectors: self.selectors.clone(),
        }))
    }
}

struct WebDriverSession {
    client: Client,
    page_url: String,
    wait_timeout: Duration,
    settle_delay: Duration,
    selectors: PageSelectors,
}

impl WebDriverSession {
    async fn wait_for(&self, locator: Locator<'_>, what: &str) -> Result<Element> {
        self.client
            .wait()
            .at_most(self.wait_timeout)
            .for_element(locator)
            .await
            .map_err(|e| match e {
                CmdError::WaitTimeout => BlockwatchError::Timeout(format!(
                    "{} did not appear within {}s",
                    what,
                    self.wait_timeout.as_secs()
                )),
                other => interaction(what, other),
            })
    }

    async fn scrape_rows(&self) -> Result<Vec<ResultRow>> {
        let rows = self
            .client
            .find_all(Locator::Css(&self.selectors.result_rows))
            .await
            .map_err(|e| interaction("results table", e))?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let cells = row
                .find_all(Locator::Css(&self.selectors.result_cell))
                .await
                .map_err(|e| interaction("result cells", e))?;

            let mut texts = Vec::with_capacity(2);
            for cell in cells.iter().take(2) {
                texts.push(cell.text().await.map_err(|e| interaction("result cell text", e))?);
            }

            match ResultRow::from_cells(&texts) {
                Ok(result) => results.push(result),
                Err(e) => debug!(error = %e, "Skipping result row"),
            }
        }

        Ok(results)
    }
}

#[async_trait]
impl CheckSession for WebDriverSession {
    #[instrument(skip_all, fields(domains = domains.len()))]
    async fn submit_domains(&mut self, domains: &DomainList) -> Result<Vec<ResultRow>> {
        self.client
            .goto(&self.page_url)
            .await
            .map_err(|e| interaction("open checker page", e))?;

        let input = self
            .wait_for(Locator::Id(&self.selectors.domain_input_id), "domain input")
            .await?;
        input
            .clear()
            .await
            .map_err(|e| interaction("clear domain input", e))?;
        input
            .send_keys(&domains.to_form_text())
            .await
            .map_err(|e| interaction("type domains", e))?;

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let submit = self
            .wait_for(Locator::Css(&self.selectors.submit_button), "submit button")
            .await?;
        submit
            .click()
            .await
            .map_err(|e| interaction("click submit", e))?;

        self.wait_for(Locator::Css(&self.selectors.result_rows), "results table")
            .await?;

        let rows = self.scrape_rows().await?;
        info!(rows = rows.len(), "Scraped checker results");
        Ok(rows)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.client
            .close()
            .await
            .map_err(|e| interaction("close browser", e))
    }
}

fn interaction(step: &str, error: CmdError) -> BlockwatchError {
    BlockwatchError::PageInteraction(format!("{}: {}", step, error))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker_config(chrome_binary: Option<&str>) -> CheckerConfig {
        CheckerConfig {
            url: "https://checker.example/".to_string(),
            webdriver_url: "http://localhost:9515".to_string(),
            chrome_binary: chrome_binary.map(String::from),
            wait_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_capabilities_headless_fixed_viewport() {
        let caps = WebDriverLauncher::new(&checker_config(None)).capabilities();
        let args: Vec<&str> = caps["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|a| a.as_str())
            .collect();

        assert!(args.contains(&"--headless=new"));
        assert!(args.contains(&"--no-sandbox"));
        assert!(args.contains(&"--window-size=1920,1080"));
        assert!(caps["goog:chromeOptions"].get("binary").is_none());
        assert_eq!(caps["timeouts"]["pageLoad"], 60_000);
    }

    #[test]
    fn test_capabilities_with_binary() {
        let caps =
            WebDriverLauncher::new(&checker_config(Some("/usr/bin/google-chrome"))).capabilities();
        assert_eq!(caps["goog:chromeOptions"]["binary"], "/usr/bin/google-chrome");
    }

    #[test]
    fn test_default_selectors() {
        let selectors = PageSelectors::default();
        assert_eq!(selectors.domain_input_id, "domains");
        assert_eq!(selectors.submit_button, "button[type='submit']");
        assert_eq!(selectors.result_rows, "table.min-w-full tbody tr");
    }

    #[tokio::test]
    async fn test_launch_fails_without_webdriver() {
        let mut config = checker_config(None);
        config.webdriver_url = "http://127.0.0.1:9".to_string();

        let err = match WebDriverLauncher::new(&config).launch().await {
            Ok(_) => panic!("expected launch to fail"),
            Err(e) => e,
        };
        assert!(matches!(err, BlockwatchError::PageInteraction(_)));
    }
}
