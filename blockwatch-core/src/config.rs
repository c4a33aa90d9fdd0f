//! Process configuration.
//!
//! Settings are read once at startup into an immutable [`Config`] which is then
//! handed to each component. Nothing else in the crate reads the environment.

use std::time::Duration;

use crate::error::{BlockwatchError, Result};

pub const DEFAULT_SHEET_NAME: &str = "TELEGRAM UPDATE";
pub const DEFAULT_DOMAIN_COLUMN: u32 = 2;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(900);
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Every setting read from the environment, and whether its value is secret.
pub const SETTINGS: &[(&str, bool)] = &[
    ("SPREADSHEET_ID", false),
    ("SHEET_NAME", false),
    ("DOMAIN_COLUMN", false),
    ("GSPREAD_CREDENTIALS", true),
    ("CHECK_URL", false),
    ("WEBDRIVER_URL", false),
    ("GOOGLE_CHROME_BIN", false),
    ("WAIT_TIMEOUT_SECS", false),
    ("TELEGRAM_BOT_TOKEN", true),
    ("CHAT_ID", false),
    ("TELEGRAM_API_URL", false),
    ("CHECK_INTERVAL_SECS", false),
    ("RUN_ON_STARTUP", false),
    ("PORT", false),
];

/// Where the domain list lives.
#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub spreadsheet_id: Option<String>,
    pub sheet_name: String,
    /// 1-based column index (2 = column B)
    pub column: u32,
    /// Service-account JSON document
    pub credentials_json: Option<String>,
}

/// How the checker page is reached.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub url: String,
    pub webdriver_url: String,
    pub chrome_binary: Option<String>,
    pub wait_timeout: Duration,
    pub settle_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_url: String,
}

impl TelegramConfig {
    /// Returns the token and chat id when both are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.bot_token.as_deref(), self.chat_id.as_deref()) {
            (Some(token), Some(chat)) => Some((token, chat)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub interval: Duration,
    pub run_on_startup: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub sheet: SheetConfig,
    pub checker: CheckerConfig,
    pub telegram: TelegramConfig,
    pub schedule: ScheduleConfig,
    pub port: u16,
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated the same as absent ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let url = get("CHECK_URL").ok_or(BlockwatchError::ConfigMissing("CHECK_URL"))?;

        let column = parse_or("DOMAIN_COLUMN", get("DOMAIN_COLUMN"), DEFAULT_DOMAIN_COLUMN)?;
        if column == 0 {
            return Err(BlockwatchError::InvalidConfig {
                key: "DOMAIN_COLUMN",
                reason: "columns are numbered from 1".to_string(),
            });
        }

        let interval_secs = parse_positive_secs(
            "CHECK_INTERVAL_SECS",
            get("CHECK_INTERVAL_SECS"),
            DEFAULT_CHECK_INTERVAL,
        )?;
        let wait_secs = parse_positive_secs(
            "WAIT_TIMEOUT_SECS",
            get("WAIT_TIMEOUT_SECS"),
            DEFAULT_WAIT_TIMEOUT,
        )?;

        let run_on_startup = match get("RUN_ON_STARTUP") {
            Some(value) => parse_bool("RUN_ON_STARTUP", &value)?,
            None => true,
        };

        Ok(Self {
            sheet: SheetConfig {
                spreadsheet_id: get("SPREADSHEET_ID"),
                sheet_name: get("SHEET_NAME").unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
                column,
                credentials_json: get("GSPREAD_CREDENTIALS"),
            },
            checker: CheckerConfig {
                url,
                webdriver_url: get("WEBDRIVER_URL")
                    .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string()),
                chrome_binary: get("GOOGLE_CHROME_BIN"),
                wait_timeout: Duration::from_secs(wait_secs),
                settle_delay: DEFAULT_SETTLE_DELAY,
            },
            telegram: TelegramConfig {
                bot_token: get("TELEGRAM_BOT_TOKEN"),
                chat_id: get("CHAT_ID"),
                api_url: get("TELEGRAM_API_URL")
                    .map(|u| u.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            },
            schedule: ScheduleConfig {
                interval: Duration::from_secs(interval_secs),
                run_on_startup,
            },
            port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
        })
    }

    /// Key/value view of the effective settings with secrets masked.
    pub fn redacted(&self) -> Vec<(&'static str, String)> {
        fn show(value: &Option<String>) -> String {
            value.clone().unwrap_or_else(|| "<unset>".to_string())
        }
        fn mask(value: &Option<String>) -> String {
            match value {
                Some(_) => "<set>".to_string(),
                None => "<unset>".to_string(),
            }
        }

        vec![
            ("SPREADSHEET_ID", show(&self.sheet.spreadsheet_id)),
            ("SHEET_NAME", self.sheet.sheet_name.clone()),
            ("DOMAIN_COLUMN", self.sheet.column.to_string()),
            ("GSPREAD_CREDENTIALS", mask(&self.sheet.credentials_json)),
            ("CHECK_URL", self.checker.url.clone()),
            ("WEBDRIVER_URL", self.checker.webdriver_url.clone()),
            ("GOOGLE_CHROME_BIN", show(&self.checker.chrome_binary)),
            (
                "WAIT_TIMEOUT_SECS",
                self.checker.wait_timeout.as_secs().to_string(),
            ),
            ("TELEGRAM_BOT_TOKEN", mask(&self.telegram.bot_token)),
            ("CHAT_ID", show(&self.telegram.chat_id)),
            ("TELEGRAM_API_URL", self.telegram.api_url.clone()),
            (
                "CHECK_INTERVAL_SECS",
                self.schedule.interval.as_secs().to_string(),
            ),
            ("RUN_ON_STARTUP", self.schedule.run_on_startup.to_string()),
            ("PORT", self.port.to_string()),
        ]
    }
}

/// The raw settings as `lookup` provides them, secrets masked. Unlike
/// [`Config::redacted`] this needs no valid configuration.
pub fn environment_summary<F>(lookup: F) -> Vec<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    SETTINGS
        .iter()
        .map(|&(key, secret)| {
            let value = lookup(key).filter(|v| !v.trim().is_empty());
            let shown = match (value, secret) {
                (None, _) => "<unset>".to_string(),
                (Some(_), true) => "<set>".to_string(),
                (Some(v), false) => v,
            };
            (key, shown)
        })
        .collect()
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| BlockwatchError::InvalidConfig {
                key,
                reason: format!("{:?}: {}", raw, e),
            }),
        None => Ok(default),
    }
}

fn parse_positive_secs(
    key: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<u64> {
    match parse_or(key, value, default.as_secs())? {
        0 => Err(BlockwatchError::InvalidConfig {
            key,
            reason: "must be at least 1 second".to_string(),
        }),
        secs => Ok(secs),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(BlockwatchError::InvalidConfig {
            key,
            reason: format!("{:?} is not a boolean", value),
        }),
    }
}
