use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockwatchError {
    #[error("Missing required setting: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    InvalidConfig { key: &'static str, reason: String },

    #[error("Failed to fetch domain list: {0}")]
    InputFetch(String),

    #[error("Invalid store credentials: {0}")]
    Credentials(String),

    #[error("Page interaction failed: {0}")]
    PageInteraction(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Unexpected result row: {0}")]
    Format(String),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Listener error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BlockwatchError>;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
