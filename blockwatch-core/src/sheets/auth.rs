use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BlockwatchError, Result};

pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a Google service-account key file that the token flow needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| BlockwatchError::Credentials(format!("malformed service account: {}", e)))
    }

    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchanges a service-account key for a short-lived bearer token.
#[derive(Debug, Clone)]
pub struct TokenProvider {
    http: Client,
    key: ServiceAccountKey,
    scope: &'static str,
}

impl TokenProvider {
    pub fn new(http: Client, key: ServiceAccountKey) -> Self {
        Self {
            http,
            key,
            scope: SHEETS_READONLY_SCOPE,
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        let assertion = self.sign_assertion()?;
        self.exchange(&assertion).await
    }

    /// Build the RS256-signed JWT assertion for the token endpoint.
    pub fn sign_assertion(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: self.scope,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| BlockwatchError::Credentials(format!("unusable private key: {}", e)))?;

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| BlockwatchError::Credentials(format!("failed to sign assertion: {}", e)))
    }

    async fn exchange(&self, assertion: &str) -> Result<String> {
        debug!(token_uri = %self.key.token_uri, "Requesting access token");

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion)])
            .send()
            .await
            .map_err(|e| BlockwatchError::InputFetch(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| match e.error_description {
                    Some(desc) => format!("{} ({})", e.error, desc),
                    None => e.error,
                })
                .unwrap_or_else(|_| format!("status {}", status.as_u16()));
            return Err(BlockwatchError::InputFetch(format!(
                "authentication failed: {}",
                reason
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BlockwatchError::InputFetch(format!("bad token response: {}", e)))?;
        Ok(token.access_token)
    }
}
