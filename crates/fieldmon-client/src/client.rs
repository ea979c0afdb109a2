//! HTTP client for the ledger endpoint.
//!
//! The endpoint speaks a single JSON document: `GET` returns the whole
//! ledger, `POST` replaces every collection present in the body. Some
//! deployments (spreadsheet scripts) answer `200` with an error in the body,
//! so both directions inspect the payload as well as the status.

use std::time::Duration;

use fieldmon_core::{AppConfig, Ledger};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};

use crate::error::GatewayError;

const USER_AGENT: &str = "fieldmon/0.1 (field-visits)";

/// Client for one ledger endpoint.
///
/// No request timeout is set unless one is configured; a hung request
/// blocks only the operation that issued it.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    client: Client,
    endpoint: Url,
    api_token: Option<String>,
    plain_text: bool,
}

impl LedgerClient {
    /// Creates a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidEndpoint`] if `endpoint` is not an
    /// absolute URL, or [`GatewayError::Http`] if the underlying
    /// `reqwest::Client` cannot be constructed.
    pub fn new(endpoint: &str, timeout_secs: Option<u64>) -> Result<Self, GatewayError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        let endpoint = Url::parse(endpoint).map_err(|e| GatewayError::InvalidEndpoint {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            endpoint,
            api_token: None,
            plain_text: false,
        })
    }

    /// Builds a client from the endpoint, token, body mode and timeout in `config`.
    ///
    /// # Errors
    ///
    /// See [`LedgerClient::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, GatewayError> {
        Ok(Self::new(&config.remote_url, config.request_timeout_secs)?
            .with_api_token(config.api_token.clone())
            .with_plain_text_body(config.remote_plain_text))
    }

    /// Sends `Authorization: Bearer <token>` on every request.
    #[must_use]
    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token;
        self
    }

    /// Posts the ledger as `text/plain` instead of `application/json`.
    #[must_use]
    pub fn with_plain_text_body(mut self, plain_text: bool) -> Self {
        self.plain_text = plain_text;
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetches the whole ledger.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Http`] on network failure or non-2xx status.
    /// - [`GatewayError::Remote`] if the body carries an `error` field.
    /// - [`GatewayError::Deserialize`] if the body is not a ledger document.
    pub async fn fetch(&self) -> Result<Ledger, GatewayError> {
        let request = self.authorize(self.client.get(self.endpoint.clone()));
        let response = request.send().await?.error_for_status()?;
        let body = response.text().await?;

        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| GatewayError::Deserialize {
                context: format!("GET {}", self.endpoint),
                source: e,
            })?;
        Self::check_remote_error(&value)?;

        serde_json::from_value(value).map_err(|e| GatewayError::Deserialize {
            context: format!("GET {}", self.endpoint),
            source: e,
        })
    }

    /// Replaces the remote ledger with `ledger`, all four collections at once.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Encode`] if the ledger cannot be serialized.
    /// - [`GatewayError::Http`] on network failure or non-2xx status.
    /// - [`GatewayError::Remote`] if the body reports `success: false`.
    pub async fn save(&self, ledger: &Ledger) -> Result<(), GatewayError> {
        let body = serde_json::to_string(ledger).map_err(GatewayError::Encode)?;
        let content_type = if self.plain_text {
            "text/plain;charset=utf-8"
        } else {
            "application/json"
        };

        let request = self
            .authorize(self.client.post(self.endpoint.clone()))
            .header(CONTENT_TYPE, content_type)
            .body(body);
        let response = request.send().await?.error_for_status()?;
        let body = response.text().await?;

        // Acknowledgement bodies are informational; only an explicit failure counts.
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
            Self::check_remote_error(&value)?;
        }
        Ok(())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Returns an error when the payload carries `success: false` or a
    /// non-null top-level `error`.
    fn check_remote_error(body: &serde_json::Value) -> Result<(), GatewayError> {
        let failed = body.get("success").and_then(serde_json::Value::as_bool) == Some(false);
        let error = body.get("error").filter(|e| !e.is_null());

        if failed || error.is_some() {
            let message = match error {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .map_or_else(|| other.to_string(), ToOwned::to_owned),
                None => "unknown error".to_string(),
            };
            return Err(GatewayError::Remote(message));
        }
        Ok(())
    }
}
