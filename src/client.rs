//! REST collaborator for the streaming client.
//!
//! [`BreezeClient`] covers the two HTTP calls the socket layer depends on:
//! the customer-details session bootstrap, which yields the
//! [`SessionCredentials`] presented in every socket authentication frame,
//! and the daily security-master download that populates a
//! [`TokenRegistry`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::constants::{API_BASE_URL, STOCK_SCRIPT_CSV_URL};
use crate::error::{BreezeError, Result};
use crate::instruments::TokenRegistry;
use crate::types::instrument::SessionCredentials;

/// Request body of the customer-details call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CustomerDetailsRequest<'a> {
    session_token: &'a str,
    app_key: &'a str,
}

/// The fields of the customer-details response that matter here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CustomerDetailsResponse {
    success: Option<CustomerDetails>,
    status: Option<u16>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    session_token: Option<String>,
}

/// HTTP client for the Breeze REST endpoints used by the streaming layer.
///
/// # Example
///
/// ```no_run
/// use breeze_rs::client::BreezeClient;
/// use breeze_rs::instruments::TokenRegistry;
///
/// # #[tokio::main]
/// # async fn main() -> breeze_rs::Result<()> {
/// let client = BreezeClient::new("your-app-key")?;
/// let credentials = client.generate_session("api-session-token").await?;
///
/// let registry = TokenRegistry::new();
/// client.download_security_master(&registry).await?;
/// # let _ = credentials;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BreezeClient {
    http: reqwest::Client,
    /// Application key issued by the Breeze developer portal.
    api_key: String,
    /// Base URL for REST requests (defaults to [`API_BASE_URL`]).
    base_url: String,
    /// Security-master archive URL (defaults to [`STOCK_SCRIPT_CSV_URL`]).
    security_master_url: String,
}

impl BreezeClient {
    /// Create a client against the production endpoints.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, API_BASE_URL)
    }

    /// Create a client pointing at a custom REST base URL.
    ///
    /// Useful for testing against a mock server.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .default_headers(Self::default_headers())
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            security_master_url: STOCK_SCRIPT_CSV_URL.to_owned(),
        })
    }

    /// Override the security-master URL.
    pub fn with_security_master_url(mut self, url: impl Into<String>) -> Self {
        self.security_master_url = url.into();
        self
    }

    /// Returns a reference to the underlying `reqwest::Client`.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Session bootstrap
    // -----------------------------------------------------------------------

    /// Exchange an API session token for socket credentials.
    ///
    /// The customer-details endpoint answers with a base64 `user:key` pair
    /// under `Success.session_token`.
    pub async fn generate_session(&self, session_token: &str) -> Result<SessionCredentials> {
        let url = format!("{}/customerdetails", self.base_url);
        tracing::debug!(%url, "GET customer details");

        let body = CustomerDetailsRequest {
            session_token,
            app_key: &self.api_key,
        };
        let resp = self.http.get(&url).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        let parsed: CustomerDetailsResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(BreezeError::HttpStatus { status, body: text });
            }
            Err(e) => return Err(e.into()),
        };

        let credentials = parse_customer_details(parsed)?;
        tracing::info!(user_id = %credentials.user_id, "Session established");
        Ok(credentials)
    }

    // -----------------------------------------------------------------------
    // Security master
    // -----------------------------------------------------------------------

    /// Download the security master into `registry`. Returns the number of
    /// instruments loaded; on failure the registry keeps its previous
    /// tables.
    pub async fn download_security_master(&self, registry: &TokenRegistry) -> Result<usize> {
        Ok(registry
            .refresh(&self.http, &self.security_master_url)
            .await?)
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers
    }
}

/// Turn a customer-details body into credentials or a session error.
fn parse_customer_details(resp: CustomerDetailsResponse) -> Result<SessionCredentials> {
    if let Some(encoded) = resp.success.and_then(|s| s.session_token) {
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| BreezeError::Session(format!("session token is not base64: {e}")))?;
        let decoded = String::from_utf8_lossy(&decoded);
        let (user_id, session_key) = decoded
            .split_once(':')
            .ok_or_else(|| BreezeError::Session("invalid session token format".to_owned()))?;
        return Ok(SessionCredentials::new(user_id, session_key));
    }

    if resp.status.is_some_and(|s| s != 200) {
        if let Some(error) = resp.error {
            return Err(BreezeError::Session(session_error_message(&error).to_owned()));
        }
    }

    Err(BreezeError::Session(
        "unexpected format in customer details response".to_owned(),
    ))
}

fn session_error_message(api_error: &str) -> &'static str {
    match api_error {
        "Invalid session." => "session key is incorrect",
        "Public Key does not exist." => "app key is incorrect",
        "Resource not available." => "session key has expired",
        _ => "customer details request failed",
    }
}
