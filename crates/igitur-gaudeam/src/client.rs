//! Gaudeam API client
//!
//! Provides a typed HTTP client for the JSON API of one Gaudeam instance.
//! Handles the session cookie, endpoint construction, status mapping and
//! 429 back-off. Endpoint groups live in [`crate::drive`] and
//! [`crate::calendar`] as further `impl GaudeamClient` blocks.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use igitur_gaudeam::client::GaudeamClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = GaudeamClient::with_base_url("cookie-value", "https://aldania.gaudeam.de");
//! let member = client.current_member().await?;
//! println!("Hello, {}", member.personal_record.email);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use igitur_core::domain::session::SessionToken;
use reqwest::header::{ACCEPT, COOKIE, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::GaudeamError;

/// Name of the session cookie set by the auth host
pub const SESSION_COOKIE: &str = "_gaudeam_session";

/// Default retry-after duration when the header is missing
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(10);

/// Upper bound for a server-requested back-off
const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Maximum number of retries for 429 responses
const DEFAULT_MAX_RETRIES: u32 = 3;

// ============================================================================
// API response types
// ============================================================================

/// Response from `/api/v1/current_member`
#[derive(Debug, Deserialize)]
pub struct CurrentMember {
    pub personal_record: PersonalRecord,
}

#[derive(Debug, Deserialize)]
pub struct PersonalRecord {
    pub email: String,
}

// ============================================================================
// GaudeamClient
// ============================================================================

/// HTTP client for one Gaudeam instance
///
/// Wraps `reqwest::Client` with the session cookie and base URL
/// construction. Cheap to clone.
#[derive(Clone)]
pub struct GaudeamClient {
    /// The underlying HTTP client
    client: Client,
    /// Instance base URL, e.g. `https://aldania.gaudeam.de`
    base_url: String,
    /// Value of the session cookie
    cookie: String,
    /// Retries of a 429 response before giving up
    max_retries: u32,
}

impl GaudeamClient {
    /// Creates a client for the instance a session token belongs to
    ///
    /// # Arguments
    /// * `token` - A logged-in session
    /// * `service_domain` - Parent domain of all instances, e.g. `gaudeam.de`
    pub fn new(token: &SessionToken, service_domain: &str) -> Self {
        Self::with_base_url(token.cookie(), token.instance_url(service_domain))
    }

    /// Creates a client with a custom base URL (useful for testing)
    pub fn with_base_url(cookie: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie: cookie.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Sets how many 429 responses are absorbed before a request fails
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns the instance base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to the base URL (e.g. "/api/v1/current_member")
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .header(COOKIE, format!("{SESSION_COOKIE}={}", self.cookie))
            .header(ACCEPT, "application/json")
    }

    /// Creates a request builder for an absolute URL
    ///
    /// The session cookie is attached only when the URL points at this
    /// instance; media originals and upload endpoints live elsewhere.
    pub fn request_url(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        if url.starts_with(&self.base_url) {
            builder.header(COOKIE, format!("{SESSION_COOKIE}={}", self.cookie))
        } else {
            builder
        }
    }

    /// Sends a request with 429 handling and maps error statuses
    ///
    /// `build` is called once per attempt because a `RequestBuilder` is
    /// consumed by sending it.
    ///
    /// # Returns
    /// The successful HTTP response, or a [`GaudeamError`] (wrapped in
    /// `anyhow`) describing the failure.
    pub async fn execute_with_retry<F>(&self, label: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let response = build()
                .send()
                .await
                .map_err(GaudeamError::NetworkError)
                .with_context(|| format!("Failed to send request: {label}"))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .map(parse_retry_after)
                    .unwrap_or(DEFAULT_RETRY_AFTER);

                if attempt >= self.max_retries {
                    warn!(label, attempts = attempt + 1, "429 retry limit exhausted");
                    return Err(GaudeamError::TooManyRequests { retry_after })
                        .with_context(|| format!("{label}: retry limit exhausted"));
                }

                info!(
                    label,
                    attempt,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Received 429, backing off"
                );
                tokio::time::sleep(retry_after).await;
                attempt += 1;
                continue;
            }

            if status.is_success() {
                if attempt > 0 {
                    info!(label, attempt, "Request succeeded after retry");
                }
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, label, &body)).context(label.to_string());
        }
    }

    /// GET `path` and deserialize the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!(path, "GET");
        let response = self
            .execute_with_retry(path, || self.request(Method::GET, path))
            .await?;
        parse_json(response, path).await
    }

    /// POST a JSON body to `path` and deserialize the JSON response
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        debug!(path, "POST");
        let response = self
            .execute_with_retry(path, || self.request(Method::POST, path).json(body))
            .await?;
        parse_json(response, path).await
    }

    /// DELETE `path`, ignoring the response body
    pub async fn delete(&self, path: &str) -> Result<()> {
        debug!(path, "DELETE");
        self.execute_with_retry(path, || self.request(Method::DELETE, path))
            .await?;
        Ok(())
    }

    /// GET `path` and return the raw body
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let response = self
            .execute_with_retry(path, || self.request(Method::GET, path))
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(GaudeamError::NetworkError)
            .with_context(|| format!("Failed to read response body of {path}"))?;
        debug!(path, bytes = bytes.len(), "Downloaded");
        Ok(bytes.to_vec())
    }

    /// GET an absolute URL and return the raw body
    pub async fn get_bytes_from_url(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .execute_with_retry(url, || self.request_url(Method::GET, url))
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(GaudeamError::NetworkError)
            .with_context(|| format!("Failed to read response body of {url}"))?;
        debug!(url, bytes = bytes.len(), "Downloaded");
        Ok(bytes.to_vec())
    }

    /// Retrieves the member the session belongs to
    ///
    /// Succeeds only for a session the instance still accepts, so this
    /// doubles as the session validity check.
    pub async fn current_member(&self) -> Result<CurrentMember> {
        self.get_json("/api/v1/current_member").await
    }

    /// Returns a reference to the underlying HTTP client
    pub(crate) fn http_client(&self) -> &Client {
        &self.client
    }
}

/// Maps a non-success status to a [`GaudeamError`]
fn status_error(status: StatusCode, label: &str, body: &str) -> GaudeamError {
    let detail = format!("{label} returned {status}: {}", truncate(body, 200));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GaudeamError::Unauthorized(detail),
        StatusCode::NOT_FOUND => GaudeamError::NotFound(detail),
        s if s.is_server_error() => GaudeamError::ServerError(detail),
        _ => GaudeamError::InvalidResponse(detail),
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response, label: &str) -> Result<T> {
    let text = response
        .text()
        .await
        .map_err(GaudeamError::NetworkError)
        .with_context(|| format!("Failed to read response body of {label}"))?;
    serde_json::from_str(&text)
        .map_err(|e| GaudeamError::InvalidResponse(format!("{label}: {e}")))
        .context("Failed to parse JSON response")
}

/// Parses a `Retry-After` value in seconds or as an HTTP date
pub(crate) fn parse_retry_after(value: &str) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds).min(MAX_RETRY_AFTER);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let wait = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        if let Ok(wait) = wait.to_std() {
            return wait.min(MAX_RETRY_AFTER);
        }
        return Duration::ZERO;
    }

    warn!(value, "Could not parse Retry-After header, using default");
    DEFAULT_RETRY_AFTER
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
