//! Session token entity
//!
//! A [`SessionToken`] is what a successful login leaves behind: the
//! service's session cookie plus the instance subdomain the account
//! belongs to. It is persisted as a small JSON profile and shared
//! read-only by every adapter for the lifetime of one command.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Authenticated session for one service instance
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    /// Value of the `_gaudeam_session` cookie
    #[serde(rename = "gaudeam_session_cookie")]
    cookie: String,
    /// Instance subdomain, e.g. `"aldania"` for `https://aldania.gaudeam.de`
    subdomain: String,
    /// When the login happened; absent in profiles written by older clients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

impl SessionToken {
    /// Creates a new token stamped with the current time
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if the cookie is empty or the
    /// subdomain is not a single DNS label
    pub fn new(cookie: impl Into<String>, subdomain: impl Into<String>) -> Result<Self, DomainError> {
        let cookie = cookie.into();
        let subdomain = subdomain.into();

        if cookie.is_empty() {
            return Err(DomainError::ValidationFailed(
                "Session cookie cannot be empty".to_string(),
            ));
        }
        if subdomain.is_empty()
            || !subdomain
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(DomainError::ValidationFailed(format!(
                "Invalid instance subdomain: {subdomain:?}"
            )));
        }

        Ok(Self {
            cookie,
            subdomain,
            created_at: Some(Utc::now()),
        })
    }

    #[must_use]
    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    #[must_use]
    pub fn subdomain(&self) -> &str {
        &self.subdomain
    }

    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Base URL of the instance under `service_domain` (e.g. `gaudeam.de`)
    #[must_use]
    pub fn instance_url(&self, service_domain: &str) -> String {
        format!("https://{}.{}", self.subdomain, service_domain)
    }
}

// The cookie is a credential; keep it out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("cookie", &"<redacted>")
            .field("subdomain", &self.subdomain)
            .field("created_at", &self.created_at)
            .finish()
    }
}
