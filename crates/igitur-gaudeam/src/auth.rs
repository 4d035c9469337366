//! Session login for Gaudeam instances
//!
//! Gaudeam has no token API; a session is obtained the way a browser gets
//! one. The login page is fetched for its CSRF token, the credential form
//! is posted without following redirects, and a `302` carries both the
//! session cookie and, in `Location`, the member's instance.
//!
//! ## Components
//!
//! - [`extract_authenticity_token`] - CSRF token lookup in the login page
//! - [`SessionStore`] - JSON session profile on disk
//! - [`GaudeamSessionProvider`] - `ISessionProvider` adapter

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::header::{LOCATION, SET_COOKIE};
use reqwest::{redirect, Client, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use url::Url;

use igitur_core::config::SessionConfig;
use igitur_core::domain::session::SessionToken;
use igitur_core::ports::session::{ISessionProvider, MemberInfo};

use crate::client::{GaudeamClient, SESSION_COOKIE};
use crate::GaudeamError;

/// Label of the login form's submit button
const LOGIN_COMMIT: &str = "Einloggen";

// ============================================================================
// Login page parsing
// ============================================================================

/// Finds the value of the hidden `authenticity_token` input in a page
pub fn extract_authenticity_token(html: &str) -> Option<String> {
    let input_re = Regex::new(r"(?is)<input\b[^>]*>").ok()?;
    let name_re = Regex::new(r#"(?i)\bname\s*=\s*["']authenticity_token["']"#).ok()?;
    let value_re = Regex::new(r#"(?i)\bvalue\s*=\s*["']([^"']*)["']"#).ok()?;

    let token = input_re
        .find_iter(html)
        .map(|m| m.as_str())
        .find(|tag| name_re.is_match(tag))
        .and_then(|tag| value_re.captures(tag))
        .map(|c| c[1].to_string());
    token
}

/// Instance subdomain from the post-login redirect target
///
/// `https://aldania.gaudeam.de/` yields `aldania` for domain `gaudeam.de`.
pub fn subdomain_from_location(location: &str, service_domain: &str) -> Option<String> {
    let url = Url::parse(location).ok()?;
    let host = url.host_str()?;
    let sub = host.strip_suffix(service_domain)?.strip_suffix('.')?;
    if sub.is_empty() || sub.contains('.') || sub == "auth" {
        return None;
    }
    Some(sub.to_string())
}

/// Value of the session cookie among `Set-Cookie` header values
pub fn session_cookie_from_headers<'a>(
    set_cookies: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    let prefix = format!("{SESSION_COOKIE}=");
    set_cookies.into_iter().find_map(|header| {
        let pair = header.split(';').next()?.trim();
        let value = pair.strip_prefix(&prefix)?;
        (!value.is_empty()).then(|| value.to_string())
    })
}

// ============================================================================
// SessionStore
// ============================================================================

/// JSON session profile on disk
///
/// The file holds `{"gaudeam_session_cookie": ..., "subdomain": ...}` and
/// is readable by its owner only.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored session
    ///
    /// # Returns
    /// `None` if no profile exists
    pub async fn load(&self) -> Result<Option<SessionToken>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No session profile");
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read session profile {}", self.path.display())
                })
            }
        };

        let token: SessionToken = serde_json::from_str(&content).with_context(|| {
            format!("Session profile {} is corrupt", self.path.display())
        })?;
        Ok(Some(token))
    }

    /// Writes the session atomically, replacing any previous profile
    pub async fn save(&self, token: &SessionToken) -> Result<()> {
        let json = serde_json::to_vec_pretty(token).context("Failed to serialize session")?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        // A stale tmp file may carry wider permissions; the mode below only
        // applies to a newly created file.
        let tmp_path = self.path.with_extension("tmp");
        match tokio::fs::remove_file(&tmp_path).await {
            Ok(()) => debug!(path = %tmp_path.display(), "Removed stale session tmp file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove {}", tmp_path.display()))
            }
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&tmp_path)
            .await
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        file.write_all(&json)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        file.sync_all()
            .await
            .with_context(|| format!("Failed to flush {}", tmp_path.display()))?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to move session profile into {}", self.path.display()))?;

        debug!(path = %self.path.display(), "Saved session profile");
        Ok(())
    }

    /// Deletes the profile
    ///
    /// # Returns
    /// `true` if a profile was removed
    pub async fn remove(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to delete {}", self.path.display())),
        }
    }
}

// ============================================================================
// GaudeamSessionProvider
// ============================================================================

/// `ISessionProvider` backed by the Gaudeam login form and a [`SessionStore`]
pub struct GaudeamSessionProvider {
    /// Client that keeps cookies between login page and form post and
    /// never follows redirects
    http: Client,
    login_url: String,
    service_domain: String,
    store: SessionStore,
    /// Instance base URL override (useful for testing)
    instance_base_url: Option<String>,
}

impl GaudeamSessionProvider {
    /// Creates a provider from the session section of the configuration
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            login_url: config.login_url.clone(),
            service_domain: config.service_domain.clone(),
            store: SessionStore::new(config.profile_path.clone()),
            instance_base_url: None,
        })
    }

    /// Talk to `base_url` instead of the instance derived from the session
    pub fn with_instance_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.instance_base_url = Some(base_url.into());
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// API client for the instance `token` belongs to
    pub fn client_for(&self, token: &SessionToken) -> GaudeamClient {
        match &self.instance_base_url {
            Some(base) => GaudeamClient::with_base_url(token.cookie(), base.clone()),
            None => GaudeamClient::new(token, &self.service_domain),
        }
    }

    /// Runs the login form flow without touching the store
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<SessionToken> {
        let page = self
            .http
            .get(&self.login_url)
            .send()
            .await
            .map_err(GaudeamError::NetworkError)
            .context("Failed to fetch login page")?
            .text()
            .await
            .map_err(GaudeamError::NetworkError)
            .context("Failed to read login page")?;

        let csrf = extract_authenticity_token(&page).ok_or_else(|| {
            GaudeamError::Login("login page has no authenticity_token".to_string())
        })?;

        let form = [
            ("authenticity_token", csrf.as_str()),
            ("user[email]", email),
            ("user[password]", password),
            ("user[remember_me]", "0"),
            ("user[remember_me]", "1"),
            ("user[anchor_after_login]", ""),
            ("commit", LOGIN_COMMIT),
        ];

        let response = self
            .http
            .post(&self.login_url)
            .form(&form)
            .send()
            .await
            .map_err(GaudeamError::NetworkError)
            .context("Failed to submit login form")?;

        if response.status() != StatusCode::FOUND {
            warn!(status = %response.status(), "Login form was not accepted");
            return Err(GaudeamError::Login(
                "credentials were rejected, check email and password".to_string(),
            )
            .into());
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| GaudeamError::Login("redirect without Location".to_string()))?;
        let subdomain = subdomain_from_location(location, &self.service_domain).ok_or_else(|| {
            GaudeamError::Login(format!("unexpected redirect target {location}"))
        })?;

        let cookie = session_cookie_from_headers(
            response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        )
        .ok_or_else(|| GaudeamError::Login(format!("no {SESSION_COOKIE} cookie in reply")))?;

        let token = SessionToken::new(cookie, subdomain)?;
        info!(subdomain = token.subdomain(), "Logged in");
        Ok(token)
    }
}

#[async_trait::async_trait]
impl ISessionProvider for GaudeamSessionProvider {
    async fn login(&self, email: &str, password: &str) -> Result<SessionToken> {
        let token = self.authenticate(email, password).await?;
        self.store.save(&token).await?;
        Ok(token)
    }

    #[instrument(skip(self))]
    async fn current_session(&self) -> Result<Option<SessionToken>> {
        let Some(token) = self.store.load().await? else {
            return Ok(None);
        };

        match self.client_for(&token).current_member().await {
            Ok(_) => Ok(Some(token)),
            Err(e) => match e.downcast_ref::<GaudeamError>() {
                Some(err) if err.is_auth_error() || matches!(err, GaudeamError::InvalidResponse(_)) => {
                    warn!(error = %e, "Stored session is no longer accepted");
                    Ok(None)
                }
                _ => Err(e.context("Failed to validate stored session")),
            },
        }
    }

    async fn logout(&self) -> Result<bool> {
        let removed = self.store.remove().await?;
        if removed {
            info!(path = %self.store.path().display(), "Session profile removed");
        }
        Ok(removed)
    }

    async fn member_info(&self, token: &SessionToken) -> Result<MemberInfo> {
        let client = self.client_for(token);
        let member = client.current_member().await?;
        Ok(MemberInfo {
            email: member.personal_record.email,
            instance_url: client.base_url().to_string(),
        })
    }
}
