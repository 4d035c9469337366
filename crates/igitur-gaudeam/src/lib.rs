//! igitur Gaudeam - Gaudeam web API client
//!
//! Provides async adapters for:
//! - Session login against the central auth host and a JSON session profile
//! - Drive folders and files (listing, download, folder creation, upload)
//! - The global calendar, event posts and event media
//!
//! ## Modules
//!
//! - [`auth`] - Login form flow, session profile store, [`GaudeamSessionProvider`]
//! - [`client`] - Cookie-authenticated HTTP client with 429 handling
//! - [`drive`] - Drive endpoint wire types and requests
//! - [`provider`] - [`GaudeamDriveProvider`], the `IRemoteDrive` adapter
//! - [`calendar`] - [`GaudeamEventSource`], the `IEventSource` adapter

pub mod auth;
pub mod calendar;
pub mod client;
pub mod drive;
pub mod provider;

pub use auth::{GaudeamSessionProvider, SessionStore};
pub use calendar::GaudeamEventSource;
pub use client::GaudeamClient;
pub use provider::GaudeamDriveProvider;

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when communicating with a Gaudeam instance
#[derive(Debug, Error)]
pub enum GaudeamError {
    /// The session cookie is missing, expired or was rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded; retry after the specified duration
    #[error("Too many requests (429), retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration to wait before retrying
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The login form was rejected or could not be processed
    #[error("Login failed: {0}")]
    Login(String),

    /// The parent folder's ownership cannot be copied to a new folder
    #[error("Unsupported folder owner type: {0}")]
    UnsupportedOwner(String),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GaudeamError {
    /// Whether this error means the session has to be renewed
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::Login(_))
    }
}
