//! Session provider port
//!
//! Login, persistence and validation of a [`SessionToken`]. The CLI uses
//! this port to check for a usable session before any transfer starts.

use serde::{Deserialize, Serialize};

use crate::domain::session::SessionToken;

/// Basic information about the logged-in member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub email: String,
    /// Base URL of the instance the member belongs to
    pub instance_url: String,
}

/// Session lifecycle operations
#[async_trait::async_trait]
pub trait ISessionProvider: Send + Sync {
    /// Authenticate with email and password and persist the resulting session
    async fn login(&self, email: &str, password: &str) -> anyhow::Result<SessionToken>;

    /// Load the persisted session and check it is still accepted
    ///
    /// # Returns
    /// `None` if no session is stored or the service rejects it
    async fn current_session(&self) -> anyhow::Result<Option<SessionToken>>;

    /// Remove the persisted session
    ///
    /// # Returns
    /// `true` if a stored session was removed
    async fn logout(&self) -> anyhow::Result<bool>;

    /// Look up the member a session belongs to
    async fn member_info(&self, token: &SessionToken) -> anyhow::Result<MemberInfo>;
}
