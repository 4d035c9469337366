//! Subcommands and the wiring they share
//!
//! Every transfer command follows the same steps:
//! 1. Check for a usable session (`igitur login` writes it)
//! 2. Build the Gaudeam adapters for the session's instance
//! 3. Run the engine and print its report

pub mod auth;
pub mod completions;
pub mod events;
pub mod maintenance;
pub mod transfer;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::info;

use igitur_core::config::Config;
use igitur_core::domain::newtypes::LocalPath;
use igitur_core::domain::session::SessionToken;
use igitur_core::ports::session::ISessionProvider;
use igitur_gaudeam::{GaudeamClient, GaudeamDriveProvider, GaudeamSessionProvider};
use igitur_sync::{EngineOptions, LocalFileSystemAdapter, ReconciliationEngine, SyncError};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Settings every command runs with
pub struct Context {
    pub config: Config,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl Context {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn session_provider(&self) -> Result<GaudeamSessionProvider> {
        GaudeamSessionProvider::new(&self.config.session)
    }

    /// Validated session and a client for its instance
    ///
    /// # Errors
    /// `SyncError::Auth` if no session is stored or it was rejected
    pub async fn connect(&self) -> Result<(SessionToken, GaudeamClient)> {
        let provider = self.session_provider()?;
        let token = provider
            .current_session()
            .await
            .context("Failed to check the stored session")?
            .ok_or_else(|| SyncError::Auth("no valid session".to_string()))?;

        info!(subdomain = %token.subdomain(), "Using stored session");
        let client = provider
            .client_for(&token)
            .with_max_retries(self.config.transfer.max_retries);
        Ok((token, client))
    }

    /// Engine over the drive of `client` and the local disk
    pub fn engine(&self, client: GaudeamClient) -> ReconciliationEngine {
        let drive = GaudeamDriveProvider::new(client).with_page_size(self.config.transfer.page_size);
        ReconciliationEngine::new(Arc::new(drive), Arc::new(LocalFileSystemAdapter::new()))
            .with_options(EngineOptions::from(&self.config.transfer))
    }
}

/// Absolute form of a path given on the command line
pub fn local_path(path: &Path) -> Result<LocalPath> {
    LocalPath::resolve(path).with_context(|| format!("Invalid path {}", path.display()))
}
