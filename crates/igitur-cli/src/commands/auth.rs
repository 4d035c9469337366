//! Session commands
//!
//! 1. `login` - Posts the Gaudeam login form and stores the session profile.
//! 2. `logout` - Removes the session profile.
//! 3. `status` - Shows the logged-in member and instance.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context as _, Result};
use clap::Args;
use tracing::info;

use igitur_core::ports::session::ISessionProvider;
use igitur_sync::SyncError;

use super::Context;

#[derive(Debug, Args)]
pub struct LoginCommand {
    /// Account email; prompted for if omitted
    #[arg(short = 'u', long = "user")]
    pub email: Option<String>,

    /// Account password; prompted for without echo if omitted
    #[arg(short, long)]
    pub password: Option<String>,
}

fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

impl LoginCommand {
    /// Execute the login flow:
    /// 1. Ask for missing credentials
    /// 2. Post the login form and store the session profile
    /// 3. Fetch the member to confirm the session works
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();

        let email = match &self.email {
            Some(email) => email.clone(),
            None => tokio::task::block_in_place(|| prompt_line("Email: "))?,
        };
        if email.is_empty() {
            bail!("An email address is required");
        }
        let password = match &self.password {
            Some(password) => password.clone(),
            None => tokio::task::block_in_place(|| rpassword::prompt_password("Password: "))
                .context("Failed to read password")?,
        };

        info!(email = %email, "Logging in");
        fmt.info("Logging in...");

        let provider = ctx.session_provider()?;
        let token = provider.login(&email, &password).await?;
        let member = provider
            .member_info(&token)
            .await
            .context("Logged in, but the instance rejected the new session")?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "authenticated": true,
                "email": member.email,
                "instance_url": member.instance_url,
                "profile": provider.store().path().display().to_string(),
            }));
        } else {
            fmt.success(&format!("Logged in as {}", member.email));
            fmt.info(&format!("Instance: {}", member.instance_url));
            fmt.info(&format!("Session stored in {}", provider.store().path().display()));
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct LogoutCommand;

impl LogoutCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let removed = ctx.session_provider()?.logout().await?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({ "logged_out": removed }));
        } else if removed {
            fmt.success("Logged out successfully");
        } else {
            fmt.info("No stored session. Nothing to log out.");
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct StatusCommand;

impl StatusCommand {
    /// Exits non-zero when there is no usable session
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let provider = ctx.session_provider()?;

        let Some(token) = provider.current_session().await? else {
            if ctx.is_json() {
                fmt.print_json(&serde_json::json!({ "authenticated": false }));
            }
            return Err(SyncError::Auth("no valid session".to_string()).into());
        };
        let member = provider.member_info(&token).await?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "authenticated": true,
                "email": member.email,
                "instance_url": member.instance_url,
                "logged_in_at": token.created_at().map(|t| t.to_rfc3339()),
            }));
        } else {
            fmt.success(&format!("Logged in as {}", member.email));
            fmt.info(&format!("Instance:     {}", member.instance_url));
            match token.created_at() {
                Some(at) => fmt.info(&format!(
                    "Logged in at: {}",
                    at.format("%Y-%m-%d %H:%M:%S UTC")
                )),
                None => fmt.info("Logged in at: unknown"),
            }
        }
        Ok(())
    }
}
