//! igitur CLI - Command-line client for Gaudeam
//!
//! Provides commands for:
//! - Logging in and out of a Gaudeam instance
//! - Downloading and uploading drive folder trees
//! - Uploading compressed images
//! - Downloading event media grouped by uploader
//! - Removing duplicate entries and empty folders from a drive tree

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use igitur_core::config::Config;

mod commands;
mod output;

use commands::{
    auth::{LoginCommand, LogoutCommand, StatusCommand},
    completions::CompletionsCommand,
    events::{DownloadEventMediaCommand, DownloadEventMediaLastDaysCommand},
    maintenance::{DeleteDuplicatesCommand, DeleteEmptyFoldersCommand},
    transfer::{DownloadCommand, UploadCommand, UploadImagesCommand},
    Context as CommandContext,
};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "igitur", version, about = "Command-line client for Gaudeam drives and events")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log in and store the session
    Login(LoginCommand),
    /// Remove the stored session
    Logout(LogoutCommand),
    /// Show the logged-in member
    Status(StatusCommand),
    /// Download a drive folder tree
    Download(DownloadCommand),
    /// Upload a local folder tree
    Upload(UploadCommand),
    /// Upload compressed copies of the images in a local folder tree
    UploadImages(UploadImagesCommand),
    /// Download the media of one event, one folder per uploader
    DownloadEventMedia(DownloadEventMediaCommand),
    /// Download the media of all events of the last days
    #[command(alias = "download-event-media-days", allow_missing_positional = true)]
    DownloadEventMediaLastDays(DownloadEventMediaLastDaysCommand),
    /// Delete later entries sharing a name with an earlier sibling
    DeleteDuplicates(DeleteDuplicatesCommand),
    /// Delete folders that contain nothing below the given folder
    DeleteEmptyFolders(DeleteEmptyFoldersCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };

    let errors = config.validate();
    if !errors.is_empty() {
        let list: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration: {}", list.join("; "));
    }
    Ok(config)
}

fn init_tracing(cli: &Cli, config_level: &str) {
    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => config_level,
        (false, 1) => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, format: OutputFormat) -> Result<()> {
    // Completions need no configuration
    if let Commands::Completions(cmd) = &cli.command {
        return cmd.execute(format).await;
    }

    let config = load_config(cli.config.as_ref())?;
    init_tracing(&cli, &config.logging.level);

    let ctx = CommandContext {
        config,
        format,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Login(cmd) => cmd.execute(&ctx).await,
        Commands::Logout(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::Download(cmd) => cmd.execute(&ctx).await,
        Commands::Upload(cmd) => cmd.execute(&ctx).await,
        Commands::UploadImages(cmd) => cmd.execute(&ctx).await,
        Commands::DownloadEventMedia(cmd) => cmd.execute(&ctx).await,
        Commands::DownloadEventMediaLastDays(cmd) => cmd.execute(&ctx).await,
        Commands::DeleteDuplicates(cmd) => cmd.execute(&ctx).await,
        Commands::DeleteEmptyFolders(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let quiet = cli.quiet;

    match run(cli, format).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            get_formatter(format, quiet).error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
