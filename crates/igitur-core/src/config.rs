//! Configuration module for igitur.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::report::CollisionPolicy;
use crate::ports::image_compressor::CompressionSettings;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for igitur.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub transfer: TransferConfig,
    pub images: ImagesConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
}

/// Where the session lives and which service it talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// JSON profile written by `igitur login`.
    pub profile_path: PathBuf,
    /// Login form of the central auth host.
    pub login_url: String,
    /// Parent domain of all instances, e.g. `gaudeam.de`.
    pub service_domain: String,
}

/// Tree transfer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Entries requested per folder listing page.
    pub page_size: u32,
    /// Retries of a transient per-file failure before it is recorded.
    pub max_retries: u32,
    /// First backoff delay in milliseconds; doubles on every retry.
    pub retry_base_delay_ms: u64,
    /// Handling of duplicate names inside one source folder.
    pub collision_policy: CollisionPolicy,
}

/// Settings of the `upload-images` path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG re-encode quality, 1-100.
    pub jpeg_quality: u8,
    /// Extensions (with leading dot) that are compressed and uploaded.
    pub allowed_extensions: Vec<String>,
    /// Files whose name contains any of these (case-insensitive) are skipped.
    pub skip_names: Vec<String>,
}

/// Event media settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Window used by `download-event-media-last-days` when DAYS is omitted.
    pub default_days: u32,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/igitur/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("igitur")
            .join("config.yaml")
    }
}

impl TransferConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl ImagesConfig {
    pub fn compression_settings(&self) -> CompressionSettings {
        CompressionSettings {
            max_width: self.max_width,
            max_height: self.max_height,
            jpeg_quality: self.jpeg_quality,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            profile_path: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join(".igitur_session"),
            login_url: "https://auth.gaudeam.de/login".to_string(),
            service_domain: "gaudeam.de".to_string(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            page_size: 80,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            collision_policy: CollisionPolicy::Fail,
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        let defaults = CompressionSettings::default();
        Self {
            max_width: defaults.max_width,
            max_height: defaults.max_height,
            jpeg_quality: defaults.jpeg_quality,
            allowed_extensions: vec![".jpg".into(), ".jpeg".into(), ".png".into()],
            skip_names: Vec::new(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { default_days: 7 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"transfer.page_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- session ---
        if !self.session.login_url.starts_with("http://")
            && !self.session.login_url.starts_with("https://")
        {
            errors.push(ValidationError {
                field: "session.login_url".into(),
                message: format!("must be an http(s) URL, got {:?}", self.session.login_url),
            });
        }
        if self.session.service_domain.is_empty()
            || self.session.service_domain.contains('/')
            || self.session.service_domain.starts_with('.')
        {
            errors.push(ValidationError {
                field: "session.service_domain".into(),
                message: format!(
                    "must be a bare domain such as gaudeam.de, got {:?}",
                    self.session.service_domain
                ),
            });
        }
        if self.session.profile_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "session.profile_path".into(),
                message: "must not be empty".into(),
            });
        }

        // --- transfer ---
        if self.transfer.page_size == 0 {
            errors.push(ValidationError {
                field: "transfer.page_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.transfer.max_retries > 10 {
            errors.push(ValidationError {
                field: "transfer.max_retries".into(),
                message: format!("must be at most 10, got {}", self.transfer.max_retries),
            });
        }

        // --- images ---
        if self.images.max_width == 0 {
            errors.push(ValidationError {
                field: "images.max_width".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.images.max_height == 0 {
            errors.push(ValidationError {
                field: "images.max_height".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.images.jpeg_quality == 0 || self.images.jpeg_quality > 100 {
            errors.push(ValidationError {
                field: "images.jpeg_quality".into(),
                message: format!(
                    "must be between 1 and 100, got {}",
                    self.images.jpeg_quality
                ),
            });
        }
        if self.images.allowed_extensions.is_empty() {
            errors.push(ValidationError {
                field: "images.allowed_extensions".into(),
                message: "must list at least one extension".into(),
            });
        }
        for ext in &self.images.allowed_extensions {
            if !ext.starts_with('.') || ext.len() < 2 {
                errors.push(ValidationError {
                    field: "images.allowed_extensions".into(),
                    message: format!("extension must start with a dot, got {ext:?}"),
                });
            }
        }
        if self.images.skip_names.iter().any(|s| s.is_empty()) {
            errors.push(ValidationError {
                field: "images.skip_names".into(),
                message: "empty pattern would skip every file".into(),
            });
        }

        // --- events ---
        if self.events.default_days == 0 {
            errors.push(ValidationError {
                field: "events.default_days".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "must be one of {VALID_LOG_LEVELS:?}, got {:?}",
                    self.logging.level
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`], starting from defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- session ---

    pub fn session_profile_path(mut self, path: PathBuf) -> Self {
        self.config.session.profile_path = path;
        self
    }

    pub fn session_login_url(mut self, url: impl Into<String>) -> Self {
        self.config.session.login_url = url.into();
        self
    }

    pub fn session_service_domain(mut self, domain: impl Into<String>) -> Self {
        self.config.session.service_domain = domain.into();
        self
    }

    // --- transfer ---

    pub fn transfer_page_size(mut self, n: u32) -> Self {
        self.config.transfer.page_size = n;
        self
    }

    pub fn transfer_max_retries(mut self, n: u32) -> Self {
        self.config.transfer.max_retries = n;
        self
    }

    pub fn transfer_retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.transfer.retry_base_delay_ms = ms;
        self
    }

    pub fn transfer_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.config.transfer.collision_policy = policy;
        self
    }

    // --- images ---

    pub fn images_max_size(mut self, width: u32, height: u32) -> Self {
        self.config.images.max_width = width;
        self.config.images.max_height = height;
        self
    }

    pub fn images_jpeg_quality(mut self, quality: u8) -> Self {
        self.config.images.jpeg_quality = quality;
        self
    }

    pub fn images_allowed_extensions(mut self, exts: Vec<String>) -> Self {
        self.config.images.allowed_extensions = exts;
        self
    }

    pub fn images_skip_names(mut self, names: Vec<String>) -> Self {
        self.config.images.skip_names = names;
        self
    }

    // --- events / logging ---

    pub fn events_default_days(mut self, days: u32) -> Self {
        self.config.events.default_days = days;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
