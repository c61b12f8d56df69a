//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.statustally.toml` files.

use crate::cli::OutputFormat;
use crate::aggregator::client::DEFAULT_USER_AGENT;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".statustally.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Show a live progress spinner while fetching.
    #[serde(default = "default_true")]
    pub progress: bool,

    /// Interval between progress refreshes, in milliseconds.
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            verbose: false,
            progress: true,
            progress_interval_ms: default_progress_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_progress_interval() -> u64 {
    200
}

/// Request dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum requests in flight. Unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Capacity of the channel between the input reader and the dispatcher.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Cancel the whole run after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_seconds: Option<u64>,

    /// `User-Agent` header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            timeout_seconds: default_timeout(),
            queue_capacity: default_queue_capacity(),
            deadline_seconds: None,
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.statustally.toml` from `dir`.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if args.verbose {
            self.general.verbose = true;
        }
        if args.no_progress || args.quiet {
            self.general.progress = false;
        }

        if let Some(concurrency) = args.concurrency {
            self.fetch.concurrency = Some(concurrency);
        }
        if let Some(timeout) = args.timeout {
            self.fetch.timeout_seconds = timeout;
        }
        if let Some(deadline) = args.deadline {
            self.fetch.deadline_seconds = Some(deadline);
        }
    }

    /// Reject settings that cannot produce a working run.
    ///
    /// Call after [`merge_with_args`](Self::merge_with_args) so file values
    /// get the same checks as flags.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.timeout_seconds == 0 {
            bail!("fetch.timeout_seconds must be at least 1");
        }
        if self.fetch.deadline_seconds == Some(0) {
            bail!("fetch.deadline_seconds must be at least 1");
        }
        if self.fetch.concurrency == Some(0) {
            bail!("fetch.concurrency must be at least 1");
        }
        if self.fetch.queue_capacity == 0 {
            bail!("fetch.queue_capacity must be at least 1");
        }
        if self.fetch.user_agent.trim().is_empty() {
            bail!("fetch.user_agent must not be empty");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
