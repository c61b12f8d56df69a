//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// StatusTally - fetch URLs concurrently and count response status codes
///
/// Reads one URL per line, issues a GET for each in parallel and prints
/// how many responses came back with each status code. Requests that fail
/// at the transport level are logged and left out of the tally.
///
/// Examples:
///   statustally --input urls.txt
///   cat urls.txt | statustally --concurrency 32 --format json
///   statustally -i urls.txt --deadline 60 --output tally.json --format json
///   statustally --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// File with one URL per line, or `-` for stdin
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    pub input: PathBuf,

    /// Maximum number of requests in flight
    ///
    /// Unbounded when not set: every URL gets its own task as soon as
    /// it is read.
    #[arg(
        short = 'j',
        long,
        value_name = "NUM",
        env = "STATUSTALLY_CONCURRENCY"
    )]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Stop dispatching new requests after this many seconds
    ///
    /// Requests already in flight are allowed to finish.
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Output format (text, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .statustally.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only, no progress)
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable the live progress spinner
    #[arg(long)]
    pub no_progress: bool,

    /// Generate a default .statustally.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text table (default)
    #[default]
    Text,
    /// JSON document
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(deadline) = self.deadline {
            if deadline == 0 {
                return Err("Deadline must be at least 1 second".to_string());
            }
        }

        if self.input != PathBuf::from("-") {
            if !self.input.exists() {
                return Err(format!(
                    "Input file does not exist: {}",
                    self.input.display()
                ));
            }
            if self.input.is_dir() {
                return Err(format!(
                    "Input path is a directory: {}",
                    self.input.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `verbose_by_default` comes from `[general] verbose`; `--quiet`
    /// overrides it.
    pub fn log_level(&self, verbose_by_default: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || verbose_by_default {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Human-readable name of the URL source.
    pub fn source_name(&self) -> String {
        if self.input == PathBuf::from("-") {
            "stdin".to_string()
        } else {
            self.input.display().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            input: PathBuf::from("-"),
            concurrency: None,
            timeout: None,
            deadline: None,
            format: None,
            output: None,
            config: None,
            verbose: false,
            quiet: false,
            no_progress: false,
            init_config: false,
        }
    }

    #[test]
    fn test_defaults_from_command_line() {
        let args = Args::parse_from(["statustally"]);
        assert_eq!(args.input, PathBuf::from("-"));
        assert_eq!(args.format, None);
        assert!(!args.no_progress);
    }

    #[test]
    fn test_parse_short_flags() {
        let args = Args::parse_from(["statustally", "-i", "urls.txt", "-j", "8", "-v"]);
        assert_eq!(args.input, PathBuf::from("urls.txt"));
        assert_eq!(args.concurrency, Some(8));
        assert!(args.verbose);
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());

        args.timeout = None;
        args.deadline = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_input() {
        let mut args = make_args();
        args.input = PathBuf::from("/definitely/not/here/urls.txt");
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
    }

    #[test]
    fn test_log_level_from_config_verbose() {
        let mut args = make_args();
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.quiet = true;
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }

    #[test]
    fn test_source_name() {
        let mut args = make_args();
        assert_eq!(args.source_name(), "stdin");

        args.input = PathBuf::from("urls.txt");
        assert_eq!(args.source_name(), "urls.txt");
    }
}
