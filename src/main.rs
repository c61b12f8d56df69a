//! StatusTally - concurrent HTTP status-code counter
//!
//! A CLI tool that reads URLs, fetches them in parallel and reports how
//! many responses came back with each status code.
//!
//! Exit codes:
//!   0   - Success
//!   1   - Runtime error (bad config, unreadable input, etc.)
//!   130 - Interrupted with Ctrl-C (the partial report is still written)

mod aggregator;
mod cli;
mod config;
mod input;
mod models;
mod report;

use aggregator::{AggregationResult, Aggregator, AggregatorOptions};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use models::{ReportMetadata, TallyReport, Termination};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so `[general] verbose` applies
    let (mut config, origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);
    if let Err(e) = config.validate() {
        eprintln!("Error: invalid configuration: {:#}", e);
        std::process::exit(1);
    }

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("StatusTally v{}", env!("CARGO_PKG_VERSION"));
    origin.log();
    debug!("Arguments: {:?}", args);
    debug!("Effective configuration: {:?}", config);

    match run_tally(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Tally failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .statustally.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so that a report written to stdout stays parseable.
/// `RUST_LOG` refines the level chosen by the flags.
fn init_logging(level: Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete tally workflow. Returns the process exit code.
async fn run_tally(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();
    let started_at = Utc::now();

    // Build the aggregator
    let aggregator = Aggregator::with_settings(
        Duration::from_secs(config.fetch.timeout_seconds),
        &config.fetch.user_agent,
    )
    .context("Failed to initialize HTTP client")?
        .with_options(AggregatorOptions {
            max_concurrency: config.fetch.concurrency,
        });

    // Wire cancellation sources
    let cancel = CancellationToken::new();
    let reason = Arc::new(OnceLock::new());
    spawn_interrupt_handler(cancel.clone(), Arc::clone(&reason));
    if let Some(deadline) = config.fetch.deadline_seconds {
        spawn_deadline(
            Duration::from_secs(deadline),
            cancel.clone(),
            Arc::clone(&reason),
        );
    }

    // Start aggregation and feed it
    let source = input::open_source(&args.input).await?;
    let (tx, rx) = mpsc::channel(config.fetch.queue_capacity);
    let result = aggregator
        .aggregate(cancel.clone(), rx)
        .context("Failed to start aggregation")?;
    let feeder = tokio::spawn(input::feed_urls(source, tx, cancel.clone()));

    info!(
        "Fetching URLs from {} (concurrency: {})",
        args.source_name(),
        config
            .fetch
            .concurrency
            .map_or_else(|| "unbounded".to_string(), |n| n.to_string())
    );

    if config.general.progress {
        show_progress(&result, Duration::from_millis(config.general.progress_interval_ms)).await?;
    } else {
        result.wait_done().await;
    }

    let stats = feeder.await.context("Input reader task failed")??;
    if stats.skipped > 0 {
        warn!("Skipped {} lines that were not HTTP(S) URLs", stats.skipped);
    }

    let termination = reason.get().copied().unwrap_or(Termination::Completed);
    let metadata = ReportMetadata {
        source: args.source_name(),
        started_at,
        urls_submitted: stats.submitted,
        max_concurrency: config.fetch.concurrency,
        termination,
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };
    let tally = TallyReport::new(metadata, result.snapshot());

    // Generate and write the report
    let output = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&tally)?,
        OutputFormat::Text => report::generate_text_report(&tally),
    };
    report::write_output(&output, args.output.as_deref()).with_context(|| match &args.output {
        Some(path) => format!("Failed to write report to {}", path.display()),
        None => "Failed to write report to stdout".to_string(),
    })?;

    if let Some(path) = &args.output {
        if !args.quiet {
            println!(
                "✅ {} responses from {} URLs. Report saved to: {}",
                tally.successful_responses,
                tally.metadata.urls_submitted,
                path.display()
            );
        }
    }

    match termination {
        Termination::Interrupted => Ok(130),
        _ => Ok(0),
    }
}

/// Poll the live result and render it on a spinner until it is done.
async fn show_progress(result: &AggregationResult, interval: Duration) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
    let done = result.wait_done();
    tokio::pin!(done);

    loop {
        tokio::select! {
            _ = &mut done => break,
            _ = ticker.tick() => {
                spinner.set_message(report::progress_line(&result.snapshot()));
            }
        }
    }

    spinner.finish_and_clear();
    Ok(())
}

/// Cancel the run on Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken, reason: Arc<OnceLock<Termination>>) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                    return;
                }
                warn!("Interrupted, waiting for in-flight requests to finish");
                let _ = reason.set(Termination::Interrupted);
                cancel.cancel();
            }
        }
    });
}

/// Cancel the run once `deadline` has elapsed.
fn spawn_deadline(
    deadline: Duration,
    cancel: CancellationToken,
    reason: Arc<OnceLock<Termination>>,
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(deadline) => {
                warn!("Deadline of {:?} reached, no new requests will be sent", deadline);
                let _ = reason.set(Termination::DeadlineExceeded);
                cancel.cancel();
            }
        }
    });
}

/// Where the effective configuration came from.
///
/// Loading happens before the subscriber is installed, so the outcome is
/// logged afterwards.
enum ConfigOrigin {
    Explicit(PathBuf),
    DefaultFile,
    Builtin,
    DefaultFileInvalid(anyhow::Error),
}

impl ConfigOrigin {
    fn log(&self) {
        match self {
            ConfigOrigin::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigOrigin::DefaultFile => info!("Loaded default config from {}", CONFIG_FILE_NAME),
            ConfigOrigin::Builtin => debug!("No config file found, using defaults"),
            ConfigOrigin::DefaultFileInvalid(e) => {
                warn!("Failed to load config, using defaults: {:#}", e)
            }
        }
    }
}

/// Load configuration from file or use defaults.
///
/// An explicit `--config` must load; a broken default file falls back to
/// the built-in defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigOrigin::Explicit(config_path.clone())));
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigOrigin::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigOrigin::Builtin)),
        Err(e) => Ok((Config::default(), ConfigOrigin::DefaultFileInvalid(e))),
    }
}
