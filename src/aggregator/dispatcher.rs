//! Concurrent fetch dispatch.
//!
//! [`Aggregator::aggregate`] returns immediately with a live
//! [`AggregationResult`]. Behind it run three kinds of tasks:
//!
//! - a dispatch loop that reads URLs and launches one fetch task per URL,
//! - the fetch tasks themselves,
//! - a completion watcher that waits for the dispatch loop to stop, joins
//!   every fetch task it launched, and only then marks the result done.
//!
//! Failed requests are logged and left out of the tally.

use crate::aggregator::client::{FetchResponse, HttpClient, ReqwestClient};
use crate::aggregator::result::AggregationResult;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors raised before any aggregation work starts.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// `aggregate` was called outside a tokio runtime.
    #[error("aggregation requires a running tokio runtime")]
    NoRuntime,

    /// A concurrency limit of zero would never dispatch anything.
    #[error("concurrency limit must be at least 1")]
    InvalidConcurrency,

    /// The default HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Tuning knobs for an [`Aggregator`].
#[derive(Debug, Clone, Default)]
pub struct AggregatorOptions {
    /// Maximum number of requests in flight. `None` launches one task per
    /// URL as soon as it is read.
    pub max_concurrency: Option<usize>,
}

/// Fans URLs out to concurrent `GET` requests and tallies status codes.
#[derive(Debug)]
pub struct Aggregator<C: HttpClient = ReqwestClient> {
    client: Arc<C>,
    options: AggregatorOptions,
}

impl Aggregator<ReqwestClient> {
    /// Create an aggregator backed by the default reqwest client.
    #[allow(dead_code)] // The CLI always sets a timeout
    pub fn new() -> Result<Self, AggregateError> {
        Ok(Self::with_client(ReqwestClient::new()?))
    }

    /// Create an aggregator whose default client uses `timeout` per request
    /// and identifies itself as `user_agent`.
    pub fn with_settings(timeout: Duration, user_agent: &str) -> Result<Self, AggregateError> {
        Ok(Self::with_client(ReqwestClient::with_settings(
            timeout, user_agent,
        )?))
    }
}

impl<C: HttpClient> Aggregator<C> {
    /// Create an aggregator around an injected client.
    pub fn with_client(client: C) -> Self {
        Self {
            client: Arc::new(client),
            options: AggregatorOptions::default(),
        }
    }

    /// Replace the aggregator options.
    pub fn with_options(mut self, options: AggregatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Start aggregating status codes for every URL received on `urls`.
    ///
    /// Returns as soon as the background tasks are spawned. The returned
    /// result is marked done once `urls` is closed (or `cancel` fires) and
    /// every launched request has finished.
    pub fn aggregate(
        &self,
        cancel: CancellationToken,
        urls: mpsc::Receiver<String>,
    ) -> Result<AggregationResult, AggregateError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| AggregateError::NoRuntime)?;

        let limiter = match self.options.max_concurrency {
            Some(0) => return Err(AggregateError::InvalidConcurrency),
            Some(limit) => Some(Arc::new(Semaphore::new(limit))),
            None => None,
        };

        let result = AggregationResult::new();
        let dispatch = Dispatch {
            client: Arc::clone(&self.client),
            result: result.clone(),
            cancel,
            limiter,
        };

        let dispatch_handle = runtime.spawn(dispatch.run(urls));

        let watched = result.clone();
        runtime.spawn(async move {
            // Nothing can be launched once the dispatch loop has returned,
            // so joining its task set covers every fetch of this run.
            match dispatch_handle.await {
                Ok(mut tasks) => {
                    while let Some(joined) = tasks.join_next().await {
                        log_join_error(joined);
                    }
                }
                Err(e) => warn!("Dispatch loop terminated abnormally: {}", e),
            }
            watched.mark_done();
            info!("Aggregation complete: {} successful responses", watched.total());
        });

        Ok(result)
    }
}

struct Dispatch<C: HttpClient> {
    client: Arc<C>,
    result: AggregationResult,
    cancel: CancellationToken,
    limiter: Option<Arc<Semaphore>>,
}

impl<C: HttpClient> Dispatch<C> {
    /// Read URLs until the stream closes or cancellation is requested.
    ///
    /// Returns the still-running fetch tasks for the completion watcher.
    async fn run(self, mut urls: mpsc::Receiver<String>) -> JoinSet<()> {
        let mut tasks = JoinSet::new();
        let mut dispatched = 0usize;

        loop {
            let Some(slot) = self.acquire_slot().await else {
                break;
            };

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Cancellation requested, stopping dispatch");
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_join_error(joined);
                }
                next = urls.recv() => match next {
                    Some(url) => {
                        dispatched += 1;
                        tasks.spawn(fetch(
                            Arc::clone(&self.client),
                            self.result.clone(),
                            self.cancel.clone(),
                            url,
                            slot,
                        ));
                    }
                    None => {
                        debug!("URL stream closed");
                        break;
                    }
                },
            }
        }

        debug!(
            "Dispatch loop finished after {} URLs, {} requests still running",
            dispatched,
            tasks.len()
        );
        tasks
    }

    /// Wait for room to launch another request.
    ///
    /// Returns `None` when cancellation fires first.
    async fn acquire_slot(&self) -> Option<Slot> {
        let Some(limiter) = &self.limiter else {
            return Some(Slot::Unbounded);
        };

        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => None,
            permit = Arc::clone(limiter).acquire_owned() => {
                // The semaphore is never closed.
                permit.ok().map(Slot::Bounded)
            }
        }
    }
}

/// Capacity held by a fetch task for its whole lifetime.
enum Slot {
    Unbounded,
    Bounded(#[allow(dead_code)] OwnedSemaphorePermit),
}

async fn fetch<C: HttpClient>(
    client: Arc<C>,
    result: AggregationResult,
    cancel: CancellationToken,
    url: String,
    _slot: Slot,
) {
    if cancel.is_cancelled() {
        debug!("Skipping {}: aggregation cancelled", url);
        return;
    }

    let response = match client.get(&url).await {
        Ok(response) => response,
        Err(e) => {
            warn!("GET {} error: {}", url, e);
            return;
        }
    };

    let status = response.status();
    if let Err(e) = response.drain().await {
        debug!("GET {}: failed to drain body: {}", url, e);
    }

    debug!("GET {} -> {}", url, status);
    result.record_status(status);
}

fn log_join_error(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            warn!("Fetch task panicked: {}", e);
        }
    }
}
