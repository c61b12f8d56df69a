//! Data models for tally reports.
//!
//! This module contains the structures the command-line front end builds
//! from an [`AggregationResult`](crate::aggregator::AggregationResult) once
//! aggregation has finished.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// HTTP status class, derived from the first digit of the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// 1xx
    Informational,
    /// 2xx
    Success,
    /// 3xx
    Redirection,
    /// 4xx
    ClientError,
    /// 5xx
    ServerError,
    /// Anything outside 100-599
    Other,
}

impl StatusClass {
    /// Classify a numeric status code.
    pub fn of(code: u16) -> Self {
        match code {
            100..=199 => StatusClass::Informational,
            200..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirection,
            400..=499 => StatusClass::ClientError,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::Other,
        }
    }

    /// Returns an emoji representation of the class.
    pub fn emoji(&self) -> &'static str {
        match self {
            StatusClass::Informational => "🔵",
            StatusClass::Success => "🟢",
            StatusClass::Redirection => "🟡",
            StatusClass::ClientError => "🟠",
            StatusClass::ServerError => "🔴",
            StatusClass::Other => "⚪",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusClass::Informational => write!(f, "1xx Informational"),
            StatusClass::Success => write!(f, "2xx Success"),
            StatusClass::Redirection => write!(f, "3xx Redirection"),
            StatusClass::ClientError => write!(f, "4xx Client Error"),
            StatusClass::ServerError => write!(f, "5xx Server Error"),
            StatusClass::Other => write!(f, "Other"),
        }
    }
}

/// How the aggregation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The URL stream was read to the end.
    Completed,
    /// Interrupted by the user.
    Interrupted,
    /// The configured deadline elapsed.
    DeadlineExceeded,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Completed => write!(f, "completed"),
            Termination::Interrupted => write!(f, "interrupted"),
            Termination::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Metadata about a tally run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Where URLs were read from.
    pub source: String,
    /// When aggregation started.
    pub started_at: DateTime<Utc>,
    /// Number of URLs handed to the aggregator.
    pub urls_submitted: u64,
    /// Concurrency limit in effect, `None` for unbounded.
    pub max_concurrency: Option<usize>,
    /// How the run ended.
    pub termination: Termination,
    /// Wall-clock duration in seconds.
    pub duration_seconds: f64,
}

/// Final tally of response status codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyReport {
    /// Metadata about the run.
    pub metadata: ReportMetadata,
    /// Count per status code.
    pub counts: BTreeMap<u16, u64>,
    /// Sum of all counts.
    pub successful_responses: u64,
    /// URLs that produced no status (transport failure or never fetched).
    pub unanswered: u64,
}

impl TallyReport {
    /// Build a report from a finished snapshot.
    pub fn new(metadata: ReportMetadata, counts: BTreeMap<u16, u64>) -> Self {
        let successful_responses: u64 = counts.values().sum();
        let unanswered = metadata.urls_submitted.saturating_sub(successful_responses);
        Self {
            metadata,
            counts,
            successful_responses,
            unanswered,
        }
    }

    /// Counts rolled up by status class.
    pub fn by_class(&self) -> BTreeMap<StatusClass, u64> {
        let mut classes = BTreeMap::new();
        for (code, count) in &self.counts {
            *classes.entry(StatusClass::of(*code)).or_default() += count;
        }
        classes
    }
}
