//! Concurrent status-code aggregation.
//!
//! This module contains the fetch dispatcher, the HTTP client seam it
//! depends on, and the shared result it writes into.

pub mod client;
pub mod dispatcher;
pub mod result;

pub use dispatcher::{Aggregator, AggregatorOptions};
pub use result::AggregationResult;
