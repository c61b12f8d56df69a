//! URL input handling.
//!
//! Reads URLs from a file or stdin and forwards them to the aggregator's
//! input channel.

pub mod reader;

pub use reader::*;
