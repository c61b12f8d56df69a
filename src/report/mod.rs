//! Report generation for finished tallies.

pub mod generator;

pub use generator::*;
