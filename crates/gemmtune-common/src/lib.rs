#![warn(missing_docs)]

//! Common types shared by the gemmtune crates.

#[macro_use]
extern crate derive_new;

/// Backtrace capture for error reporting.
pub mod backtrace;

/// Benchmark duration collection and statistics.
pub mod benchmark;

/// 8-bit floating point types.
pub mod float;

pub use float::*;
