#![warn(missing_docs)]

//! Runtime crate for gemmtune.
//!
//! Provides the global configuration and logger, the autotuner, and a host compute device with
//! byte storage and an ordered execution stream.

#[macro_use]
extern crate derive_new;

mod id;

/// Compute client module.
pub mod client;
/// Global configuration module.
pub mod config;
/// Device description module.
pub mod device;
/// Kernel execution and error types.
pub mod server;
/// Compute storage module.
pub mod storage;
/// Execution stream module.
pub mod stream;

/// Autotune module
pub mod tune;

pub use gemmtune_common::benchmark;
