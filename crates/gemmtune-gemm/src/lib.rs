#[macro_use]
extern crate derive_new;

/// Problem descriptors, element types and errors.
pub mod components;

/// Kernel specifications and the catalog they are selected from.
pub mod catalog;

/// Ranking of catalog kernels for a problem.
pub mod heuristic;

/// Host execution of catalog kernels.
pub mod kernels;

mod base;
mod gemm;
mod tune;
mod tune_key;

/// Tests and test helpers, exported with the `export_tests` feature.
#[cfg(any(test, feature = "export_tests"))]
pub mod tests;

pub use base::*;
pub use gemm::*;
pub use tune::{GemmTuneInputs, launch_tuned};
pub use tune_key::*;
