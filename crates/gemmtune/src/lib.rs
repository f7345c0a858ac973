//! Tune, benchmark and select GEMM kernels.
//!
//! This crate gathers the gemmtune crates and hosts the `gemmtune` command line tool.

pub use gemmtune_common as common;
pub use gemmtune_gemm as gemm;
pub use gemmtune_logic as logic;
pub use gemmtune_runtime as runtime;

/// The mixed float8 GEMM walkthrough.
pub mod sample;
