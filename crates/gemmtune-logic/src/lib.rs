//! Benchmark configurations, the benchmark harness and solution libraries of gemmtune.
//!
//! A [benchmark configuration](config::BenchmarkConfig) lists problem types with the sizes and
//! kernels to measure. [Running](bench::run_benchmarks) it produces a report from which
//! [logic files](library::LogicFile) are written, and logic files of many devices are merged into
//! [solution libraries](library::create_library) consulted by the heuristic.

#[macro_use]
extern crate derive_new;

/// Benchmark harness and its report.
pub mod bench;

/// Benchmark configuration files.
pub mod config;

/// Logic files and the solution libraries created from them.
pub mod library;
