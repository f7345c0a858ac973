use gemmtune_gemm::components::GemmError;

use crate::config::ConfigError;

/// Errors raised while benchmarking a configuration.
#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Benchmark failed\nCaused by:\n  {0}")]
    Gemm(#[from] GemmError),
}
