use std::path::PathBuf;

use gemmtune_gemm::catalog::Rejection;

/// Errors raised when loading or validating a benchmark configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid benchmark configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Problem {problem}: unsupported operation {operation:?}, only GEMM is supported")]
    UnsupportedOperation { problem: usize, operation: String },

    #[error("Problem {problem}: missing {field}")]
    MissingField { problem: usize, field: &'static str },

    #[error("Invalid problem size {size}: {reason}")]
    InvalidSize { size: String, reason: String },

    #[error("Kernel {kernel} is not in the catalog")]
    UnknownKernel { kernel: String },

    #[error("Kernel {kernel} can't solve {m}x{n}x{batch}x{k}: {reason}")]
    KernelRejected {
        kernel: String,
        m: usize,
        n: usize,
        batch: usize,
        k: usize,
        reason: Rejection,
    },

    #[error("Unknown DataInitType{operand} {code}")]
    InvalidDataInit { operand: &'static str, code: u32 },
}
