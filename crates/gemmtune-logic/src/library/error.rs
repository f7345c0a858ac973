use std::path::PathBuf;

/// Errors raised when creating or loading a solution library.
#[derive(thiserror::Error, Debug)]
pub enum LibraryError {
    #[error("Unable to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Unable to write {path}: {reason}")]
    Serialize { path: PathBuf, reason: String },

    #[error("Unable to walk the logic directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Architecture {0} not supported")]
    UnsupportedArchitecture(String),

    #[error("Logic path {0} doesn't exist")]
    MissingLogicPath(PathBuf),

    #[error("Invalid solution in {source_name}: {reason}")]
    InvalidSolution { source_name: String, reason: String },

    #[error("Missing expected library files: {0:?}")]
    MissingFiles(Vec<PathBuf>),

    #[error("Unable to start the parsing threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
