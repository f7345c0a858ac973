use std::path::PathBuf;

use super::logger::{LogLevel, LoggerConfig};

/// Configuration for solution libraries.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct LibraryConfig {
    /// Logger configuration for library creation and loading.
    #[serde(default)]
    pub logger: LoggerConfig<LibraryLogLevel>,

    /// Solution library consulted by the heuristic for exact problem sizes.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Verbosity of library logging.
#[derive(Default, Clone, Copy, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum LibraryLogLevel {
    /// No library logs.
    #[serde(rename = "disabled")]
    Disabled,
    /// Stage summaries.
    #[default]
    #[serde(rename = "basic")]
    Basic,
    /// Every parsed logic file and written library.
    #[serde(rename = "full")]
    Full,
}

impl LogLevel for LibraryLogLevel {}
