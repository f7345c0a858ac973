use std::path::PathBuf;

use super::logger::{LogLevel, LoggerConfig};

/// Configuration for autotuning.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AutotuneConfig {
    /// Logger configuration for autotune results.
    #[serde(default)]
    pub logger: LoggerConfig<AutotuneLogLevel>,

    /// How many candidates are benchmarked when autotuning.
    #[serde(default)]
    pub level: AutotuneLevel,

    /// Where the persistent autotune cache is stored.
    #[serde(default)]
    pub cache: AutotuneCache,
}

/// Location of the persistent autotune cache.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum AutotuneCache {
    /// Relative to the current working directory.
    #[serde(rename = "local")]
    Local,
    /// In the `target` directory of the enclosing cargo project.
    #[default]
    #[serde(rename = "target")]
    Target,
    /// In the user's local configuration directory.
    #[serde(rename = "global")]
    Global,
    /// At the given path.
    #[serde(rename = "file")]
    File(PathBuf),
}

/// Verbosity of autotune logging.
#[derive(Default, Clone, Copy, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum AutotuneLogLevel {
    /// No autotune logs.
    #[serde(rename = "disabled")]
    Disabled,
    /// Only the fastest candidate for every new key.
    #[default]
    #[serde(rename = "minimal")]
    Minimal,
    /// Every benchmark result.
    #[serde(rename = "full")]
    Full,
}

impl LogLevel for AutotuneLogLevel {}

/// How many candidates the autotuner benchmarks for a single key.
#[derive(Default, Clone, Copy, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum AutotuneLevel {
    /// Only the two best heuristic candidates.
    #[serde(rename = "minimal")]
    Minimal,
    /// The four best heuristic candidates.
    #[default]
    #[serde(rename = "balanced")]
    Balanced,
    /// The eight best heuristic candidates.
    #[serde(rename = "extensive")]
    Extensive,
    /// Every compatible candidate.
    #[serde(rename = "full")]
    Full,
}

impl AutotuneLevel {
    /// The maximum number of candidates benchmarked at this level, `None` meaning all of them.
    pub fn max_candidates(&self) -> Option<usize> {
        match self {
            AutotuneLevel::Minimal => Some(2),
            AutotuneLevel::Balanced => Some(4),
            AutotuneLevel::Extensive => Some(8),
            AutotuneLevel::Full => None,
        }
    }
}

impl AutotuneCache {
    /// The directory under which cache files are written.
    pub fn root(&self) -> PathBuf {
        let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        match self {
            AutotuneCache::Local => current_dir,
            AutotuneCache::Target => {
                let mut dir = current_dir.clone();

                loop {
                    if let Ok(true) = std::fs::exists(dir.join("Cargo.toml")) {
                        return dir.join("target");
                    }

                    if !dir.pop() {
                        break;
                    }
                }

                current_dir.join("target")
            }
            AutotuneCache::Global => dirs::config_local_dir().unwrap_or(current_dir),
            AutotuneCache::File(path_buf) => path_buf.clone(),
        }
    }
}
