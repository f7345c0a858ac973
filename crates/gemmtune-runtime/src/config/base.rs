use super::{
    autotune::{AutotuneConfig, AutotuneLevel, AutotuneLogLevel},
    execution::{ExecutionConfig, ExecutionLogLevel},
    library::{LibraryConfig, LibraryLogLevel},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Static mutex holding the global configuration, initialized as `None`.
static GEMMTUNE_GLOBAL_CONFIG: spin::Mutex<Option<Arc<GlobalConfig>>> = spin::Mutex::new(None);

/// Names of the configuration files searched for, in order.
const CONFIG_FILE_NAMES: [&str; 2] = ["gemmtune.toml", "GemmTune.toml"];

/// Represents the global configuration for gemmtune, combining autotuning, execution, and
/// solution library settings.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GlobalConfig {
    /// Configuration for autotuning.
    #[serde(default)]
    pub autotune: AutotuneConfig,

    /// Configuration for kernel selection and execution.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Configuration for solution libraries.
    #[serde(default)]
    pub library: LibraryConfig,
}

/// Error raised while reading a configuration file.
#[derive(thiserror::Error, Debug)]
pub enum GlobalConfigError {
    /// The file couldn't be read.
    #[error("Unable to read the config file {path}\nCaused by:\n  {source}")]
    Io {
        /// The file that was read.
        path: PathBuf,
        /// The io error.
        source: std::io::Error,
    },
    /// The file isn't valid toml for the config schema.
    #[error("The config file {path} doesn't have the right format\nCaused by:\n  {source}")]
    Format {
        /// The file that was parsed.
        path: PathBuf,
        /// The parse error.
        source: toml::de::Error,
    },
}

impl GlobalConfig {
    /// Retrieves the current global configuration, loading it from the current directory if not set.
    ///
    /// If no configuration is set, it attempts to load one from `gemmtune.toml` or `GemmTune.toml`
    /// in the current directory or its parents, then applies the environment overrides. If no file
    /// is found, a default configuration is used.
    ///
    /// # Notes
    ///
    /// Calling this function is somewhat expensive, because of a global static lock. Read the
    /// values you need once and keep them around.
    pub fn get() -> Arc<Self> {
        let mut state = GEMMTUNE_GLOBAL_CONFIG.lock();

        match state.as_ref() {
            Some(config) => config.clone(),
            None => {
                let config = Arc::new(Self::from_current_dir().override_from_env());
                *state = Some(config.clone());
                config
            }
        }
    }

    /// Save the current configuration to the provided file path.
    pub fn save_default<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
        let config = Self::get();
        let content = toml::to_string_pretty(config.as_ref()).map_err(std::io::Error::other)?;
        std::fs::write(path, content)
    }

    /// Sets the global configuration to the provided value.
    ///
    /// # Panics
    /// Panics if the configuration has already been set or read, as it cannot be overridden.
    ///
    /// # Warning
    /// This method must be called at the start of the program, before any calls to `get`.
    pub fn set(config: Self) {
        let mut state = GEMMTUNE_GLOBAL_CONFIG.lock();
        if state.is_some() {
            panic!("Cannot set the global configuration multiple times.");
        }
        *state = Some(Arc::new(config));
    }

    /// Overrides configuration fields based on environment variables.
    pub fn override_from_env(self) -> Self {
        self.override_from(|name| std::env::var(name).ok())
    }

    fn override_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = var("GEMMTUNE_DEBUG_LOG") {
            self.autotune.logger.level = AutotuneLogLevel::Full;
            self.execution.logger.level = ExecutionLogLevel::Full;
            self.library.logger.level = LibraryLogLevel::Full;

            match val.as_str() {
                "stdout" => {
                    self.autotune.logger.stdout = true;
                    self.execution.logger.stdout = true;
                    self.library.logger.stdout = true;
                }
                "stderr" => {
                    self.autotune.logger.stderr = true;
                    self.execution.logger.stderr = true;
                    self.library.logger.stderr = true;
                }
                "1" | "true" => {
                    let file_path = std::env::temp_dir().join("gemmtune.log");
                    self.autotune.logger.file = Some(file_path.clone());
                    self.execution.logger.file = Some(file_path.clone());
                    self.library.logger.file = Some(file_path);
                }
                "0" | "false" => {
                    self.autotune.logger.level = AutotuneLogLevel::Disabled;
                    self.execution.logger.level = ExecutionLogLevel::Disabled;
                    self.library.logger.level = LibraryLogLevel::Disabled;
                }
                file_path => {
                    self.autotune.logger.file = Some(file_path.into());
                    self.execution.logger.file = Some(file_path.into());
                    self.library.logger.file = Some(file_path.into());
                }
            }
        };

        if let Some(val) = var("GEMMTUNE_DEBUG_OPTION") {
            match val.as_str() {
                "debug" => {
                    self.autotune.logger.level = AutotuneLogLevel::Minimal;
                    self.execution.logger.level = ExecutionLogLevel::Basic;
                    self.library.logger.level = LibraryLogLevel::Basic;
                }
                "debug-full" => {
                    self.autotune.logger.level = AutotuneLogLevel::Full;
                    self.execution.logger.level = ExecutionLogLevel::Full;
                    self.library.logger.level = LibraryLogLevel::Full;
                }
                "autotune" => {
                    self.autotune.logger.level = AutotuneLogLevel::Full;
                }
                "execution" => {
                    self.execution.logger.level = ExecutionLogLevel::Full;
                }
                _ => {}
            }
        };

        if let Some(val) = var("GEMMTUNE_AUTOTUNE_LEVEL") {
            match val.as_str() {
                "minimal" | "0" => {
                    self.autotune.level = AutotuneLevel::Minimal;
                }
                "balanced" | "1" => {
                    self.autotune.level = AutotuneLevel::Balanced;
                }
                "extensive" | "2" => {
                    self.autotune.level = AutotuneLevel::Extensive;
                }
                "full" | "3" => {
                    self.autotune.level = AutotuneLevel::Full;
                }
                _ => {
                    log::warn!("Unknown GEMMTUNE_AUTOTUNE_LEVEL '{val}', keeping the configured level");
                }
            }
        }

        self
    }

    // Traverses up the directory tree until a configuration file is found or the root is reached.
    fn from_current_dir() -> Self {
        let Ok(mut dir) = std::env::current_dir() else {
            return Self::default();
        };

        loop {
            for name in CONFIG_FILE_NAMES {
                let path = dir.join(name);
                if !path.is_file() {
                    continue;
                }

                match Self::from_file_path(&path) {
                    Ok(config) => return config,
                    Err(err) => panic!("{err}"),
                }
            }

            if !dir.pop() {
                break;
            }
        }

        Self::default()
    }

    /// Loads configuration from a specified file path.
    pub fn from_file_path<P: AsRef<Path>>(path: P) -> Result<Self, GlobalConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| GlobalConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| GlobalConfigError::Format {
            path: path.to_path_buf(),
            source,
        })
    }
}
