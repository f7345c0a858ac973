use super::GlobalConfig;
use super::{
    autotune::AutotuneLogLevel, execution::ExecutionLogLevel, library::LibraryLogLevel,
};
use core::fmt::Display;
use hashbrown::HashMap;
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::PathBuf,
    sync::Arc,
};

/// Configuration for logging in gemmtune, parameterized by a log level type.
///
/// Note that you can use multiple loggers at the same time.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(bound = "")]
pub struct LoggerConfig<L: LogLevel> {
    /// Path to the log file, if file logging is enabled.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Whether to append to the log file (true) or overwrite it (false). Defaults to true.
    ///
    /// ## Notes
    ///
    /// This parameter might get ignored based on other loggers config.
    #[serde(default = "append_default")]
    pub append: bool,

    /// Whether to log to standard output.
    #[serde(default)]
    pub stdout: bool,

    /// Whether to log to standard error.
    #[serde(default)]
    pub stderr: bool,

    /// Optional crate-level logging configuration (e.g., info, debug, trace).
    #[serde(default)]
    pub log: Option<LogCrateLevel>,

    /// The log level for this logger, determining verbosity.
    #[serde(default)]
    pub level: L,
}

impl<L: LogLevel> Default for LoggerConfig<L> {
    fn default() -> Self {
        Self {
            file: None,
            append: true,
            #[cfg(feature = "autotune-checks")]
            stdout: true,
            #[cfg(not(feature = "autotune-checks"))]
            stdout: false,
            stderr: false,
            log: Some(LogCrateLevel::Info),
            level: L::default(),
        }
    }
}

/// Log levels using the `log` crate.
#[derive(
    Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize, Hash, PartialEq, Eq,
)]
pub enum LogCrateLevel {
    /// Logs informational messages.
    #[default]
    #[serde(rename = "info")]
    Info,

    /// Logs debugging messages.
    #[serde(rename = "debug")]
    Debug,

    /// Logs trace-level messages.
    #[serde(rename = "trace")]
    Trace,
}

fn append_default() -> bool {
    true
}

/// Trait for types that can be used as log levels in `LoggerConfig`.
pub trait LogLevel:
    serde::de::DeserializeOwned + serde::Serialize + Clone + Copy + core::fmt::Debug + Default
{
}

/// Central logging utility for gemmtune, managing multiple log outputs.
#[derive(Debug)]
pub struct Logger {
    /// Collection of logger instances (file, stdout, stderr, or crate-level).
    loggers: Vec<LoggerKind>,

    /// Indices of loggers used for autotuning logging.
    autotune_index: Vec<usize>,

    /// Indices of loggers used for execution logging.
    execution_index: Vec<usize>,

    /// Indices of loggers used for library logging.
    library_index: Vec<usize>,

    /// Global configuration for logging settings.
    pub config: Arc<GlobalConfig>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Hash, PartialEq, Eq)]
enum LoggerId {
    File(PathBuf),
    Stdout,
    Stderr,
    LogCrate(LogCrateLevel),
}

/// Deduplicates outputs shared by several concerns so a file is opened only once.
#[derive(Default)]
struct LoggerRegistry {
    loggers: Vec<LoggerKind>,
    ids: HashMap<LoggerId, usize>,
}

impl LoggerRegistry {
    fn register<L: LogLevel>(&mut self, config: &LoggerConfig<L>) -> Vec<usize> {
        let mut indices = Vec::new();

        if let Some(file) = &config.file {
            let append = config.append;
            indices.push(self.index_of(LoggerId::File(file.clone()), || {
                FileLogger::new(file, append)
                    .map(LoggerKind::File)
                    .unwrap_or_else(|err| {
                        log::warn!(
                            "Unable to open log file {}, logging to stderr instead ({err}).",
                            file.display()
                        );
                        LoggerKind::Stderr
                    })
            }));
        }

        if config.stdout {
            indices.push(self.index_of(LoggerId::Stdout, || LoggerKind::Stdout));
        }

        if config.stderr {
            indices.push(self.index_of(LoggerId::Stderr, || LoggerKind::Stderr));
        }

        if let Some(level) = config.log {
            indices.push(self.index_of(LoggerId::LogCrate(level), || LoggerKind::Log(level)));
        }

        indices.dedup();
        indices
    }

    fn index_of(&mut self, id: LoggerId, create: impl FnOnce() -> LoggerKind) -> usize {
        if let Some(index) = self.ids.get(&id) {
            return *index;
        }

        let index = self.loggers.len();
        self.loggers.push(create());
        self.ids.insert(id, index);
        index
    }
}

impl Logger {
    /// Creates a new `Logger` instance based on the global configuration.
    ///
    /// Note that creating a logger is quite expensive.
    pub fn new() -> Self {
        Self::from_config(GlobalConfig::get())
    }

    /// Creates a logger from an explicit configuration.
    pub fn from_config(config: Arc<GlobalConfig>) -> Self {
        let mut registry = LoggerRegistry::default();

        let autotune_index = match config.autotune.logger.level {
            AutotuneLogLevel::Disabled => Vec::new(),
            _ => registry.register(&config.autotune.logger),
        };
        let execution_index = match config.execution.logger.level {
            ExecutionLogLevel::Disabled => Vec::new(),
            _ => registry.register(&config.execution.logger),
        };
        let library_index = match config.library.logger.level {
            LibraryLogLevel::Disabled => Vec::new(),
            _ => registry.register(&config.library.logger),
        };

        Self {
            loggers: registry.loggers,
            autotune_index,
            execution_index,
            library_index,
            config,
        }
    }

    /// Logs a message for autotuning, directing it to all configured autotuning loggers.
    pub fn log_autotune<S: Display>(&mut self, msg: &S) {
        Self::log_all(&mut self.loggers, &self.autotune_index, msg)
    }

    /// Logs a message for execution, directing it to all configured execution loggers.
    pub fn log_execution<S: Display>(&mut self, msg: &S) {
        Self::log_all(&mut self.loggers, &self.execution_index, msg)
    }

    /// Logs a message for solution libraries, directing it to all configured library loggers.
    pub fn log_library<S: Display>(&mut self, msg: &S) {
        Self::log_all(&mut self.loggers, &self.library_index, msg)
    }

    /// Returns the current autotune log level from the global configuration.
    pub fn log_level_autotune(&self) -> AutotuneLogLevel {
        self.config.autotune.logger.level
    }

    /// Returns the current execution log level from the global configuration.
    pub fn log_level_execution(&self) -> ExecutionLogLevel {
        self.config.execution.logger.level
    }

    /// Returns the current library log level from the global configuration.
    pub fn log_level_library(&self) -> LibraryLogLevel {
        self.config.library.logger.level
    }

    fn log_all<S: Display>(loggers: &mut [LoggerKind], indices: &[usize], msg: &S) {
        match indices {
            [] => {}
            [index] => loggers[*index].log(msg),
            indices => {
                let msg = msg.to_string();
                for index in indices {
                    loggers[*index].log(&msg);
                }
            }
        }
    }
}

/// Represents different types of loggers.
#[derive(Debug)]
enum LoggerKind {
    /// Logs to a file.
    File(FileLogger),

    /// Logs to standard output.
    Stdout,

    /// Logs to standard error.
    Stderr,

    /// Logs using the `log` crate with a specified level.
    Log(LogCrateLevel),
}

impl LoggerKind {
    fn log<S: Display>(&mut self, msg: &S) {
        match self {
            LoggerKind::File(file_logger) => file_logger.log(msg),
            LoggerKind::Stdout => println!("{msg}"),
            LoggerKind::Stderr => eprintln!("{msg}"),
            LoggerKind::Log(level) => match level {
                LogCrateLevel::Info => log::info!("{msg}"),
                LogCrateLevel::Debug => log::debug!("{msg}"),
                LogCrateLevel::Trace => log::trace!("{msg}"),
            },
        }
    }
}

/// Logger that writes messages to a file.
#[derive(Debug)]
struct FileLogger {
    writer: BufWriter<File>,
}

impl FileLogger {
    fn new(path: &PathBuf, append: bool) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .append(append)
            .truncate(!append)
            .create(true)
            .open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    // Flushes after every message so logs survive an abort.
    fn log<S: Display>(&mut self, msg: &S) {
        let result = writeln!(self.writer, "{msg}").and_then(|_| self.writer.flush());
        if let Err(err) = result {
            log::warn!("Unable to write to the log file ({err}).");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_file_is_opened_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gemmtune.log");
        let mut config = GlobalConfig::default();
        config.autotune.logger.file = Some(file.clone());
        config.autotune.logger.log = None;
        config.library.logger.file = Some(file.clone());
        config.library.logger.log = None;

        let mut logger = Logger::from_config(Arc::new(config));
        logger.log_autotune(&"fastest kernel found");
        logger.log_library(&"library written");

        assert_eq!(logger.loggers.len(), 1);
        let content = std::fs::read_to_string(file).unwrap();
        assert_eq!(content, "fastest kernel found\nlibrary written\n");
    }

    #[test]
    fn disabled_concern_has_no_output() {
        let mut config = GlobalConfig::default();
        config.execution.logger.level = ExecutionLogLevel::Disabled;

        let logger = Logger::from_config(Arc::new(config));

        assert!(logger.execution_index.is_empty());
        assert!(!logger.autotune_index.is_empty());
    }
}
