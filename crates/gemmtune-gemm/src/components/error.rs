use std::fmt::{Debug, Display};

use gemmtune_runtime::server::{IoError, LaunchError, ServerError};
use gemmtune_runtime::tune::AutotuneError;

use crate::catalog::Rejection;

/// Errors that can occur during the setup phase of a GEMM.
pub enum GemmSetupError {
    /// A required kernel or device feature is not available.
    Unavailable(GemmAvailabilityError),

    /// The provided problem or configuration is invalid.
    InvalidConfig(InvalidConfigError),

    /// No kernel of the catalog can solve the problem.
    NoSolution { reasons: Vec<(String, Rejection)> },
}

/// A specific feature required by the GEMM is not available.
pub enum GemmAvailabilityError {
    /// The kernel doesn't support the problem.
    KernelRejected { kernel: String, reason: Rejection },

    /// No kernel of the catalog has the given name.
    KernelUnknown { name: String },

    /// The workspace bound to the GEMM is smaller than what the kernel needs.
    WorkspaceTooSmall { required: u64, provided: u64 },

    /// A required buffer wasn't provided.
    MissingBuffer { name: &'static str },

    /// A buffer is too small for the problem.
    BufferTooSmall {
        name: &'static str,
        required: u64,
        provided: u64,
    },

    /// The heuristic returned fewer kernels than the requested rank.
    NoCandidate { rank: usize },

    /// The solution library has no entry for the exact problem.
    NoLibraryEntry,
}

impl From<GemmAvailabilityError> for GemmSetupError {
    fn from(value: GemmAvailabilityError) -> Self {
        Self::Unavailable(value)
    }
}

impl From<InvalidConfigError> for GemmSetupError {
    fn from(value: InvalidConfigError) -> Self {
        Self::InvalidConfig(value)
    }
}

impl Display for GemmSetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Debug for GemmSetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GemmSetupError::Unavailable(err) => {
                writeln!(
                    f,
                    "Unable to launch gemm because a required feature is unavailable: {err:?}"
                )
            }
            GemmSetupError::InvalidConfig(err) => {
                writeln!(
                    f,
                    "Unable to launch gemm because the config is invalid: {:?}",
                    err.to_string()
                )
            }
            GemmSetupError::NoSolution { reasons } => {
                writeln!(f, "Unable to launch gemm because no kernel supports the problem")?;
                for (kernel, reason) in reasons {
                    writeln!(f, "  {kernel}: {reason}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for GemmSetupError {}

impl Debug for GemmAvailabilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GemmAvailabilityError::KernelRejected { kernel, reason } => {
                writeln!(f, "Kernel {kernel} rejected: {reason}")
            }
            GemmAvailabilityError::KernelUnknown { name } => {
                writeln!(f, "Kernel {name} is not in the catalog.")
            }
            GemmAvailabilityError::WorkspaceTooSmall { required, provided } => {
                writeln!(
                    f,
                    "Workspace of {provided} bytes is too small, {required} bytes are required."
                )
            }
            GemmAvailabilityError::MissingBuffer { name } => {
                writeln!(f, "Buffer {name} is required but wasn't provided.")
            }
            GemmAvailabilityError::BufferTooSmall {
                name,
                required,
                provided,
            } => writeln!(
                f,
                "Buffer {name} holds {provided} bytes, {required} bytes are required."
            ),
            GemmAvailabilityError::NoCandidate { rank } => {
                writeln!(f, "No kernel at heuristic rank {rank}.")
            }
            GemmAvailabilityError::NoLibraryEntry => {
                writeln!(f, "No library entry for the exact problem.")
            }
        }
    }
}

/// Error that araises from invalid configurations
pub type InvalidConfigError = Box<dyn Display + Send + Sync>;

/// Error that araises from invalid configurations
pub struct FormattedConfigError {
    func: Box<dyn Fn() -> String + Send + Sync>,
}

impl FormattedConfigError {
    #[allow(clippy::new_ret_no_self)]
    pub fn new<F: Fn() -> String + Send + Sync + 'static>(func: F) -> InvalidConfigError {
        Box::new(Self {
            func: Box::new(func),
        })
    }
}

impl Display for FormattedConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let string = (self.func)();
        write!(f, "{string}")
    }
}

/// Errors raised by the GEMM entry points.
#[derive(thiserror::Error, Debug)]
pub enum GemmError {
    #[error("{0}")]
    Setup(#[from] GemmSetupError),

    #[error("{0}")]
    Launch(#[from] LaunchError),

    #[error("{0}")]
    Io(#[from] IoError),

    #[error("{0}")]
    Server(#[from] ServerError),

    #[error("Autotune failed\nCaused by:\n  {0}")]
    Autotune(#[from] AutotuneError),

    /// `run` was called before a successful `initialize`, or after the problem changed.
    #[error("The gemm must be initialized with an algorithm before running")]
    NotInitialized,

    /// A call that requires a problem was made before `set_problem`.
    #[error("The problem must be set before calling {0}")]
    ProblemNotSet(&'static str),
}

impl From<GemmAvailabilityError> for GemmError {
    fn from(value: GemmAvailabilityError) -> Self {
        Self::Setup(value.into())
    }
}

impl From<InvalidConfigError> for GemmError {
    fn from(value: InvalidConfigError) -> Self {
        Self::Setup(value.into())
    }
}

impl From<GemmError> for AutotuneError {
    fn from(value: GemmError) -> Self {
        match value {
            GemmError::Setup(err @ GemmSetupError::Unavailable(_)) => {
                AutotuneError::Skip(err.to_string())
            }
            GemmError::Autotune(err) => err,
            err => AutotuneError::Unknown(err.to_string()),
        }
    }
}
