use super::logger::{LogLevel, LoggerConfig};

/// Configuration for kernel selection and execution.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ExecutionConfig {
    /// Logger configuration for kernel selection and launches.
    #[serde(default)]
    pub logger: LoggerConfig<ExecutionLogLevel>,

    /// Properties reported by the host device.
    #[serde(default)]
    pub device: HostDeviceConfig,
}

/// Properties of the host device, which emulates the GPU the kernels are selected for.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct HostDeviceConfig {
    /// Architecture name used to filter kernels, e.g. `gfx942`.
    #[serde(default = "default_arch")]
    pub arch: String,

    /// Number of compute units, used for wave quantization.
    #[serde(default = "default_compute_units")]
    pub compute_units: u32,

    /// Maximum number of bytes that can be allocated at once on the device.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: u64,
}

impl Default for HostDeviceConfig {
    fn default() -> Self {
        Self {
            arch: default_arch(),
            compute_units: default_compute_units(),
            memory_capacity: default_memory_capacity(),
        }
    }
}

fn default_arch() -> String {
    "gfx942".to_string()
}

fn default_compute_units() -> u32 {
    304
}

fn default_memory_capacity() -> u64 {
    8 * 1024 * 1024 * 1024
}

/// Verbosity of execution logging.
#[derive(Default, Clone, Copy, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum ExecutionLogLevel {
    /// No execution logs.
    #[default]
    #[serde(rename = "disabled")]
    Disabled,
    /// The kernel selected for every problem.
    #[serde(rename = "basic")]
    Basic,
    /// Every launch, including rejected candidates.
    #[serde(rename = "full")]
    Full,
}

impl LogLevel for ExecutionLogLevel {}
