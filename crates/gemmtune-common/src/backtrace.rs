use std::backtrace::{Backtrace, BacktraceStatus};

/// Contains the backtrace information if available.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct BackTrace {
    inner: String,
}

impl BackTrace {
    /// Creates a new backtrace from the current thread.
    ///
    /// Capture honours `RUST_BACKTRACE`, so this is cheap when backtraces are disabled.
    pub fn capture() -> Self {
        let backtrace = Backtrace::capture();
        let inner = match backtrace.status() {
            BacktraceStatus::Captured => format!("{backtrace}"),
            _ => "No backtrace available (set RUST_BACKTRACE=1)".to_string(),
        };

        Self { inner }
    }
}

impl core::fmt::Debug for BackTrace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.inner)
    }
}

impl core::fmt::Display for BackTrace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.inner)
    }
}
