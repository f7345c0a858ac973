use core::fmt::Display;

use gemmtune_common::benchmark::{BenchmarkComputations, BenchmarkDurations};
use gemmtune_gemm::catalog::Rejection;
use gemmtune_gemm::components::{Activation, DataType};
use gemmtune_gemm::heuristic::ExactSize;

/// Outcome of every benchmark of a configuration.
#[derive(Clone, Debug, Default)]
pub struct BenchmarkReport {
    pub problems: Vec<ProblemReport>,
}

/// Outcome of the kernels benchmarked on one concrete problem.
#[derive(Clone, Debug)]
pub struct ProblemReport {
    /// Position of the problem in `BenchmarkProblems`.
    pub problem: usize,
    pub group: usize,
    /// `[m, n, batch, k]`
    pub size: ExactSize,
    pub bias: Option<DataType>,
    pub activation: Activation,
    /// Empty when no kernel could solve the problem.
    pub kernels: Vec<KernelReport>,
    /// Why the kernels of the catalog were skipped, when requested.
    pub rejections: Vec<(String, Rejection)>,
}

#[derive(new, Clone, Debug)]
pub struct KernelReport {
    pub kernel: String,
    pub outcome: KernelOutcome,
}

#[derive(Clone, Debug)]
pub enum KernelOutcome {
    Measured(Measurement),
    Rejected(Rejection),
}

/// Timing of one kernel and the validation of its output.
#[derive(Clone, Debug)]
pub struct Measurement {
    /// Duration of one GEMM for every benchmark.
    pub durations: BenchmarkDurations,
    pub computed: BenchmarkComputations,
    /// Throughput at the median duration.
    pub gflops: f64,
    pub validation: Validation,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Validation {
    Skipped,
    Passed { elements: usize },
    Failed { index: usize, actual: f64, expected: f64 },
}

impl BenchmarkReport {
    /// Whether no validated output differed from the reference.
    pub fn passed(&self) -> bool {
        self.problems
            .iter()
            .flat_map(|problem| problem.kernels.iter())
            .all(|kernel| {
                !matches!(
                    kernel.outcome,
                    KernelOutcome::Measured(Measurement {
                        validation: Validation::Failed { .. },
                        ..
                    })
                )
            })
    }
}

impl ProblemReport {
    /// The measured kernel with the highest throughput.
    pub fn fastest(&self) -> Option<(&str, &Measurement)> {
        self.kernels
            .iter()
            .filter_map(|kernel| match &kernel.outcome {
                KernelOutcome::Measured(measurement) => Some((kernel.kernel.as_str(), measurement)),
                KernelOutcome::Rejected(_) => None,
            })
            .max_by(|a, b| a.1.gflops.total_cmp(&b.1.gflops))
    }
}

impl Display for BenchmarkReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for problem in &self.problems {
            write!(f, "{problem}")?;
        }
        Ok(())
    }
}

impl Display for ProblemReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let [m, n, batch, k] = self.size;
        write!(f, "Problem {} group {}: {m}x{n}x{batch}x{k}", self.problem, self.group)?;
        if let Some(bias) = self.bias {
            write!(f, " bias {bias}")?;
        }
        if self.activation != Activation::None {
            write!(f, " act {:?}", self.activation)?;
        }
        writeln!(f)?;

        if self.kernels.is_empty() {
            writeln!(f, "  No valid solution found!")?;
        }
        for kernel in &self.kernels {
            match &kernel.outcome {
                KernelOutcome::Measured(measurement) => writeln!(
                    f,
                    "  {} | median {:.3?} | {:.2} GFLOPS | {}",
                    kernel.kernel, measurement.computed.median, measurement.gflops, measurement.validation
                )?,
                KernelOutcome::Rejected(reason) => {
                    writeln!(f, "  {} | rejected: {reason}", kernel.kernel)?
                }
            }
        }
        for (kernel, reason) in &self.rejections {
            writeln!(f, "  skipped {kernel}: {reason}")?;
        }

        Ok(())
    }
}

impl Display for Validation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Validation::Skipped => f.write_str("not validated"),
            Validation::Passed { elements } => write!(f, "PASSED ({elements} elements)"),
            Validation::Failed {
                index,
                actual,
                expected,
            } => write!(f, "FAILED at {index}: {actual} != {expected}"),
        }
    }
}
