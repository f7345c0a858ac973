use core::fmt::Display;
use core::time::Duration;
use std::time::Instant;

/// How a benchmark duration was measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TimingMethod {
    /// Wall time measured on the host around a synchronized execution.
    System,
    /// Time reported by the device for the work enqueued on a stream.
    Device,
}

impl Display for TimingMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TimingMethod::System => f.write_str("system"),
            TimingMethod::Device => f.write_str("device"),
        }
    }
}

/// Results of a benchmark run.
#[derive(new, Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BenchmarkDurations {
    /// How these durations were measured.
    pub timing_method: TimingMethod,
    /// All durations of the run, in the order they were benchmarked.
    pub durations: Vec<Duration>,
}

impl BenchmarkDurations {
    /// Returns a tuple of durations: (min, max, median).
    fn min_max_median_durations(&self) -> (Duration, Duration, Duration) {
        let mut sorted = self.durations.clone();
        sorted.sort();
        let min = *sorted.first().unwrap_or(&Duration::ZERO);
        let max = *sorted.last().unwrap_or(&Duration::ZERO);
        let median = sorted.get(sorted.len() / 2).copied().unwrap_or(Duration::ZERO);
        (min, max, median)
    }

    /// Returns the mean duration.
    pub(crate) fn mean_duration(&self) -> Duration {
        if self.durations.is_empty() {
            return Duration::ZERO;
        }
        self.durations.iter().sum::<Duration>() / self.durations.len() as u32
    }

    /// Returns the variance durations.
    pub(crate) fn variance_duration(&self, mean: Duration) -> Duration {
        if self.durations.is_empty() {
            return Duration::ZERO;
        }
        self.durations
            .iter()
            .map(|duration| {
                let tmp = duration.as_secs_f64() - mean.as_secs_f64();
                Duration::from_secs_f64(tmp * tmp)
            })
            .sum::<Duration>()
            / self.durations.len() as u32
    }
}

impl Display for BenchmarkDurations {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let computed = BenchmarkComputations::new(self);
        let BenchmarkComputations {
            mean,
            median,
            variance,
            min,
            max,
        } = computed;
        let num_sample = self.durations.len();
        let timing_method = self.timing_method;

        f.write_str(
            format!(
                "
―――――――― Result ―――――――――
  Timing      {timing_method}
  Samples     {num_sample}
  Mean        {mean:.3?}
  Variance    {variance:.3?}
  Median      {median:.3?}
  Min         {min:.3?}
  Max         {max:.3?}
―――――――――――――――――――――――――"
            )
            .as_str(),
        )
    }
}

/// Computed values from benchmark durations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkComputations {
    /// Mean of all the durations.
    pub mean: Duration,
    /// Median of all the durations.
    pub median: Duration,
    /// Variance of all the durations.
    pub variance: Duration,
    /// Minimum duration amongst all durations.
    pub min: Duration,
    /// Maximum duration amongst all durations.
    pub max: Duration,
}

impl BenchmarkComputations {
    /// Compute duration values and return a BenchmarkComputations struct
    pub fn new(durations: &BenchmarkDurations) -> Self {
        let mean = durations.mean_duration();
        let (min, max, median) = durations.min_max_median_durations();
        Self {
            mean,
            median,
            min,
            max,
            variance: durations.variance_duration(mean),
        }
    }
}

/// Benchmark trait.
pub trait Benchmark {
    /// Benchmark input arguments.
    type Input: Clone;
    /// The benchmark output.
    type Output;
    /// The error raised by a failed execution.
    type Error: Display;

    /// Prepare the benchmark, run anything that is essential for the benchmark, but shouldn't
    /// count as included in the duration.
    fn prepare(&self) -> Self::Input;

    /// Execute the benchmark and returns the logical output of the task executed.
    fn execute(&self, input: Self::Input) -> Result<Self::Output, Self::Error>;

    /// Number of samples per run required to have a statistical significance.
    fn num_samples(&self) -> usize {
        10
    }

    /// Number of untimed executions before sampling starts.
    fn num_warmups(&self) -> usize {
        1
    }

    /// Name of the benchmark, should be unique.
    fn name(&self) -> String;

    /// Wait for computation to complete.
    fn sync(&self) -> Result<(), Self::Error>;

    /// Run the benchmark a number of times.
    fn run(&self) -> Result<BenchmarkDurations, Self::Error> {
        let input = self.prepare();

        for _ in 0..self.num_warmups() {
            self.execute(input.clone())?;
        }
        self.sync()?;

        let mut durations = Vec::with_capacity(self.num_samples());

        for _ in 0..self.num_samples() {
            let start = Instant::now();
            self.execute(input.clone())?;
            self.sync()?;
            durations.push(start.elapsed());
        }

        Ok(BenchmarkDurations::new(TimingMethod::System, durations))
    }
}

/// Result of a benchmark run, with metadata
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    /// Individual raw results of the run
    pub raw: BenchmarkDurations,
    /// Computed values for the run
    pub computed: BenchmarkComputations,
    /// Benchmark name
    pub name: String,
}

impl Display for BenchmarkResult {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "
        Benchmark: {}
        Median:    {:.3?}",
            self.name, self.computed.median
        )
    }
}

/// Runs the given benchmark and collects its computed statistics.
pub fn run_benchmark<BM: Benchmark>(benchmark: BM) -> Result<BenchmarkResult, BM::Error> {
    let raw = benchmark.run()?;
    let computed = BenchmarkComputations::new(&raw);

    Ok(BenchmarkResult {
        raw,
        computed,
        name: benchmark.name(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn durations(millis: &[u64]) -> BenchmarkDurations {
        BenchmarkDurations::new(
            TimingMethod::System,
            millis.iter().map(|ms| Duration::from_millis(*ms)).collect(),
        )
    }

    #[test]
    fn computations_are_order_independent() {
        let computed = BenchmarkComputations::new(&durations(&[40, 10, 30, 20, 50]));

        assert_eq!(computed.min, Duration::from_millis(10));
        assert_eq!(computed.max, Duration::from_millis(50));
        assert_eq!(computed.median, Duration::from_millis(30));
        assert_eq!(computed.mean, Duration::from_millis(30));
    }

    #[test]
    fn empty_durations_compute_to_zero() {
        let computed = BenchmarkComputations::new(&durations(&[]));

        assert_eq!(computed, BenchmarkComputations::default());
    }

    struct Counting {
        calls: core::cell::Cell<usize>,
    }

    impl Benchmark for Counting {
        type Input = ();
        type Output = ();
        type Error = String;

        fn prepare(&self) -> Self::Input {}

        fn execute(&self, _input: Self::Input) -> Result<(), String> {
            self.calls.set(self.calls.get() + 1);
            Ok(())
        }

        fn num_samples(&self) -> usize {
            4
        }

        fn name(&self) -> String {
            "counting".to_string()
        }

        fn sync(&self) -> Result<(), String> {
            Ok(())
        }
    }

    #[test]
    fn run_executes_warmups_and_samples() {
        let bench = Counting {
            calls: core::cell::Cell::new(0),
        };
        let result = bench.run().unwrap();

        assert_eq!(result.durations.len(), 4);
        assert_eq!(bench.calls.get(), 5);
    }
}
