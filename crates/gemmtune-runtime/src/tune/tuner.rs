use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use gemmtune_common::benchmark::{Benchmark, BenchmarkComputations, BenchmarkDurations};

use crate::client::ComputeClient;
use crate::config::autotune::AutotuneLogLevel;
use crate::config::Logger;
use crate::tune::{TuneBenchmark, TuneCache, TuneCacheResult, TuneFn, TunableSet};

use super::AutotuneKey;

/// Error from running autotune.
#[derive(thiserror::Error, Clone, PartialEq, Eq)]
pub enum AutotuneError {
    /// An unknown error happened.
    #[error("Unknown error: {0}")]
    Unknown(String),

    /// The tunable doesn't apply to the given inputs and was skipped.
    #[error("Skipped: {0}")]
    Skip(String),

    /// Every planned tunable failed for the key.
    #[error("No valid tunable for key {key}: {}", format_failures(.failures))]
    NoValidTunable {
        /// The autotune key.
        key: String,
        /// The name of every tunable that was tried, with the reason it failed.
        failures: Vec<(String, String)>,
    },
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(name, reason)| format!("[{name}: {reason}]"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl core::fmt::Debug for AutotuneError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

impl From<String> for AutotuneError {
    fn from(value: String) -> Self {
        Self::Unknown(value)
    }
}

/// Benchmark result of a single tunable.
#[derive(Debug)]
pub struct AutotuneResult {
    /// Index of the tunable in its set.
    pub index: usize,
    /// Name of the tunable.
    pub name: String,
    /// Statistics of the run, or why it failed.
    pub outcome: Result<BenchmarkComputations, AutotuneError>,
}

/// The result of autotuning a key, to be registered in a [tuner](Tuner).
#[derive(Debug)]
pub struct AutotuneOutcome<K> {
    key: K,
    fastest_index: usize,
    #[cfg(autotune_persistent_cache)]
    checksum: String,
    results: Vec<AutotuneResult>,
}

impl<K> AutotuneOutcome<K> {
    /// The index of the fastest tunable.
    pub fn fastest_index(&self) -> usize {
        self.fastest_index
    }

    /// Every benchmarked tunable, in execution order.
    pub fn results(&self) -> &[AutotuneResult] {
        &self.results
    }
}

/// Executes autotune benchmarking and caching
#[derive(Debug)]
pub struct Tuner<K: AutotuneKey> {
    tune_cache: TuneCache<K>,
    logger: Logger,
}

impl<K: AutotuneKey> Tuner<K> {
    /// Returns a tuner with cache initialized from persistent cache
    pub fn new(name: &str, device_id: &str) -> Self {
        Self {
            tune_cache: TuneCache::new(name, device_id),
            logger: Logger::new(),
        }
    }

    /// Fetch the fastest autotune operation index for an autotune key.
    pub fn fastest(&self, key: &K) -> TuneCacheResult {
        self.tune_cache.fastest(key)
    }

    /// Fetch the fastest autotune operation index, validating a persisted entry against the
    /// checksum of the current tunable set.
    #[cfg(autotune_persistent_cache)]
    pub fn validate_checksum(&mut self, key: &K, checksum: &str) -> TuneCacheResult {
        self.tune_cache.validate_checksum(key, checksum)
    }

    /// Store the result of autotuning, persisting it when a persistent cache is available.
    pub fn register_autotune(&mut self, outcome: AutotuneOutcome<K>) {
        let AutotuneOutcome {
            key,
            fastest_index,
            #[cfg(autotune_persistent_cache)]
            checksum,
            results,
        } = outcome;

        match self.logger.log_level_autotune() {
            AutotuneLogLevel::Disabled => {}
            AutotuneLogLevel::Minimal => {
                if let Some(fastest) = results.iter().find(|r| r.index == fastest_index) {
                    let msg = format!("Fastest result {}-{key}", fastest.name);
                    self.logger.log_autotune(&msg);
                }
            }
            AutotuneLogLevel::Full => {
                for result in results.iter() {
                    let msg = match &result.outcome {
                        Ok(computed) => format!(
                            "{}-{key} => median {:.3?} (min {:.3?}, max {:.3?})",
                            result.name, computed.median, computed.min, computed.max
                        ),
                        Err(err) => format!("{}-{key} => {err}", result.name),
                    };
                    self.logger.log_autotune(&msg);
                }
                let msg = format!("Fastest result index {fastest_index} for {key}");
                self.logger.log_autotune(&msg);
            }
        }

        self.tune_cache.cache_insert(key.clone(), fastest_index);

        #[cfg(autotune_persistent_cache)]
        {
            self.tune_cache
                .persistent_cache_insert(key, checksum, fastest_index);
            if let Err(err) = self.tune_cache.save() {
                log::warn!(
                    "Unable to save autotune cache {}: {err}",
                    self.tune_cache.file_path().display()
                );
            }
        }
    }

    /// Benchmark the tunables of `set` for `key`, batch after batch of its plan, until a batch
    /// holds at least one tunable that ran successfully. The fastest median wins.
    ///
    /// Doesn't touch the cache, so it can run without holding any lock on the tuner.
    pub fn benchmark<In: Clone + Send + 'static, Out: 'static>(
        set: &TunableSet<K, In, Out>,
        key: &K,
        inputs: &In,
        client: &ComputeClient,
    ) -> Result<AutotuneOutcome<K>, AutotuneError> {
        let autotunables = set.autotunables();
        let generate = set.inputs_generator(key, inputs);
        let mut plan = set.plan(key);
        let mut results = Vec::with_capacity(autotunables.len());

        loop {
            let batch = plan.next();
            if batch.is_empty() {
                break;
            }

            let mut batch_succeeded = false;
            for index in batch {
                let Some(operation) = autotunables.get(index) else {
                    continue;
                };
                let name = operation.name().to_string();
                let outcome = run_benchmark(operation.clone(), generate.clone(), client)
                    .map(|durations| BenchmarkComputations::new(&durations));

                if let Err(err) = &outcome {
                    log::debug!("Tunable {name} failed for {key}: {err}");
                }
                batch_succeeded |= outcome.is_ok();
                results.push(AutotuneResult {
                    index,
                    name,
                    outcome,
                });
            }

            if batch_succeeded {
                break;
            }
        }

        let fastest = results
            .iter()
            .filter_map(|result| match &result.outcome {
                Ok(computed) => Some((result.index, computed.median)),
                Err(_) => None,
            })
            .min_by_key(|(_, median)| *median);

        let Some((fastest_index, _)) = fastest else {
            return Err(AutotuneError::NoValidTunable {
                key: key.to_string(),
                failures: results
                    .into_iter()
                    .filter_map(|result| result.outcome.err().map(|err| (result.name, err.to_string())))
                    .collect(),
            });
        };

        Ok(AutotuneOutcome {
            key: key.clone(),
            fastest_index,
            #[cfg(autotune_persistent_cache)]
            checksum: set.compute_checksum(),
            results,
        })
    }
}

fn run_benchmark<In: Clone + Send + 'static, Out: 'static>(
    operation: Arc<dyn TuneFn<Inputs = In, Output = Out>>,
    inputs: Arc<dyn Fn() -> In>,
    client: &ComputeClient,
) -> Result<BenchmarkDurations, AutotuneError> {
    let benchmark = TuneBenchmark::new(operation, inputs, client.clone());

    match catch_unwind(AssertUnwindSafe(|| benchmark.run())) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|msg| msg.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "tunable panicked".to_string());
            Err(AutotuneError::Unknown(reason))
        }
    }
}
