use std::sync::Arc;

use gemmtune_common::benchmark::Benchmark;

use super::{AutotuneError, TuneFn};
use crate::client::ComputeClient;

/// A benchmark running one tunable on inputs produced by the tunable set's input generator.
#[derive(new)]
pub struct TuneBenchmark<In: Clone + Send + 'static, Out: 'static> {
    operation: Arc<dyn TuneFn<Inputs = In, Output = Out>>,
    inputs: Arc<dyn Fn() -> In>,
    client: ComputeClient,
}

impl<In: Clone + Send + 'static, Out: 'static> Benchmark for TuneBenchmark<In, Out> {
    type Input = In;
    type Output = Out;
    type Error = AutotuneError;

    fn prepare(&self) -> Self::Input {
        (self.inputs)()
    }

    fn execute(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        self.operation.execute(input)
    }

    fn name(&self) -> String {
        self.operation.name().to_string()
    }

    fn sync(&self) -> Result<(), Self::Error> {
        self.client
            .sync()
            .map_err(|err| AutotuneError::Unknown(format!("{err}")))
    }
}
