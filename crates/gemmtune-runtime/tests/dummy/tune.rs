use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use derive_new::new;
use gemmtune_runtime::client::ComputeClient;
use gemmtune_runtime::server::Kernel;
use gemmtune_runtime::tune::{
    AutotuneError, FunctionTunable, Tunable, TunableSet, TuneFn, TuneGroup, clone_inputs,
};

use super::{
    Bindings, ElementwiseAddition, ElementwiseMultiplication, FailingKernel, SlowWrongCopy,
};

type TestSet = TunableSet<String, Bindings, ()>;

/// Tunable launching a single kernel built from the bindings.
#[derive(new, Clone)]
pub struct OneKernelAutotuneOperation {
    name: &'static str,
    kernel: fn(Bindings) -> Box<dyn Kernel>,
    client: ComputeClient,
}

impl TuneFn for OneKernelAutotuneOperation {
    type Inputs = Bindings;
    type Output = ();

    fn execute(&self, inputs: Bindings) -> Result<(), AutotuneError> {
        self.client
            .launch((self.kernel)(inputs))
            .map_err(|err| AutotuneError::Unknown(err.to_string()))
    }

    fn name(&self) -> &str {
        self.name
    }
}

fn add(bindings: Bindings) -> Box<dyn Kernel> {
    Box::new(ElementwiseAddition::new(bindings))
}

fn mul(bindings: Bindings) -> Box<dyn Kernel> {
    Box::new(ElementwiseMultiplication::new(bindings))
}

fn slow_wrong(bindings: Bindings) -> Box<dyn Kernel> {
    Box::new(SlowWrongCopy::new(bindings))
}

fn failing(bindings: Bindings) -> Box<dyn Kernel> {
    Box::new(FailingKernel::new(bindings))
}

fn shape_key(op: &str, shapes: &[Vec<usize>]) -> String {
    let shapes = shapes
        .iter()
        .map(|shape| format!("{shape:?}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{op}-{shapes}")
}

pub fn addition_set(client: ComputeClient, shapes: Vec<Vec<usize>>) -> TestSet {
    TestSet::new(move |_: &Bindings| shape_key("add", &shapes), clone_inputs)
        .with(Tunable::new(OneKernelAutotuneOperation::new(
            "add", add, client.clone(),
        )))
        .with(Tunable::new(OneKernelAutotuneOperation::new(
            "add-slow-wrong",
            slow_wrong,
            client,
        )))
}

pub fn multiplication_set(client: ComputeClient, shapes: Vec<Vec<usize>>) -> TestSet {
    TestSet::new(move |_: &Bindings| shape_key("mul", &shapes), clone_inputs)
        .with(Tunable::new(OneKernelAutotuneOperation::new(
            "mul-slow-wrong",
            slow_wrong,
            client.clone(),
        )))
        .with(Tunable::new(OneKernelAutotuneOperation::new(
            "mul", mul, client,
        )))
}

/// The first tunable fails at sync, the second one skips, only the third one is valid.
pub fn failing_set(client: ComputeClient, name: &'static str) -> TestSet {
    TestSet::new(move |_: &Bindings| format!("{name}-failing"), clone_inputs)
        .with(Tunable::new(OneKernelAutotuneOperation::new(
            "failing",
            failing,
            client.clone(),
        )))
        .with(Tunable::new(FunctionTunable::named(
            "skip",
            |_: Bindings| Err::<(), _>(AutotuneError::Skip("not applicable".to_string())),
        )))
        .with(Tunable::new(OneKernelAutotuneOperation::new(
            "add", add, client,
        )))
}

/// Every tunable fails.
pub fn invalid_set(client: ComputeClient, name: &'static str) -> TestSet {
    TestSet::new(move |_: &Bindings| format!("{name}-invalid"), clone_inputs)
        .with(Tunable::new(OneKernelAutotuneOperation::new(
            "failing",
            failing,
            client,
        )))
        .with(Tunable::new(FunctionTunable::named("skip", |_: Bindings| {
            Err::<(), _>(AutotuneError::Skip("not applicable".to_string()))
        })))
}

/// A high priority group holding a skipping tunable, and a low priority group holding the valid
/// addition. The tunable of the lowest group counts its executions.
pub fn grouped_set(client: ComputeClient, name: &'static str, low: Arc<AtomicUsize>) -> TestSet {
    let high_group = TuneGroup::<String>::new(|_| 2);
    let mid_group = TuneGroup::<String>::new(|_| 1);
    let low_group = TuneGroup::<String>::new(|_| 0);

    TestSet::new(move |_: &Bindings| format!("{name}-grouped"), clone_inputs)
        .with(
            Tunable::new(FunctionTunable::named("skip", |_: Bindings| {
                Err::<(), _>(AutotuneError::Skip("not applicable".to_string()))
            }))
            .group(&high_group, |_| 1),
        )
        .with(
            Tunable::new(OneKernelAutotuneOperation::new(
                "add", add, client,
            ))
            .group(&mid_group, |_| 1),
        )
        .with(
            Tunable::new(FunctionTunable::named("counted", move |_: Bindings| {
                low.fetch_add(1, Ordering::Relaxed);
                Ok::<(), AutotuneError>(())
            }))
            .group(&low_group, |_| 1),
        )
}
