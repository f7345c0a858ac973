use std::thread::sleep;
use std::time::Duration;

use derive_new::new;
use gemmtune_runtime::server::{Handle, Kernel, ServerError};
use gemmtune_runtime::storage::ComputeStorage;

const SLEEP_MS: u64 = 1;

/// Handles of a binary elementwise operation.
#[derive(new, Clone, Debug)]
pub struct Bindings {
    pub lhs: Handle,
    pub rhs: Handle,
    pub out: Handle,
}

fn binary(
    bindings: &Bindings,
    storage: &mut dyn ComputeStorage,
    op: impl Fn(u8, u8) -> u8,
) -> Result<(), ServerError> {
    let lhs = storage.read(bindings.lhs.storage())?.to_vec();
    let rhs = storage.read(bindings.rhs.storage())?.to_vec();
    let out: Vec<u8> = lhs.iter().zip(rhs.iter()).map(|(a, b)| op(*a, *b)).collect();
    storage.write(bindings.out.storage(), 0, &out)?;
    Ok(())
}

#[derive(new, Debug)]
pub struct ElementwiseAddition(Bindings);

impl Kernel for ElementwiseAddition {
    fn name(&self) -> String {
        "add".to_string()
    }

    fn execute(self: Box<Self>, storage: &mut dyn ComputeStorage) -> Result<(), ServerError> {
        binary(&self.0, storage, u8::wrapping_add)
    }
}

#[derive(new, Debug)]
pub struct ElementwiseMultiplication(Bindings);

impl Kernel for ElementwiseMultiplication {
    fn name(&self) -> String {
        "mul".to_string()
    }

    fn execute(self: Box<Self>, storage: &mut dyn ComputeStorage) -> Result<(), ServerError> {
        binary(&self.0, storage, u8::wrapping_mul)
    }
}

/// Copies `lhs` into `out`, sleeping for every element.
#[derive(new, Debug)]
pub struct SlowWrongCopy(Bindings);

impl Kernel for SlowWrongCopy {
    fn name(&self) -> String {
        "slow-wrong".to_string()
    }

    fn execute(self: Box<Self>, storage: &mut dyn ComputeStorage) -> Result<(), ServerError> {
        // Slow and wrong on purpose, for tests
        binary(&self.0, storage, |lhs, _| {
            sleep(Duration::from_millis(SLEEP_MS));
            lhs
        })
    }
}

#[derive(new, Debug)]
pub struct FailingKernel(Bindings);

impl Kernel for FailingKernel {
    fn name(&self) -> String {
        "failing".to_string()
    }

    fn execute(self: Box<Self>, _storage: &mut dyn ComputeStorage) -> Result<(), ServerError> {
        Err(ServerError::execution("failing", "unsupported problem"))
    }
}
