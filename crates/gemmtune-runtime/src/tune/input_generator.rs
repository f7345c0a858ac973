/// A function that generates the autotune key from a set of inputs.
pub trait KeyGenerator<K, Inputs>: Send + Sync + 'static {
    /// Generate the key describing `inputs`.
    fn generate(&self, inputs: &Inputs) -> K;
}

impl<K, Inputs, F> KeyGenerator<K, Inputs> for F
where
    F: Fn(&Inputs) -> K + Send + Sync + 'static,
{
    fn generate(&self, inputs: &Inputs) -> K {
        self(inputs)
    }
}

/// A function that generates the input for autotuning passes.
///
/// Benchmarks run on generated inputs so they never clobber the buffers of the real call.
pub trait InputGenerator<K, Inputs>: Send + Sync + 'static {
    /// Generate a set of inputs for a given key and reference inputs
    fn generate(&self, key: &K, inputs: &Inputs) -> Inputs;
}

impl<K, Inputs, F> InputGenerator<K, Inputs> for F
where
    F: Fn(&K, &Inputs) -> Inputs + Send + Sync + 'static,
{
    fn generate(&self, key: &K, inputs: &Inputs) -> Inputs {
        self(key, inputs)
    }
}

/// Input generator reusing the reference inputs as they are.
pub fn clone_inputs<K, Inputs: Clone>(_key: &K, inputs: &Inputs) -> Inputs {
    inputs.clone()
}
