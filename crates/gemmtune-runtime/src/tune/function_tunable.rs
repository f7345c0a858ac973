use core::marker::PhantomData;

use super::{AutotuneError, IntoTuneFn, TuneFn};

/// Tunable implemented as a function or closure returning a `Result`.
pub struct FunctionTunable<F, In, Out, Err> {
    name: String,
    func: F,
    _marker: PhantomData<fn(In) -> Result<Out, Err>>,
}

impl<F, In, Out, Err> FunctionTunable<F, In, Out, Err>
where
    F: Fn(In) -> Result<Out, Err> + Send + Sync + 'static,
{
    /// Wrap `func`, reporting it under `name` in logs and checksums.
    pub fn named(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _marker: PhantomData,
        }
    }
}

impl<F, In, Out, Err> TuneFn for FunctionTunable<F, In, Out, Err>
where
    F: Fn(In) -> Result<Out, Err> + Send + Sync + 'static,
    In: Clone + 'static,
    Out: 'static,
    Err: Into<AutotuneError> + 'static,
{
    type Inputs = In;
    type Output = Out;

    fn execute(&self, inputs: In) -> Result<Out, AutotuneError> {
        (self.func)(inputs).map_err(Into::into)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Dummy marker for function tunables
#[doc(hidden)]
pub struct IsFunction;

impl<F, In, Out, Err> IntoTuneFn<In, Out, (IsFunction, Err)> for F
where
    F: Fn(In) -> Result<Out, Err> + Send + Sync + 'static,
    In: Clone + 'static,
    Out: 'static,
    Err: Into<AutotuneError> + 'static,
{
    type Tunable = FunctionTunable<F, In, Out, Err>;

    fn into_tunable(self) -> Self::Tunable {
        FunctionTunable::named(core::any::type_name::<F>(), self)
    }
}
