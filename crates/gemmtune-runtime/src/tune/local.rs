use core::any::{Any, TypeId};
use core::fmt::Display;
use core::hash::Hash;
use std::sync::Arc;

use hashbrown::HashMap;

use super::{AutotuneError, AutotuneKey, TunableSet, TuneCacheResult, Tuner};
use crate::client::ComputeClient;

/// A local tuner allows to create a tuner for a specific key that can be different from the server
/// key.
pub struct LocalTuner<AK: AutotuneKey, ID> {
    state: spin::RwLock<Option<HashMap<ID, Tuner<AK>>>>,
    sets: spin::RwLock<Option<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>>,
    name: &'static str,
}

/// Create a local tuner with the provided name.
#[macro_export]
macro_rules! local_tuner {
    ($name:expr) => {
        $crate::tune::LocalTuner::new(concat!(module_path!(), "-", $name))
    };
    () => {
        $crate::tune::LocalTuner::new(module_path!())
    };
}

pub use local_tuner;

impl<AK, ID> LocalTuner<AK, ID>
where
    AK: AutotuneKey + 'static,
    ID: Hash + PartialEq + Eq + Clone + Display,
{
    /// Create a new local tuner.
    pub const fn new(name: &'static str) -> Self {
        Self {
            state: spin::RwLock::new(None),
            sets: spin::RwLock::new(None),
            name,
        }
    }

    /// Init the [tunable set](TunableSet) built by `init_set`, only once per closure type.
    pub fn init<In, Out, F>(&self, init_set: F) -> Arc<TunableSet<AK, In, Out>>
    where
        F: Fn() -> TunableSet<AK, In, Out> + 'static + Send + Sync,
        In: Clone + Send + 'static,
        Out: 'static,
    {
        let sets = self.sets.read();
        if let Some(sets) = sets.as_ref()
            && let Some(set) = sets.get(&TypeId::of::<F>())
            && let Ok(set) = set.clone().downcast()
        {
            return set;
        }
        core::mem::drop(sets);

        let mut sets = self.sets.write();
        let sets = sets.get_or_insert_with(Default::default);
        // Another thread may have registered it while the lock was released.
        if let Some(set) = sets.get(&TypeId::of::<F>())
            && let Ok(set) = set.clone().downcast()
        {
            return set;
        }

        let set = Arc::new(init_set());
        sets.insert(TypeId::of::<F>(), set.clone());
        set
    }

    /// Clear the autotune state.
    pub fn clear(&self) {
        let mut state = self.state.write();
        *state = None;
    }

    /// Execute the best operation in the provided [tunable set](TunableSet), autotuning the key
    /// of `inputs` on `client` the first time it is seen.
    pub fn execute<In, Out>(
        &self,
        id: &ID,
        client: &ComputeClient,
        operations: Arc<TunableSet<AK, In, Out>>,
        inputs: In,
    ) -> Result<Out, AutotuneError>
    where
        In: Clone + Send + 'static,
        Out: 'static,
    {
        let key = operations.generate_key(&inputs);

        let cached = self
            .state
            .read()
            .as_ref()
            .and_then(|state| state.get(id))
            .map(|tuner| tuner.fastest(&key));

        match cached {
            Some(TuneCacheResult::Hit { fastest_index }) => {
                return operations.fastest(fastest_index).execute(inputs);
            }
            Some(TuneCacheResult::Miss) => {}
            #[cfg(autotune_persistent_cache)]
            Some(TuneCacheResult::Unchecked) => {
                let checksum = operations.compute_checksum();
                let validated = self
                    .state
                    .write()
                    .as_mut()
                    .and_then(|state| state.get_mut(id))
                    .map(|tuner| tuner.validate_checksum(&key, &checksum));

                if let Some(TuneCacheResult::Hit { fastest_index }) = validated {
                    return operations.fastest(fastest_index).execute(inputs);
                }
            }
            None => {
                {
                    let mut state = self.state.write();
                    let map = state.get_or_insert_with(Default::default);

                    if !map.contains_key(id) {
                        let name = self.name.replace("::", "-");
                        let tuner = Tuner::new(&name, &id.to_string());
                        map.insert(id.clone(), tuner);
                    }
                }

                // The freshly loaded persistent cache may already know the key.
                return self.execute(id, client, operations, inputs);
            }
        }

        // Running benchmarks shouldn't lock the tuner, since a tunable can recursively use the
        // same tuner.
        let outcome = Tuner::benchmark(&operations, &key, &inputs, client)?;
        let fastest_index = outcome.fastest_index();

        if let Some(tuner) = self
            .state
            .write()
            .as_mut()
            .and_then(|state| state.get_mut(id))
        {
            tuner.register_autotune(outcome);
        }

        operations.fastest(fastest_index).execute(inputs)
    }

    /// Return the autotune result given a key.
    pub fn autotune_result(&self, id: &ID, key: &AK) -> TuneCacheResult {
        self.state
            .read()
            .as_ref()
            .and_then(|state| state.get(id))
            .map(|tuner| tuner.fastest(key))
            .unwrap_or(TuneCacheResult::Miss)
    }
}
