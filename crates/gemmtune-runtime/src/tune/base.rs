use super::{AutotuneKey, IntoTuneFn, TuneFn};
use hashbrown::HashSet;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// A tunable wraps a [function](TuneFn) that can be included in multiple [groups](TuneGroup).
///
/// When a tunable is part of multiple groups, it will be autotuned when one of those groups is
/// prioritized.
pub struct Tunable<K, Inputs, Output> {
    pub(crate) function: Arc<dyn TuneFn<Inputs = Inputs, Output = Output>>,
    groups: Vec<(TuneGroup<K>, PriorityFunc<K>)>,
}

impl<K, Inputs, Output> Tunable<K, Inputs, Output> {
    /// Create a new tunable based on a function.
    pub fn new<Marker>(function: impl IntoTuneFn<Inputs, Output, Marker>) -> Self {
        Self {
            function: Arc::new(function.into_tunable()),
            groups: Vec::new(),
        }
    }

    /// Tag the current tunable as part of the given [group](TuneGroup).
    ///
    /// The priority orders tunables within the group, the highest being autotuned first.
    pub fn group<F: Fn(&K) -> u8 + Send + Sync + 'static>(
        mut self,
        group: &TuneGroup<K>,
        priority: F,
    ) -> Self {
        self.groups.push((group.clone(), Arc::new(priority)));
        self
    }
}

/// A tune group encapsulates a priority that can be calculated based on an
/// [autotune key](AutotuneKey).
///
/// During autotuning, the higher prioritized groups will be autotuned first, and if a tunable
/// returns a valid result, no more groups will be autotuned afterward.
pub struct TuneGroup<K> {
    id: u32,
    pub(crate) priority: PriorityFunc<K>,
}

impl<K> Clone for TuneGroup<K> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            priority: self.priority.clone(),
        }
    }
}

impl<K> core::fmt::Debug for TuneGroup<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "TuneGroup({})", self.id)
    }
}

impl<K> TuneGroup<K> {
    /// Create a new group based on a priority function.
    pub fn new<F: Fn(&K) -> u8 + Send + Sync + 'static>(f: F) -> Self {
        let id = GROUP_COUNTER.fetch_add(1, Ordering::Relaxed);

        Self {
            id,
            priority: Arc::new(f),
        }
    }
}

/// A plan dictates which [tunables](Tunable) should be executed, and in what order.
///
/// Ungrouped tunables are always part of the first batch. Then each batch holds the tunables
/// sharing the highest remaining within-group priority of the highest priority group. A tunable
/// is never returned twice, even when it belongs to several groups.
#[derive(Debug)]
pub(crate) struct TunePlan {
    ungrouped: Vec<usize>,
    groups: BTreeMap<u8, BTreeMap<u8, Vec<usize>>>,
    planned: HashSet<usize>,
}

impl TunePlan {
    pub fn new<K: AutotuneKey, In, Out>(key: &K, tunables: &[Tunable<K, In, Out>]) -> Self {
        let mut ungrouped = Vec::new();
        let mut groups = BTreeMap::<u8, BTreeMap<u8, Vec<usize>>>::new();

        for (index, tunable) in tunables.iter().enumerate() {
            if tunable.groups.is_empty() {
                ungrouped.push(index);
                continue;
            }

            for (group, within_group_priority) in tunable.groups.iter() {
                let group_priority = (group.priority)(key);
                let priority = within_group_priority(key);

                groups
                    .entry(group_priority)
                    .or_default()
                    .entry(priority)
                    .or_default()
                    .push(index);
            }
        }

        Self {
            ungrouped,
            groups,
            planned: HashSet::new(),
        }
    }

    /// Get the next batch of [tunable](Tunable) index to be autotuned.
    ///
    /// Note that if the list is empty, it means no more autotuned entry can be executed.
    pub(crate) fn next(&mut self) -> Vec<usize> {
        let mut indices = core::mem::take(&mut self.ungrouped);
        self.planned.extend(indices.iter().copied());

        while let Some(mut group) = self.groups.last_entry() {
            let batch = group.get_mut().pop_last();
            if group.get().is_empty() {
                group.remove();
            }

            let Some((_, batch)) = batch else {
                continue;
            };

            let batch: Vec<usize> = batch
                .into_iter()
                .filter(|index| self.planned.insert(*index))
                .collect();

            if !batch.is_empty() {
                indices.extend(batch);
                break;
            }
        }

        indices
    }
}

type PriorityFunc<K> = Arc<dyn Fn(&K) -> u8 + Send + Sync>;

static GROUP_COUNTER: AtomicU32 = AtomicU32::new(0);

#[cfg(test)]
mod tests {
    use core::fmt::Display;

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::tune::AutotuneError;

    #[derive(Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize, Debug)]
    struct ShapeKey {
        k: usize,
    }

    impl Display for ShapeKey {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            write!(f, "k={}", self.k)
        }
    }

    impl AutotuneKey for ShapeKey {}

    type TestTunable = Tunable<ShapeKey, (), ()>;

    fn tunable() -> TestTunable {
        Tunable::new(|_: ()| Ok::<(), AutotuneError>(()))
    }

    #[test]
    fn test_plan_order() {
        let group0 = TuneGroup::<ShapeKey>::new(|_| 2);
        let group1 = TuneGroup::<ShapeKey>::new(|_| 1);

        let tunable0 = tunable();
        let tunable1 = tunable().group(&group0, |_| 1);
        let tunable2 = tunable().group(&group0, |_| 2);
        let tunable3 = tunable().group(&group1, |_| 2);

        let key = ShapeKey { k: 64 };
        let mut plan = TunePlan::new(&key, &[tunable0, tunable1, tunable2, tunable3]);

        assert_eq!(plan.next(), vec![0, 2]);
        assert_eq!(plan.next(), vec![1]);
        assert_eq!(plan.next(), vec![3]);
        assert!(plan.next().is_empty());
    }

    #[test]
    fn test_plan_order_multi_groups_same_priority() {
        let group0 = TuneGroup::<ShapeKey>::new(|_| 2);
        let group1 = TuneGroup::<ShapeKey>::new(|_| 1);
        let group2 = TuneGroup::<ShapeKey>::new(|_| 1);

        let tunable0 = tunable();
        let tunable1 = tunable().group(&group0, |_| 1);
        let tunable2 = tunable().group(&group0, |_| 2);
        let tunable3 = tunable().group(&group1, |_| 2);
        let tunable4 = tunable().group(&group2, |_| 2);

        let key = ShapeKey { k: 64 };
        let mut plan = TunePlan::new(&key, &[tunable0, tunable1, tunable2, tunable3, tunable4]);

        assert_eq!(plan.next(), vec![0, 2]);
        assert_eq!(plan.next(), vec![1]);
        assert_eq!(plan.next(), vec![3, 4]);
        assert!(plan.next().is_empty());
    }

    #[test]
    fn test_plan_order_tunable_multiple_groups() {
        let group0 = TuneGroup::<ShapeKey>::new(|_| 1);
        let group1 = TuneGroup::<ShapeKey>::new(|_| 2);

        let tunable0 = tunable();
        let tunable1 = tunable().group(&group0, |_| 1).group(&group1, |_| 2);
        let tunable2 = tunable().group(&group0, |_| 2);
        let tunable3 = tunable().group(&group1, |_| 3);

        let key = ShapeKey { k: 64 };
        let mut plan = TunePlan::new(&key, &[tunable0, tunable1, tunable2, tunable3]);

        assert_eq!(plan.next(), vec![0, 3]);
        assert_eq!(plan.next(), vec![1]);
        assert_eq!(plan.next(), vec![2]);
        assert!(plan.next().is_empty());
    }

    #[test]
    fn test_plan_priority_depends_on_key() {
        let large_k = TuneGroup::<ShapeKey>::new(|key| if key.k >= 4096 { 2 } else { 0 });
        let default = TuneGroup::<ShapeKey>::new(|_| 1);

        let tunables = || {
            [
                tunable().group(&default, |_| 1),
                tunable().group(&large_k, |_| 1),
            ]
        };

        let mut small = TunePlan::new(&ShapeKey { k: 64 }, &tunables());
        let mut large = TunePlan::new(&ShapeKey { k: 8192 }, &tunables());

        assert_eq!(small.next(), vec![0]);
        assert_eq!(large.next(), vec![1]);
    }

    #[test]
    fn test_plan_no_group() {
        let key = ShapeKey { k: 64 };
        let mut plan = TunePlan::new(&key, &[tunable(), tunable()]);

        assert_eq!(plan.next(), vec![0, 1]);
        assert!(plan.next().is_empty());
    }
}
