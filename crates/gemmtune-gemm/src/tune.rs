use std::sync::Arc;

use gemmtune_runtime::client::ComputeClient;
use gemmtune_runtime::config::GlobalConfig;
use gemmtune_runtime::device::DeviceId;
use gemmtune_runtime::local_tuner;
use gemmtune_runtime::server::Handle;
use gemmtune_runtime::tune::{FunctionTunable, LocalTuner, Tunable, TunableSet, TuneGroup};

use crate::catalog::KernelCatalog;
use crate::components::{GemmAvailabilityError, GemmError, GemmProblem};
use crate::gemm::{Gemm, GemmInputs};
use crate::heuristic::{Algo, ExactSolutionTable, GemmPreference, HeuristicResult};
use crate::tune_key::{GemmAutotuneKey, should_tune_split_k};

/// Everything needed to run a GEMM with any kernel of a catalog.
#[derive(new, Clone)]
pub struct GemmTuneInputs {
    client: ComputeClient,
    catalog: Arc<KernelCatalog>,
    library: Option<Arc<ExactSolutionTable>>,
    problem: GemmProblem,
    inputs: GemmInputs,
    preference: GemmPreference,
}

impl GemmTuneInputs {
    fn gemm(&self) -> Result<Gemm, GemmError> {
        Gemm::from_problem(
            &self.client,
            self.catalog.clone(),
            self.library.clone(),
            self.problem.clone(),
            self.inputs.clone(),
        )
    }
}

/// Initialize `gemm` with the kernel of `result`, allocating the workspace it needs, and run it.
pub(crate) fn run_result(gemm: &mut Gemm, result: &HeuristicResult) -> Result<(), GemmError> {
    let workspace = workspace(gemm.client(), result.workspace_size)?;
    gemm.initialize(&result.algo, workspace)?;
    gemm.run()
}

pub(crate) fn workspace(client: &ComputeClient, size: u64) -> Result<Option<Handle>, GemmError> {
    match size {
        0 => Ok(None),
        size => Ok(Some(client.empty(size as usize)?)),
    }
}

fn run_rank(rank: usize, inputs: GemmTuneInputs) -> Result<(), GemmError> {
    let mut gemm = inputs.gemm()?;
    let results = gemm.algo_get_heuristic(rank + 1, &inputs.preference)?;
    let result = results
        .get(rank)
        .ok_or(GemmAvailabilityError::NoCandidate { rank })?;

    run_result(&mut gemm, result)
}

fn run_best_split(inputs: GemmTuneInputs) -> Result<(), GemmError> {
    let mut gemm = inputs.gemm()?;
    let results = gemm.algo_get_heuristic(usize::MAX, &inputs.preference)?;
    let catalog = &inputs.catalog;
    let result = results
        .iter()
        .find(|result| {
            catalog
                .kernel(result.algo.index)
                .is_some_and(|kernel| kernel.global_split_u > 1)
        })
        .ok_or(GemmAvailabilityError::NoCandidate { rank: 0 })?;

    run_result(&mut gemm, result)
}

fn run_library(inputs: GemmTuneInputs) -> Result<(), GemmError> {
    let name = inputs
        .library
        .as_ref()
        .and_then(|library| library.lookup(&inputs.problem))
        .ok_or(GemmAvailabilityError::NoLibraryEntry)?
        .to_string();
    let index = inputs
        .catalog
        .index_of(&name)
        .ok_or_else(|| GemmAvailabilityError::KernelUnknown { name: name.clone() })?;
    let kernel = inputs
        .catalog
        .kernel(index)
        .ok_or_else(|| GemmAvailabilityError::KernelUnknown { name: name.clone() })?;

    let mut gemm = inputs.gemm()?;
    let workspace = workspace(gemm.client(), kernel.workspace_size(&inputs.problem))?;
    gemm.initialize(&Algo::new(index, name), workspace)?;
    gemm.run()
}

/// Benchmarks run on a fresh output so they don't clobber the real one.
fn fresh_output(_key: &GemmAutotuneKey, inputs: &GemmTuneInputs) -> GemmTuneInputs {
    let mut generated = inputs.clone();
    match inputs.client.empty(inputs.inputs.d.size() as usize) {
        Ok(d) => generated.inputs.d = d,
        Err(err) => log::warn!("Unable to allocate a tuning output, reusing D: {err}"),
    }
    generated
}

fn gemm_tunables() -> TunableSet<GemmAutotuneKey, GemmTuneInputs, ()> {
    let candidates = GlobalConfig::get()
        .autotune
        .level
        .max_candidates()
        .unwrap_or_else(|| KernelCatalog::shared_builtin().len());

    let library = TuneGroup::<GemmAutotuneKey>::new(|_| 2);
    let heuristic = TuneGroup::<GemmAutotuneKey>::new(|_| 1);
    let split_k = TuneGroup::<GemmAutotuneKey>::new(|key| match should_tune_split_k(key) {
        true => 1,
        false => 0,
    });

    let mut set = TunableSet::new(
        |inputs: &GemmTuneInputs| GemmAutotuneKey::generate(&inputs.problem),
        fresh_output,
    )
    .with(
        Tunable::new(FunctionTunable::named("library-exact", run_library)).group(&library, |_| 1),
    );

    for rank in 0..candidates {
        let name = format!("heuristic-rank-{rank}");
        let tunable =
            FunctionTunable::named(name, move |inputs: GemmTuneInputs| run_rank(rank, inputs));
        set = set.with(Tunable::new(tunable).group(&heuristic, |_| 1));
    }

    set.with(
        Tunable::new(FunctionTunable::named("heuristic-split-k", run_best_split))
            .group(&split_k, |_| 1),
    )
}

static TUNER: LocalTuner<GemmAutotuneKey, DeviceId> = local_tuner!("gemm");

/// Run the fastest kernel for the problem, autotuning its key on first use.
///
/// An exact library entry is used without benchmarking; otherwise the best heuristic candidates
/// are benchmarked, the number of which depends on the configured autotune level.
pub fn launch_tuned(inputs: GemmTuneInputs) -> Result<(), GemmError> {
    let client = inputs.client.clone();
    let set = TUNER.init(gemm_tunables);

    TUNER.execute(&client.id(), &client, set, inputs)?;
    Ok(())
}
