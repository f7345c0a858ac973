use std::sync::Arc;

use gemmtune_runtime::client::ComputeClient;

use crate::catalog::KernelCatalog;
use crate::components::{GemmAvailabilityError, GemmError, GemmProblem, GemmSetupError};
use crate::gemm::{Gemm, GemmInputs};
use crate::heuristic::{Algo, ExactSolutionTable, GemmPreference, rejections};
use crate::tune::{GemmTuneInputs, launch_tuned, run_result, workspace};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// How the kernel of a GEMM is chosen.
pub enum Strategy {
    /// The best kernel according to the heuristic.
    Heuristic,
    /// The kernel of the catalog with the given name.
    Kernel(String),
    #[default]
    /// The fastest of the best heuristic candidates, benchmarked once per autotune key.
    Autotune,
}

/// Launch a GEMM on the client's stream, choosing its kernel with the strategy.
///
/// The workspace the chosen kernel needs is allocated for the launch, up to the preference limit.
pub fn launch(
    strategy: &Strategy,
    client: &ComputeClient,
    catalog: Arc<KernelCatalog>,
    problem: GemmProblem,
    inputs: GemmInputs,
    preference: &GemmPreference,
) -> Result<(), GemmError> {
    let library = ExactSolutionTable::installed();

    match strategy {
        Strategy::Heuristic => {
            let mut gemm =
                Gemm::from_problem(client, catalog.clone(), library, problem.clone(), inputs)?;
            let results = gemm.algo_get_heuristic(1, preference)?;
            let Some(best) = results.first() else {
                let problem = gemm.problem().unwrap_or(&problem);
                let arch = &client.properties().arch;
                return Err(GemmSetupError::NoSolution {
                    reasons: rejections(problem, &catalog, arch, preference),
                }
                .into());
            };
            run_result(&mut gemm, best)
        }
        Strategy::Kernel(name) => {
            let (index, kernel) = catalog
                .index_of(name)
                .and_then(|index| catalog.kernel(index).map(|kernel| (index, kernel)))
                .ok_or_else(|| GemmAvailabilityError::KernelUnknown { name: name.clone() })?;
            let size = kernel.workspace_size(&problem);
            let mut gemm = Gemm::from_problem(client, catalog.clone(), library, problem, inputs)?;
            gemm.initialize(&Algo::new(index, name.clone()), workspace(client, size)?)?;
            gemm.run()
        }
        Strategy::Autotune => launch_tuned(GemmTuneInputs::new(
            client.clone(),
            catalog,
            library,
            problem,
            inputs,
            *preference,
        )),
    }
}
