use serde::{Deserialize, Serialize};

use crate::catalog::{KernelCatalog, KernelSpec, Rejection};
use crate::components::GemmProblem;

use super::ExactSolutionTable;

/// Constraints on the kernels returned by the heuristic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemmPreference {
    /// Largest workspace a kernel may require.
    pub max_workspace_bytes: u64,
}

impl GemmPreference {
    pub fn with_max_workspace_bytes(mut self, bytes: u64) -> Self {
        self.max_workspace_bytes = bytes;
        self
    }
}

/// A kernel of the catalog, identified by its index.
#[derive(new, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Algo {
    pub index: usize,
    pub name: String,
}

/// A kernel proposed by the heuristic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeuristicResult {
    pub algo: Algo,
    /// Bytes of workspace the kernel needs for the problem.
    pub workspace_size: u64,
    /// Predicted efficiency in `(0, 1]`, higher is better.
    pub score: f64,
}

/// Device characteristics the heuristic depends on.
#[derive(new, Clone, Copy, Debug)]
pub struct SelectionTarget<'a> {
    pub arch: &'a str,
    pub compute_units: u32,
}

/// Rank the kernels of the catalog able to solve the problem, best first.
///
/// At most `requested` results are returned. A kernel recorded for the exact size of the problem
/// in `library` is ranked first when it is still compatible.
pub fn select(
    problem: &GemmProblem,
    catalog: &KernelCatalog,
    library: Option<&ExactSolutionTable>,
    target: SelectionTarget<'_>,
    preference: &GemmPreference,
    requested: usize,
) -> Vec<HeuristicResult> {
    let mut results = Vec::new();

    for (index, kernel) in catalog.iter().enumerate() {
        match check(kernel, problem, target.arch, preference) {
            Ok(workspace_size) => results.push(HeuristicResult {
                algo: Algo::new(index, kernel.name()),
                workspace_size,
                score: score(kernel, problem, target.compute_units),
            }),
            Err(reason) => log::debug!("Rejected {}: {reason}", kernel.name()),
        }
    }

    // Stable: equal scores keep the catalog order.
    results.sort_by(|a, b| b.score.total_cmp(&a.score));

    if let Some(name) = library.and_then(|library| library.lookup(problem))
        && let Some(position) = results.iter().position(|result| result.algo.name == name)
    {
        let exact = results.remove(position);
        results.insert(0, exact);
    }

    results.truncate(requested);
    results
}

/// Why every kernel that [select] would skip was rejected.
pub fn rejections(
    problem: &GemmProblem,
    catalog: &KernelCatalog,
    arch: &str,
    preference: &GemmPreference,
) -> Vec<(String, Rejection)> {
    catalog
        .iter()
        .filter_map(|kernel| {
            check(kernel, problem, arch, preference)
                .err()
                .map(|reason| (kernel.name(), reason))
        })
        .collect()
}

fn check(
    kernel: &KernelSpec,
    problem: &GemmProblem,
    arch: &str,
    preference: &GemmPreference,
) -> Result<u64, Rejection> {
    kernel.supports(problem, arch)?;
    kernel.check_workspace(problem, preference.max_workspace_bytes)
}

/// Predicted efficiency of a kernel for a problem.
///
/// Product of the useful fraction of the padded output tiles, the occupancy of the last wave of
/// workgroups, the useful fraction of the padded depth, the share of the main loop in the
/// iterations, a penalty for reducing split partial sums and the arithmetic intensity of the tile.
pub fn score(kernel: &KernelSpec, problem: &GemmProblem, compute_units: u32) -> f64 {
    let (m, n, k) = (problem.m as f64, problem.n as f64, problem.k as f64);
    let mt_m = kernel.tile.m.max(1) as f64;
    let mt_n = kernel.tile.n.max(1) as f64;
    let depth_u = kernel.tile.depth_u.max(1) as f64;
    let gsu = kernel.global_split_u.max(1) as f64;
    let compute_units = compute_units.max(1) as f64;

    let tiles_m = (m / mt_m).ceil();
    let tiles_n = (n / mt_n).ceil();
    let padding = (m * n) / (tiles_m * mt_m * tiles_n * mt_n);

    let workgroups = tiles_m * tiles_n * problem.batch as f64 * gsu;
    let waves = (workgroups / compute_units).ceil();
    let occupancy = workgroups / (waves * compute_units);

    let iterations = (k / gsu / depth_u).ceil().max(1.0);
    let depth = k / (iterations * depth_u * gsu);
    let main_loop = iterations / (iterations + 1.0);

    let reduction = match kernel.global_split_u {
        0 | 1 => 1.0,
        _ => 1.0 / (1.0 + 0.05 * gsu),
    };
    let intensity = (2.0 * mt_m * mt_n / (mt_m + mt_n) / 128.0).min(1.0);

    padding * occupancy * depth.min(1.0) * main_loop * reduction * intensity
}
