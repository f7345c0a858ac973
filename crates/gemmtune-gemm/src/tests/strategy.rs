use std::sync::Arc;

use serial_test::serial;

use crate::base::{Strategy, launch};
use crate::catalog::KernelCatalog;
use crate::components::{DataType, GemmElems, GemmError, GemmProblem, GemmSetupError, Transpose};
use crate::heuristic::GemmPreference;

use super::gemm_test_launcher::{GemmTestCase, test_client};

fn case(m: usize, n: usize, k: usize, seed: u64) -> GemmTestCase {
    let problem = GemmProblem::new(
        m,
        n,
        k,
        1,
        Transpose::T,
        Transpose::N,
        GemmElems::uniform(DataType::F32),
    );
    GemmTestCase::sample(problem, 1.0, 0.25, seed)
}

fn launch_case(
    strategy: &Strategy,
    catalog: Arc<KernelCatalog>,
    case: &GemmTestCase,
    preference: &GemmPreference,
) -> Result<Vec<u8>, GemmError> {
    let client = test_client("gfx90a");
    let inputs = case.upload(&client)?;
    let d = inputs.d.clone();

    launch(
        strategy,
        &client,
        catalog,
        case.problem.clone(),
        inputs,
        preference,
    )?;
    client.sync()?;

    Ok(client.read_one(&d)?)
}

#[test_log::test]
fn heuristic_strategy() {
    let case = case(72, 40, 96, 101);
    let actual = launch_case(
        &Strategy::Heuristic,
        KernelCatalog::shared_builtin(),
        &case,
        &GemmPreference::default(),
    )
    .unwrap();

    case.assert_output(&actual, &case.args()).unwrap();
}

#[test_log::test]
fn heuristic_strategy_reports_rejections() {
    let case = case(16, 16, 16, 102);
    let catalog: KernelCatalog = KernelCatalog::builtin()
        .iter()
        .filter(|kernel| kernel.trans_a == Transpose::N)
        .cloned()
        .collect();

    let err = launch_case(
        &Strategy::Heuristic,
        Arc::new(catalog),
        &case,
        &GemmPreference::default(),
    )
    .unwrap_err();

    match err {
        GemmError::Setup(GemmSetupError::NoSolution { reasons }) => {
            assert!(!reasons.is_empty());
        }
        err => panic!("Expected no solution, got {err}"),
    }
}

#[test_log::test]
fn kernel_strategy_allocates_the_workspace() {
    let case = case(32, 32, 1024, 103);
    let name = KernelCatalog::builtin()
        .compatible(&case.problem, "gfx90a")
        .find(|(_, kernel)| kernel.global_split_u > 1)
        .map(|(_, kernel)| kernel.name())
        .unwrap();

    let actual = launch_case(
        &Strategy::Kernel(name),
        KernelCatalog::shared_builtin(),
        &case,
        &GemmPreference::default(),
    )
    .unwrap();

    case.assert_output(&actual, &case.args()).unwrap();
}

#[test_log::test]
fn kernel_strategy_unknown_name() {
    let case = case(16, 16, 16, 104);

    let err = launch_case(
        &Strategy::Kernel("Cijk_missing".to_string()),
        KernelCatalog::shared_builtin(),
        &case,
        &GemmPreference::default(),
    )
    .unwrap_err();

    assert!(err.to_string().contains("Cijk_missing"), "{err}");
}

#[test_log::test]
#[serial]
fn autotune_strategy() {
    let preference = GemmPreference::default().with_max_workspace_bytes(1 << 24);

    for seed in [105, 106] {
        let case = case(64, 48, 2048, seed);
        let actual = launch_case(
            &Strategy::Autotune,
            KernelCatalog::shared_builtin(),
            &case,
            &preference,
        )
        .unwrap();

        case.assert_output(&actual, &case.args()).unwrap();
    }
}
