use crate::catalog::KernelCatalog;
use crate::components::{
    Activation, ComputeType, DataType, Epilogue, GemmAvailabilityError, GemmElems, GemmError,
    GemmProblem, GemmSetupError, Transpose,
};
use crate::gemm::Gemm;
use crate::heuristic::{Algo, GemmPreference};
use crate::kernels::elem::{decode, encode};

use super::gemm_test_launcher::{GemmTestCase, run_heuristic, test_client};
use super::test_utils::{assert_equals_approx, sample, tolerance};

fn f32_gemm(arch: &str) -> Gemm {
    Gemm::new(
        test_client(arch),
        Transpose::N,
        Transpose::N,
        DataType::F32,
        DataType::F32,
        DataType::F32,
        DataType::F32,
        ComputeType::F32,
    )
}

fn f32_case(m: usize, n: usize, k: usize) -> GemmTestCase {
    let problem = GemmProblem::new(
        m,
        n,
        k,
        1,
        Transpose::N,
        Transpose::N,
        GemmElems::uniform(DataType::F32),
    );
    GemmTestCase::sample(problem, 1.0, 1.0, 5)
}

fn unavailable(err: GemmError) -> GemmAvailabilityError {
    match err {
        GemmError::Setup(GemmSetupError::Unavailable(err)) => err,
        err => panic!("Expected an availability error, got {err}"),
    }
}

#[test_log::test]
fn run_requires_initialize() {
    let mut gemm = f32_gemm("gfx90a");
    let case = f32_case(16, 16, 16);
    let inputs = case.upload(gemm.client()).unwrap();
    gemm.set_problem(16, 16, 16, 1, Epilogue::default(), inputs)
        .unwrap();

    assert!(matches!(gemm.run(), Err(GemmError::NotInitialized)));
}

#[test_log::test]
fn heuristic_requires_problem() {
    let gemm = f32_gemm("gfx90a");

    let result = gemm.algo_get_heuristic(1, &GemmPreference::default());
    assert!(matches!(
        result,
        Err(GemmError::ProblemNotSet("algo_get_heuristic"))
    ));
}

#[test_log::test]
fn heuristic_kernel_matches_reference() {
    let mut gemm = f32_gemm("gfx90a");
    let case = f32_case(100, 36, 50);
    let inputs = case.upload(gemm.client()).unwrap();
    gemm.set_problem_descriptor(case.problem.clone(), inputs)
        .unwrap();

    let actual = run_heuristic(&mut gemm, &GemmPreference::default()).unwrap();

    case.assert_output(&actual, &case.args()).unwrap();
    assert_eq!(gemm.kernel().map(|kernel| kernel.global_split_u), Some(1));
}

#[test_log::test]
fn heuristic_is_empty_on_unknown_arch() {
    let mut gemm = f32_gemm("gfx1100");
    let case = f32_case(16, 16, 16);
    let inputs = case.upload(gemm.client()).unwrap();
    gemm.set_problem_descriptor(case.problem.clone(), inputs)
        .unwrap();

    let results = gemm
        .algo_get_heuristic(4, &GemmPreference::default())
        .unwrap();
    assert!(results.is_empty());
}

#[test_log::test]
fn initialize_checks_workspace() {
    let mut gemm = f32_gemm("gfx90a");
    let case = f32_case(64, 64, 512);
    let inputs = case.upload(gemm.client()).unwrap();
    gemm.set_problem_descriptor(case.problem.clone(), inputs)
        .unwrap();

    let catalog = KernelCatalog::builtin();
    let (index, kernel) = catalog
        .compatible(&case.problem, "gfx90a")
        .find(|(_, kernel)| kernel.global_split_u > 1)
        .unwrap();
    let algo = Algo::new(index, kernel.name());
    let required = kernel.workspace_size(&case.problem);

    let err = unavailable(gemm.initialize(&algo, None).unwrap_err());
    assert!(matches!(
        err,
        GemmAvailabilityError::WorkspaceTooSmall { provided: 0, .. }
    ));

    let workspace = gemm.client().empty(required as usize).unwrap();
    gemm.initialize(&algo, Some(workspace)).unwrap();
    gemm.run().unwrap();
    gemm.client().sync().unwrap();

    let d = gemm.inputs().unwrap().d.clone();
    let actual = gemm.client().read_one(&d).unwrap();
    case.assert_output(&actual, &case.args()).unwrap();
}

#[test_log::test]
fn initialize_rejects_incompatible_kernel() {
    let mut gemm = f32_gemm("gfx90a");
    let case = f32_case(16, 16, 16);
    let inputs = case.upload(gemm.client()).unwrap();
    gemm.set_problem_descriptor(case.problem.clone(), inputs)
        .unwrap();

    let catalog = KernelCatalog::builtin();
    let (index, kernel) = catalog
        .iter()
        .enumerate()
        .find(|(_, kernel)| kernel.trans_a == Transpose::T && kernel.arch == "gfx90a")
        .unwrap();

    let err = unavailable(
        gemm.initialize(&Algo::new(index, kernel.name()), None)
            .unwrap_err(),
    );
    assert!(matches!(err, GemmAvailabilityError::KernelRejected { .. }));

    let err = unavailable(
        gemm.initialize(&Algo::new(usize::MAX, "Cijk_unknown".to_string()), None)
            .unwrap_err(),
    );
    assert!(matches!(err, GemmAvailabilityError::KernelUnknown { .. }));
}

#[test_log::test]
fn problem_checks_buffers() {
    let mut gemm = f32_gemm("gfx90a");
    let client = gemm.client().clone();
    let case = f32_case(32, 32, 32);

    let mut inputs = case.upload(&client).unwrap();
    inputs.d = client.empty(16).unwrap();
    let err = unavailable(
        gemm.set_problem_descriptor(case.problem.clone(), inputs)
            .unwrap_err(),
    );
    assert!(matches!(
        err,
        GemmAvailabilityError::BufferTooSmall {
            name: "D",
            required: 4096,
            provided: 16,
        }
    ));

    let inputs = case.upload(&client).unwrap();
    let err = unavailable(
        gemm.set_problem(
            32,
            32,
            32,
            1,
            Epilogue::new(Some(DataType::F32), Activation::None),
            inputs,
        )
        .unwrap_err(),
    );
    assert!(matches!(
        err,
        GemmAvailabilityError::MissingBuffer { name: "bias" }
    ));
    assert!(gemm.problem().is_none());
}

#[test_log::test]
fn amax_requires_scale_buffer_and_valid_dividend() {
    let mut gemm = f32_gemm("gfx942");

    let err = gemm
        .set_amax_data(true, true, 0.0, false, false, 0.0)
        .unwrap_err();
    assert!(matches!(
        err,
        GemmError::Setup(GemmSetupError::InvalidConfig(_))
    ));
    assert!(
        gemm.set_amax_data(false, false, f32::NAN, true, false, f32::INFINITY)
            .is_err()
    );

    gemm.set_amax_data(true, true, 240.0, false, false, 0.0)
        .unwrap();
    let case = f32_case(16, 16, 16);
    let inputs = case.upload(gemm.client()).unwrap();
    let err = unavailable(
        gemm.set_problem_descriptor(case.problem.clone(), inputs)
            .unwrap_err(),
    );
    assert!(matches!(
        err,
        GemmAvailabilityError::MissingBuffer { name: "scale_a" }
    ));
}

#[test_log::test]
fn epilogue_matches_reference() {
    let client = test_client("gfx90a");
    let elems = GemmElems::new(
        DataType::F16,
        DataType::F16,
        DataType::F16,
        DataType::F16,
        ComputeType::F32,
    );
    let epilogue = Epilogue::new(Some(DataType::F32), Activation::Relu);
    let problem = GemmProblem::new(48, 40, 64, 2, Transpose::N, Transpose::T, elems)
        .with_epilogue(epilogue);
    let case = GemmTestCase::sample(problem, 0.75, 0.5, 71);

    let sav = sample(DataType::F32, case.problem.m, 72);
    let bias = sample(DataType::F32, case.problem.m, 73);
    let inputs = case
        .upload(&client)
        .unwrap()
        .with_scale_alpha_vec(client.create(&sav).unwrap())
        .with_bias(client.create(&bias).unwrap())
        .with_scale_c(client.create(&encode(DataType::F32, &[2.0])).unwrap())
        .with_scale_d(client.create(&encode(DataType::F32, &[0.5])).unwrap())
        .with_amax_d(client.empty(4).unwrap());
    let amax_d = inputs.amax_d.clone().unwrap();

    let mut gemm = Gemm::from_problem(
        &client,
        KernelCatalog::shared_builtin(),
        None,
        case.problem.clone(),
        inputs,
    )
    .unwrap();
    let actual = run_heuristic(&mut gemm, &GemmPreference::default()).unwrap();

    let mut args = case.args();
    args.scale_c = 2.0;
    args.scale_d = 0.5;
    args.scale_alpha_vec = Some(decode(DataType::F32, &sav));
    args.bias = Some(decode(DataType::F32, &bias));
    args.activation = Activation::Relu;
    case.assert_output(&actual, &args).unwrap();

    let expected = case.reference(&args);
    let amax = client.read_one(&amax_d).unwrap();
    assert_equals_approx(
        DataType::F32,
        &amax,
        &encode(DataType::F32, &[expected.amax_d]),
        tolerance(DataType::F32),
    )
    .unwrap();
}

#[test_log::test]
fn float8_amax_scaling_of_b() {
    let client = test_client("gfx942");
    let mut gemm = Gemm::new(
        client.clone(),
        Transpose::N,
        Transpose::N,
        DataType::F8Fnuz,
        DataType::F16,
        DataType::F16,
        DataType::F16,
        ComputeType::F32,
    );
    gemm.set_amax_data(false, false, 0.0, true, true, 240.0)
        .unwrap();

    let elems = GemmElems::new(
        DataType::F8Fnuz,
        DataType::F16,
        DataType::F16,
        DataType::F16,
        ComputeType::F32,
    );
    let problem = GemmProblem::new(64, 64, 64, 1, Transpose::N, Transpose::N, elems);
    let case = GemmTestCase::sample(problem, 1.0, 1.0, 83);
    let scale_b = client.empty(4).unwrap();
    let inputs = case
        .upload(&client)
        .unwrap()
        .with_scale_b(scale_b.clone());
    gemm.set_problem(64, 64, 64, 1, Epilogue::default(), inputs)
        .unwrap();

    let actual = run_heuristic(&mut gemm, &GemmPreference::default()).unwrap();

    let amax_b = decode(DataType::F16, &case.b)
        .into_iter()
        .fold(0.0f64, |amax, value| amax.max(value.abs()));
    let scale = client.read_as::<f32>(&scale_b).unwrap()[0] as f64;
    assert!((scale - 240.0 / amax_b).abs() <= 1e-4 * scale);

    let mut args = case.args();
    args.quant_b = scale;
    args.scale_b = 1.0 / scale;
    case.assert_output(&actual, &args).unwrap();
    assert!(gemm.kernel().is_some_and(|kernel| kernel.scale_ab));
}
