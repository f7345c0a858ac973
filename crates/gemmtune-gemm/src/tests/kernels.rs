use crate::catalog::{KernelCatalog, KernelSpec};
use crate::components::{ComputeType, DataType, GemmElems, GemmProblem, Operand, Transpose};
use crate::kernels::elem::encode;

use super::gemm_test_launcher::{GemmTestCase, test_client, test_gemm_kernel};

fn compatible(problem: &GemmProblem, arch: &str) -> Vec<KernelSpec> {
    let catalog = KernelCatalog::builtin();
    catalog
        .compatible(problem, arch)
        .map(|(_, kernel)| kernel.clone())
        .collect()
}

/// Leading dimensions a few elements larger than the stored rows.
fn padded(problem: GemmProblem) -> GemmProblem {
    let lda = problem.stored_shape(Operand::A).0 + 3;
    let ldb = problem.stored_shape(Operand::B).0 + 1;
    let (ldc, ldd) = (problem.m + 2, problem.m + 5);
    problem.with_leading_dims(lda, ldb, ldc, ldd)
}

#[test_log::test]
fn every_tile_of_the_catalog_f32() {
    let client = test_client("gfx90a");
    let problem = GemmProblem::new(
        70,
        45,
        130,
        2,
        Transpose::N,
        Transpose::N,
        GemmElems::uniform(DataType::F32),
    );
    let case = GemmTestCase::sample(problem, 1.5, 0.5, 11);

    let kernels = compatible(&case.problem, "gfx90a");
    assert_eq!(kernels.len(), 5);
    assert!(kernels.iter().any(|kernel| kernel.global_split_u == 4));

    for kernel in kernels {
        test_gemm_kernel(&client, &case, &kernel).unwrap();
    }
}

#[test_log::test]
fn every_transpose_f16_with_padding() {
    let client = test_client("gfx90a");

    for trans_a in Transpose::ALL {
        for trans_b in Transpose::ALL {
            let problem = padded(GemmProblem::new(
                33,
                70,
                64,
                1,
                trans_a,
                trans_b,
                GemmElems::new(
                    DataType::F16,
                    DataType::F16,
                    DataType::F16,
                    DataType::F16,
                    ComputeType::F32,
                ),
            ));
            let case = GemmTestCase::sample(problem, 1.0, 1.0, 23);

            for kernel in compatible(&case.problem, "gfx90a") {
                test_gemm_kernel(&client, &case, &kernel).unwrap();
            }
        }
    }
}

#[test_log::test]
fn batched_bf16() {
    let client = test_client("gfx942");
    let problem = GemmProblem::new(
        40,
        24,
        96,
        3,
        Transpose::T,
        Transpose::N,
        GemmElems::new(
            DataType::BF16,
            DataType::BF16,
            DataType::BF16,
            DataType::BF16,
            ComputeType::F32,
        ),
    );
    let case = GemmTestCase::sample(problem, 0.5, 0.0, 31);

    for kernel in compatible(&case.problem, "gfx942") {
        test_gemm_kernel(&client, &case, &kernel).unwrap();
    }
}

#[test_log::test]
fn int8_is_exact() {
    let client = test_client("gfx90a");
    let problem = GemmProblem::new(
        65,
        17,
        128,
        1,
        Transpose::N,
        Transpose::T,
        GemmElems::new(
            DataType::I8,
            DataType::I8,
            DataType::I32,
            DataType::I32,
            ComputeType::I32,
        ),
    );
    let case = GemmTestCase::sample(problem, 1.0, 1.0, 47);

    for kernel in compatible(&case.problem, "gfx90a") {
        test_gemm_kernel(&client, &case, &kernel).unwrap();
    }
}

#[test_log::test]
fn int8_requires_aligned_depth() {
    let problem = GemmProblem::new(
        16,
        16,
        30,
        1,
        Transpose::N,
        Transpose::N,
        GemmElems::new(
            DataType::I8,
            DataType::I8,
            DataType::I32,
            DataType::I32,
            ComputeType::I32,
        ),
    );

    assert!(compatible(&problem, "gfx90a").is_empty());
}

#[test_log::test]
fn mixed_float8_and_f16() {
    let client = test_client("gfx942");
    let elems = GemmElems::new(
        DataType::F8Fnuz,
        DataType::F16,
        DataType::F16,
        DataType::F16,
        ComputeType::F32,
    );
    let problem = GemmProblem::new(48, 80, 72, 1, Transpose::N, Transpose::N, elems);
    let case = GemmTestCase::sample(problem, 1.0, 1.0, 59);

    let kernels = compatible(&case.problem, "gfx942");
    assert!(!kernels.is_empty());
    assert!(compatible(&case.problem, "gfx90a").is_empty());

    for kernel in kernels {
        test_gemm_kernel(&client, &case, &kernel).unwrap();
    }
}

#[test_log::test]
fn zero_beta_never_reads_c() {
    let client = test_client("gfx90a");
    let problem = GemmProblem::new(
        20,
        20,
        20,
        1,
        Transpose::N,
        Transpose::N,
        GemmElems::uniform(DataType::F32),
    );
    let mut case = GemmTestCase::sample(problem, 1.0, 0.0, 61);
    case.c = encode(DataType::F32, &vec![f64::NAN; case.problem.num_elems(Operand::C)]);

    for kernel in compatible(&case.problem, "gfx90a") {
        test_gemm_kernel(&client, &case, &kernel).unwrap();
    }
}
