use crate::components::{DataType, GemmProblem};

use super::elem::decode;
use super::epilogue::{GemmArgs, store_output};
use super::host::{Accumulate, HostOperands, load_operands};

/// Result of a host GEMM.
#[derive(Clone, Debug, PartialEq)]
pub struct HostOutput {
    /// The bytes of `D`, padding untouched.
    pub d: Vec<u8>,
    /// Absolute maximum of `D` before `scale_d` is applied.
    pub amax_d: f64,
}

/// Untiled GEMM on host buffers, accumulating `k` in order.
///
/// Used to validate the tiled kernels.
pub fn reference_gemm(
    problem: &GemmProblem,
    a: &[u8],
    b: &[u8],
    c: &[u8],
    d: &[u8],
    args: &GemmArgs,
) -> HostOutput {
    let acc = match problem.elems.compute.data_type() {
        DataType::F64 => accumulate::<f64>(problem, a, b, args),
        DataType::I32 => accumulate::<i32>(problem, a, b, args),
        _ => accumulate::<f32>(problem, a, b, args),
    };
    let c = match args.beta != 0.0 {
        true => decode(problem.elems.c, c),
        false => Vec::new(),
    };

    let mut d = d.to_vec();
    let amax_d = store_output(problem, args, &acc, &c, &mut d);

    HostOutput { d, amax_d }
}

/// Relative tolerance when comparing an output stored with the given type to the reference.
///
/// Tiled kernels may sum in a different order, which rounds differently once stored.
pub fn tolerance(ty: DataType) -> f64 {
    match ty {
        DataType::F64 => 1e-10,
        DataType::F32 => 1e-4,
        DataType::F16 => 2e-3,
        DataType::BF16 => 1.6e-2,
        DataType::I8 | DataType::I32 => 0.0,
        DataType::F8 | DataType::BF8 | DataType::F8Fnuz | DataType::BF8Fnuz => 0.25,
    }
}

/// Whether `actual` is within `epsilon` of `expected`, relatively for large values.
pub fn approx_eq(actual: f64, expected: f64, epsilon: f64) -> bool {
    if actual.is_nan() || expected.is_nan() {
        return actual.is_nan() && expected.is_nan();
    }
    if actual == expected {
        return true;
    }
    (actual - expected).abs() <= epsilon * expected.abs().max(1.0)
}

fn accumulate<A: Accumulate>(
    problem: &GemmProblem,
    a: &[u8],
    b: &[u8],
    args: &GemmArgs,
) -> Vec<f64> {
    let operands = load_operands::<A>(problem, a, b, args.quant_a, args.quant_b);
    dot_products(problem, &operands)
        .into_iter()
        .map(A::to_f64)
        .collect()
}

pub(crate) fn dot_products<A: Accumulate>(
    problem: &GemmProblem,
    operands: &HostOperands<A>,
) -> Vec<A> {
    let (m, n, k) = (problem.m, problem.n, problem.k);
    let mut out = Vec::with_capacity(problem.batch * m * n);

    for batch in 0..problem.batch {
        for i in 0..m {
            let row = &operands.a[(batch * m + i) * k..(batch * m + i + 1) * k];
            for j in 0..n {
                let col = &operands.bt[(batch * n + j) * k..(batch * n + j + 1) * k];
                let mut sum = A::default();
                for (x, y) in row.iter().zip(col) {
                    sum = sum.fma(*x, *y);
                }
                out.push(sum);
            }
        }
    }

    out
}
