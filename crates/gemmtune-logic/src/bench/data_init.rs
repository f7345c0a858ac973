use gemmtune_gemm::components::{DataType, GemmProblem, Operand};
use gemmtune_gemm::kernels::elem::encode;
use rand::Rng;

use crate::config::ConfigError;

/// How the elements of a benchmark buffer are initialized, from the `DataInitType*` codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataInit {
    Zero,
    One,
    Two,
    /// Integers in `[-8, 8]`, floats in `[-1, 1)`.
    Random,
    Nan,
    Inf,
    /// The element index modulo 32.
    Serial,
    /// One on the diagonal of every matrix, zero elsewhere.
    Identity,
    /// Sine of the element index.
    Sin,
    /// Cosine of the element index.
    Cos,
    /// Integers in `[-2, 2]`, floats in `[-0.125, 0.125)`.
    RandomNarrow,
    NegativeOne,
}

impl DataInit {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => DataInit::Zero,
            1 => DataInit::One,
            2 => DataInit::Two,
            3 => DataInit::Random,
            4 => DataInit::Nan,
            5 => DataInit::Inf,
            8 => DataInit::Serial,
            11 => DataInit::Identity,
            12 => DataInit::Sin,
            13 => DataInit::Cos,
            16 => DataInit::RandomNarrow,
            17 => DataInit::NegativeOne,
            _ => return None,
        })
    }

    /// The init of a configured code, `default` when the code is absent.
    pub fn configured(
        code: Option<u32>,
        default: DataInit,
        operand: &'static str,
    ) -> Result<Self, ConfigError> {
        match code {
            None => Ok(default),
            Some(code) => {
                Self::from_code(code).ok_or(ConfigError::InvalidDataInit { operand, code })
            }
        }
    }

    fn value<R: Rng>(&self, index: usize, row: usize, col: usize, integer: bool, rng: &mut R) -> f64 {
        match self {
            DataInit::Zero => 0.0,
            DataInit::One => 1.0,
            DataInit::Two => 2.0,
            DataInit::NegativeOne => -1.0,
            DataInit::Nan => f64::NAN,
            DataInit::Inf => f64::INFINITY,
            DataInit::Serial => (index % 32) as f64,
            DataInit::Identity => (row == col) as u32 as f64,
            DataInit::Sin => (index as f64).sin(),
            DataInit::Cos => (index as f64).cos(),
            DataInit::Random => match integer {
                true => rng.gen_range(-8i32..=8) as f64,
                false => rng.gen_range(-1.0..1.0),
            },
            DataInit::RandomNarrow => match integer {
                true => rng.gen_range(-2i32..=2) as f64,
                false => rng.gen_range(-0.125..0.125),
            },
        }
    }

    /// A scalar such as alpha or beta.
    pub fn scalar<R: Rng>(&self, rng: &mut R) -> f64 {
        self.value(0, 0, 0, false, rng)
    }

    /// Every element of a vector of `len` values.
    pub fn vector<R: Rng>(&self, ty: DataType, len: usize, rng: &mut R) -> Vec<u8> {
        let values: Vec<f64> = (0..len)
            .map(|index| self.value(index, index, 0, ty.is_integer(), rng))
            .collect();

        encode(ty, &values)
    }

    /// Every element of an operand, padding included.
    pub fn operand<R: Rng>(&self, problem: &GemmProblem, operand: Operand, rng: &mut R) -> Vec<u8> {
        let ty = problem.data_type(operand);
        let ld = problem.ld(operand).max(1);
        let stride = problem.batch_stride(operand);

        let values: Vec<f64> = (0..problem.num_elems(operand))
            .map(|index| {
                let local = match stride {
                    0 => index,
                    stride => index % stride,
                };
                self.value(index, local % ld, local / ld, ty.is_integer(), rng)
            })
            .collect();

        encode(ty, &values)
    }
}
