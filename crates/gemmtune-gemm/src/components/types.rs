use core::fmt::Display;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Storage type of a GEMM operand.
///
/// The serde names are the short codes used in benchmark configurations.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "s", alias = "S", alias = "f32", alias = "single")]
    F32,
    #[serde(rename = "d", alias = "D", alias = "f64", alias = "double")]
    F64,
    #[serde(rename = "h", alias = "H", alias = "f16", alias = "half")]
    F16,
    #[serde(rename = "b", alias = "B", alias = "bf16")]
    BF16,
    #[serde(rename = "i8", alias = "I8", alias = "int8")]
    I8,
    #[serde(rename = "i", alias = "I", alias = "i32", alias = "int32")]
    I32,
    /// OCP e4m3.
    #[serde(rename = "f8", alias = "F8")]
    F8,
    /// OCP e5m2.
    #[serde(rename = "b8", alias = "B8", alias = "bf8")]
    BF8,
    /// e4m3 with a single NaN and no negative zero.
    #[serde(rename = "f8n", alias = "F8N", alias = "f8_fnuz")]
    F8Fnuz,
    /// e5m2 with a single NaN and no negative zero.
    #[serde(rename = "b8n", alias = "B8N", alias = "bf8_fnuz")]
    BF8Fnuz,
}

impl DataType {
    /// Every data type, ordered so that longer codes come first.
    pub const ALL_BY_CODE_LEN: [DataType; 10] = [
        DataType::F8Fnuz,
        DataType::BF8Fnuz,
        DataType::I8,
        DataType::F8,
        DataType::BF8,
        DataType::F32,
        DataType::F64,
        DataType::F16,
        DataType::BF16,
        DataType::I32,
    ];

    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            DataType::F64 => 8,
            DataType::F32 | DataType::I32 => 4,
            DataType::F16 | DataType::BF16 => 2,
            DataType::I8 | DataType::F8 | DataType::BF8 | DataType::F8Fnuz | DataType::BF8Fnuz => 1,
        }
    }

    /// The code used in kernel names.
    pub fn code(&self) -> &'static str {
        match self {
            DataType::F32 => "S",
            DataType::F64 => "D",
            DataType::F16 => "H",
            DataType::BF16 => "B",
            DataType::I8 => "I8",
            DataType::I32 => "I",
            DataType::F8 => "F8",
            DataType::BF8 => "B8",
            DataType::F8Fnuz => "F8N",
            DataType::BF8Fnuz => "B8N",
        }
    }

    /// Whether the type is one of the 8-bit float formats.
    pub fn is_float8(&self) -> bool {
        matches!(
            self,
            DataType::F8 | DataType::BF8 | DataType::F8Fnuz | DataType::BF8Fnuz
        )
    }

    /// Whether the type holds integers.
    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::I8 | DataType::I32)
    }

    /// Largest finite value of the type.
    pub fn max_value(&self) -> f64 {
        match self {
            DataType::F32 => f32::MAX as f64,
            DataType::F64 => f64::MAX,
            DataType::F16 => half::f16::MAX.to_f64(),
            DataType::BF16 => half::bf16::MAX.to_f64(),
            DataType::I8 => i8::MAX as f64,
            DataType::I32 => i32::MAX as f64,
            DataType::F8 => gemmtune_common::e4m3::MAX,
            DataType::BF8 => gemmtune_common::e5m2::MAX,
            DataType::F8Fnuz => gemmtune_common::e4m3fnuz::MAX,
            DataType::BF8Fnuz => gemmtune_common::e5m2fnuz::MAX,
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL_BY_CODE_LEN
            .into_iter()
            .find(|ty| ty.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown data type code {s}"))
    }
}

/// Precision in which products are accumulated.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputeType {
    #[serde(rename = "s", alias = "S", alias = "f32")]
    F32,
    #[serde(rename = "d", alias = "D", alias = "f64")]
    F64,
    #[serde(rename = "i", alias = "I", alias = "i32")]
    I32,
    /// Accumulates in f32 after casting inputs to f16.
    #[serde(rename = "s_fast_h", alias = "f32_fast_f16")]
    F32FastF16,
    /// Accumulates in f32 after casting inputs to bf16.
    #[serde(rename = "s_fast_b", alias = "f32_fast_bf16")]
    F32FastBF16,
    /// Accumulates in f32 after casting inputs to fnuz e4m3.
    #[serde(rename = "s_fast_f8n", alias = "f32_fast_f8_fnuz")]
    F32FastF8Fnuz,
}

impl ComputeType {
    /// The type of the accumulators.
    pub fn data_type(&self) -> DataType {
        match self {
            ComputeType::F64 => DataType::F64,
            ComputeType::I32 => DataType::I32,
            _ => DataType::F32,
        }
    }

    /// The type inputs are cast to before the product, if any.
    pub fn fast_input(&self) -> Option<DataType> {
        match self {
            ComputeType::F32FastF16 => Some(DataType::F16),
            ComputeType::F32FastBF16 => Some(DataType::BF16),
            ComputeType::F32FastF8Fnuz => Some(DataType::F8Fnuz),
            _ => None,
        }
    }
}

impl From<DataType> for ComputeType {
    fn from(value: DataType) -> Self {
        match value {
            DataType::F64 => ComputeType::F64,
            DataType::I32 | DataType::I8 => ComputeType::I32,
            _ => ComputeType::F32,
        }
    }
}

/// Whether an operand is used as stored or transposed.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Transpose {
    #[default]
    #[serde(rename = "N", alias = "n")]
    N,
    #[serde(rename = "T", alias = "t")]
    T,
}

impl Transpose {
    /// Every transpose mode.
    pub const ALL: [Transpose; 2] = [Transpose::N, Transpose::T];

    pub fn is_transposed(&self) -> bool {
        matches!(self, Transpose::T)
    }
}

impl From<bool> for Transpose {
    fn from(transposed: bool) -> Self {
        match transposed {
            true => Transpose::T,
            false => Transpose::N,
        }
    }
}

impl Display for Transpose {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Transpose::N => f.write_str("N"),
            Transpose::T => f.write_str("T"),
        }
    }
}
