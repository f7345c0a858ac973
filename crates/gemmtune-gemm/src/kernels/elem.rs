use gemmtune_common::{e4m3, e4m3fnuz, e5m2, e5m2fnuz};
use half::{bf16, f16};

use crate::components::DataType;

/// Decode little endian elements of the given type. Trailing bytes that don't form a whole
/// element are ignored.
pub fn decode(ty: DataType, bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(ty.size())
        .map(|chunk| decode_one(ty, chunk))
        .collect()
}

/// Decode the element at `index`.
pub fn decode_at(ty: DataType, bytes: &[u8], index: usize) -> Option<f64> {
    let start = index * ty.size();
    bytes
        .get(start..start + ty.size())
        .map(|chunk| decode_one(ty, chunk))
}

fn decode_one(ty: DataType, chunk: &[u8]) -> f64 {
    match ty {
        DataType::F32 => f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64,
        DataType::F64 => f64::from_le_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
        ]),
        DataType::F16 => f16::from_bits(u16::from_le_bytes([chunk[0], chunk[1]])).to_f64(),
        DataType::BF16 => bf16::from_bits(u16::from_le_bytes([chunk[0], chunk[1]])).to_f64(),
        DataType::I8 => chunk[0] as i8 as f64,
        DataType::I32 => i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64,
        DataType::F8 => e4m3::from_bits(chunk[0]).to_f32() as f64,
        DataType::BF8 => e5m2::from_bits(chunk[0]).to_f32() as f64,
        DataType::F8Fnuz => e4m3fnuz::from_bits(chunk[0]).to_f32() as f64,
        DataType::BF8Fnuz => e5m2fnuz::from_bits(chunk[0]).to_f32() as f64,
    }
}

/// Encode values as little endian elements of the given type, rounding to nearest and
/// saturating where the type does.
pub fn encode(ty: DataType, values: &[f64]) -> Vec<u8> {
    let mut bytes = vec![0; values.len() * ty.size()];
    for (index, value) in values.iter().enumerate() {
        encode_at(ty, &mut bytes, index, *value);
    }
    bytes
}

/// Encode a value in place at the element `index` of `bytes`.
///
/// # Panics
///
/// If the element is out of bounds.
pub fn encode_at(ty: DataType, bytes: &mut [u8], index: usize, value: f64) {
    let start = index * ty.size();
    let out = &mut bytes[start..start + ty.size()];

    match ty {
        DataType::F32 => out.copy_from_slice(&(value as f32).to_le_bytes()),
        DataType::F64 => out.copy_from_slice(&value.to_le_bytes()),
        DataType::F16 => out.copy_from_slice(&f16::from_f64(value).to_bits().to_le_bytes()),
        DataType::BF16 => out.copy_from_slice(&bf16::from_f64(value).to_bits().to_le_bytes()),
        DataType::I8 => out[0] = value.round().clamp(i8::MIN as f64, i8::MAX as f64) as i8 as u8,
        DataType::I32 => out.copy_from_slice(
            &(value.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32).to_le_bytes(),
        ),
        DataType::F8 => out[0] = e4m3::from_f32(value as f32).to_bits(),
        DataType::BF8 => out[0] = e5m2::from_f32(value as f32).to_bits(),
        DataType::F8Fnuz => out[0] = e4m3fnuz::from_f32(value as f32).to_bits(),
        DataType::BF8Fnuz => out[0] = e5m2fnuz::from_f32(value as f32).to_bits(),
    }
}

/// Round a value to the nearest value representable by the type.
pub fn round_to(ty: DataType, value: f64) -> f64 {
    let mut bytes = [0u8; 8];
    encode_at(ty, &mut bytes, 0, value);
    decode_one(ty, &bytes[..ty.size()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reverses_encode_for_representable_values() {
        let values = [0.0, 1.0, -2.5, 96.0, 0.125];
        for ty in DataType::ALL_BY_CODE_LEN
            .into_iter()
            .filter(|ty| !ty.is_integer())
        {
            assert_eq!(decode(ty, &encode(ty, &values)), values, "{ty}");
        }
    }

    #[test]
    fn integers_round_and_saturate() {
        assert_eq!(round_to(DataType::I8, 300.0), 127.0);
        assert_eq!(round_to(DataType::I8, -2.6), -3.0);
        assert_eq!(round_to(DataType::I32, 1.4), 1.0);
    }

    #[test]
    fn float8_saturates_to_max() {
        assert_eq!(round_to(DataType::F8Fnuz, 1000.0), 240.0);
        assert_eq!(round_to(DataType::F8Fnuz, 1.0 + 1.0 / 32.0), 1.0);
        assert_eq!(decode_at(DataType::F16, &encode(DataType::F16, &[1.0, 2.0]), 1), Some(2.0));
        assert_eq!(decode_at(DataType::F16, &[0, 0], 1), None);
    }
}
