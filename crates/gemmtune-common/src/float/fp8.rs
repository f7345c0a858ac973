use core::fmt::{Debug, Display};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// An 8-bit floating point type with 4 exponent bits and 3 mantissa bits (OCP `E4M3FN`).
///
/// No infinities, a single NaN encoding per sign and a maximum of `448`.
#[allow(non_camel_case_types)]
#[repr(transparent)]
#[derive(Clone, Copy, Default, Zeroable, Pod, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct e4m3(u8);

/// An 8-bit floating point type with 5 exponent bits and 2 mantissa bits (OCP `E5M2`).
#[allow(non_camel_case_types)]
#[repr(transparent)]
#[derive(Clone, Copy, Default, Zeroable, Pod, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct e5m2(u8);

/// The `fnuz` flavour of [e4m3]: exponent bias of 8, no negative zero, `0x80` is NaN and the
/// maximum is `240`.
#[allow(non_camel_case_types)]
#[repr(transparent)]
#[derive(Clone, Copy, Default, Zeroable, Pod, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct e4m3fnuz(u8);

/// The `fnuz` flavour of [e5m2]: exponent bias of 16, no negative zero and `0x80` is NaN.
#[allow(non_camel_case_types)]
#[repr(transparent)]
#[derive(Clone, Copy, Default, Zeroable, Pod, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct e5m2fnuz(u8);

/// Bit layout of an 8-bit minifloat.
#[derive(Debug, Clone, Copy)]
struct Layout {
    man_bits: u32,
    bias: i32,
    /// Largest finite encoding (positive).
    max_bits: u8,
    /// Encoding of NaN (positive when the format is signed).
    nan_bits: u8,
    fnuz: bool,
    ieee_special: bool,
}

const E4M3: Layout = Layout {
    man_bits: 3,
    bias: 7,
    max_bits: 0x7E,
    nan_bits: 0x7F,
    fnuz: false,
    ieee_special: false,
};

const E5M2: Layout = Layout {
    man_bits: 2,
    bias: 15,
    max_bits: 0x7B,
    nan_bits: 0x7F,
    fnuz: false,
    ieee_special: true,
};

const E4M3_FNUZ: Layout = Layout {
    man_bits: 3,
    bias: 8,
    max_bits: 0x7F,
    nan_bits: 0x80,
    fnuz: true,
    ieee_special: false,
};

const E5M2_FNUZ: Layout = Layout {
    man_bits: 2,
    bias: 16,
    max_bits: 0x7F,
    nan_bits: 0x80,
    fnuz: true,
    ieee_special: false,
};

impl Layout {
    fn decode(&self, bits: u8) -> f32 {
        if self.fnuz && bits == 0x80 {
            return f32::NAN;
        }

        let negative = bits & 0x80 != 0;
        let magnitude = bits & 0x7F;
        let exp = (magnitude >> self.man_bits) as i32;
        let man = (magnitude & ((1 << self.man_bits) - 1)) as i32;
        let exp_max = (0x7F >> self.man_bits) as i32;

        if !self.fnuz {
            if self.ieee_special && exp == exp_max {
                let special = if man == 0 { f32::INFINITY } else { f32::NAN };
                return if negative { -special } else { special };
            }
            if !self.ieee_special && magnitude == self.nan_bits {
                return f32::NAN;
            }
        }

        let value = if exp == 0 {
            man as f32 * pow2(1 - self.bias - self.man_bits as i32)
        } else {
            (1.0 + man as f32 / (1 << self.man_bits) as f32) * pow2(exp - self.bias)
        };

        if negative { -value } else { value }
    }

    /// Round to nearest, ties to even, saturating to the largest finite value.
    fn encode(&self, value: f32) -> u8 {
        if value.is_nan() {
            return self.nan_bits;
        }

        let negative = value.is_sign_negative();
        let abs = value.abs();
        let max = self.decode(self.max_bits);

        let magnitude = if abs >= max {
            self.max_bits
        } else {
            let f32_exp = ((abs.to_bits() >> 23) & 0xFF) as i32;
            let exp = if f32_exp == 0 { -127 } else { f32_exp - 127 };
            let min_normal_exp = 1 - self.bias;

            let bits = if exp < min_normal_exp {
                let quantum = pow2(min_normal_exp - self.man_bits as i32);
                (abs / quantum).round_ties_even() as u32
            } else {
                let quantum = pow2(exp - self.man_bits as i32);
                let mantissa = (abs / quantum).round_ties_even() as u32;
                (((exp + self.bias) as u32) << self.man_bits) + mantissa - (1 << self.man_bits)
            };

            (bits.min(self.max_bits as u32)) as u8
        };

        match (negative, magnitude, self.fnuz) {
            (_, 0, true) => 0,
            (true, magnitude, _) => magnitude | 0x80,
            (false, magnitude, _) => magnitude,
        }
    }
}

fn pow2(exp: i32) -> f32 {
    2f32.powi(exp)
}

macro_rules! minifloat {
    ($name:ident, $layout:expr, $doc_max:literal) => {
        impl $name {
            /// Maximum representable value
            pub const MAX: f64 = $doc_max;
            /// Minimum representable value
            pub const MIN: f64 = -$doc_max;

            /// Constructs a value from the raw bits.
            #[inline]
            #[must_use]
            pub const fn from_bits(bits: u8) -> Self {
                Self(bits)
            }

            /// Converts into the underlying bit representation.
            #[inline]
            #[must_use]
            pub const fn to_bits(self) -> u8 {
                self.0
            }

            /// Constructs a value from a 32-bit float.
            ///
            /// Lossy: rounds to nearest even and saturates out-of-range values, including
            /// infinities, to the largest finite magnitude. NaN is preserved.
            #[inline]
            #[must_use]
            pub fn from_f32(value: f32) -> Self {
                Self($layout.encode(value))
            }

            /// Converts into a 32-bit float. Lossless.
            #[inline]
            #[must_use]
            pub fn to_f32(self) -> f32 {
                $layout.decode(self.0)
            }

            /// Returns true if the value is NaN.
            pub fn is_nan(self) -> bool {
                self.to_f32().is_nan()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.to_f32())
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}({:#04x})", self.to_f32(), self.0)
            }
        }

        impl From<$name> for f32 {
            fn from(value: $name) -> Self {
                value.to_f32()
            }
        }
    };
}

minifloat!(e4m3, E4M3, 448.0);
minifloat!(e5m2, E5M2, 57344.0);
minifloat!(e4m3fnuz, E4M3_FNUZ, 240.0);
minifloat!(e5m2fnuz, E5M2_FNUZ, 57344.0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_values_decode() {
        assert_eq!(e4m3::from_bits(0x7E).to_f32(), 448.0);
        assert_eq!(e5m2::from_bits(0x7B).to_f32(), 57344.0);
        assert_eq!(e4m3fnuz::from_bits(0x7F).to_f32(), 240.0);
        assert_eq!(e5m2fnuz::from_bits(0x7F).to_f32(), 57344.0);
    }

    #[test]
    fn exact_values_survive_conversion() {
        for value in [0.0f32, 1.0, -1.0, 0.5, 1.5, 2.0, -3.0, 0.125, 96.0, 240.0] {
            assert_eq!(e4m3fnuz::from_f32(value).to_f32(), value, "{value}");
            assert_eq!(e4m3::from_f32(value).to_f32(), value, "{value}");
        }
    }

    #[test]
    fn rounds_half_to_even() {
        // 1.0625 lies halfway between 1.0 and 1.125 in e4m3.
        assert_eq!(e4m3::from_f32(1.0625).to_f32(), 1.0);
        // 1.1875 lies halfway between 1.125 and 1.25, 1.25 has the even mantissa.
        assert_eq!(e4m3::from_f32(1.1875).to_f32(), 1.25);
    }

    #[test]
    fn saturates_out_of_range() {
        assert_eq!(e4m3fnuz::from_f32(1000.0).to_f32(), 240.0);
        assert_eq!(e4m3fnuz::from_f32(-1000.0).to_f32(), -240.0);
        assert_eq!(e4m3::from_f32(f32::INFINITY).to_f32(), 448.0);
        assert_eq!(e5m2::from_f32(1e9).to_f32(), 57344.0);
    }

    #[test]
    fn fnuz_has_no_negative_zero() {
        assert_eq!(e4m3fnuz::from_f32(-0.0).to_bits(), 0);
        assert!(e4m3fnuz::from_bits(0x80).is_nan());
        assert!(e4m3fnuz::from_f32(f32::NAN).is_nan());
    }

    #[test]
    fn subnormals_round_trip() {
        let smallest = 2f32.powi(-10);
        assert_eq!(e4m3fnuz::from_f32(smallest).to_f32(), smallest);
        assert_eq!(e4m3fnuz::from_f32(smallest / 4.0).to_f32(), 0.0);
    }

    #[test]
    fn e5m2_keeps_infinity_encoding() {
        assert_eq!(e5m2::from_bits(0x7C).to_f32(), f32::INFINITY);
        assert!(e5m2::from_bits(0x7D).is_nan());
    }
}
