use gemmtune_runtime::server::{Handle, Kernel, ServerError};
use gemmtune_runtime::storage::ComputeStorage;

use crate::components::DataType;

use super::elem::{decode_at, encode};
use super::host::OperandLayout;

/// Computes the absolute maximum of an operand and writes the derived `f32` scale.
///
/// The scale is `dividend / amax` in divisor mode, `amax / dividend` otherwise, and `1` when the
/// operand is all zeros.
#[derive(new)]
pub struct AmaxScaleKernel {
    input: Handle,
    data_type: DataType,
    layout: OperandLayout,
    scale: Handle,
    divisor: bool,
    dividend: f32,
}

impl AmaxScaleKernel {
    pub fn scale(amax: f64, dividend: f64, divisor: bool) -> f64 {
        if amax == 0.0 {
            return 1.0;
        }
        match divisor {
            true => dividend / amax,
            false => amax / dividend,
        }
    }
}

impl Kernel for AmaxScaleKernel {
    fn name(&self) -> String {
        format!("amax_scale_{}", self.data_type.code())
    }

    fn execute(self: Box<Self>, storage: &mut dyn ComputeStorage) -> Result<(), ServerError> {
        let bytes = storage.read(self.input.storage())?;

        let mut amax = 0.0f64;
        for index in self.layout.indices() {
            let value = decode_at(self.data_type, bytes, index).ok_or_else(|| {
                ServerError::execution(
                    self.name(),
                    format!("Element {index} is out of the input buffer"),
                )
            })?;
            amax = amax.max(value.abs());
        }

        let scale = Self::scale(amax, self.dividend as f64, self.divisor);
        storage.write(self.scale.storage(), 0, &encode(DataType::F32, &[scale]))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_modes() {
        assert_eq!(AmaxScaleKernel::scale(4.0, 240.0, true), 60.0);
        assert_eq!(AmaxScaleKernel::scale(480.0, 240.0, false), 2.0);
        assert_eq!(AmaxScaleKernel::scale(0.0, 240.0, true), 1.0);
    }
}
