use crate::components::{DataType, Transpose};

use super::{KernelSpec, MacroTile, MatrixInstruction};

/// Input and output types of a family of kernels: `(a, b, d, compute)`.
type TypeConfig = (DataType, DataType, DataType, DataType);

/// `(MT m, MT n, depth U, MI m x n, GSU, WGM)`
type TileConfig = (u32, u32, u32, u32, u32, u32);

const TILES: [TileConfig; 5] = [
    (64, 64, 32, 16, 1, 4),
    (128, 64, 32, 16, 1, 4),
    (128, 128, 64, 32, 1, 8),
    (256, 128, 64, 32, 1, 8),
    (64, 64, 128, 16, 4, 1),
];

const COMMON_TYPES: [TypeConfig; 4] = [
    (DataType::F32, DataType::F32, DataType::F32, DataType::F32),
    (DataType::F16, DataType::F16, DataType::F16, DataType::F32),
    (DataType::BF16, DataType::BF16, DataType::BF16, DataType::F32),
    (DataType::I8, DataType::I8, DataType::I32, DataType::I32),
];

const FLOAT8_TYPES: [TypeConfig; 3] = [
    (DataType::F8Fnuz, DataType::F8Fnuz, DataType::F16, DataType::F32),
    (DataType::F8Fnuz, DataType::F16, DataType::F16, DataType::F32),
    (DataType::F16, DataType::F8Fnuz, DataType::F16, DataType::F32),
];

/// Every kernel of the builtin catalog, in catalog order.
pub(crate) fn builtin_kernels() -> Vec<KernelSpec> {
    let mut kernels = Vec::new();

    for (arch, float8) in [("gfx90a", false), ("gfx942", true)] {
        let types = COMMON_TYPES
            .iter()
            .chain(FLOAT8_TYPES.iter().filter(|_| float8));

        for &types in types {
            for trans_a in Transpose::ALL {
                for trans_b in Transpose::ALL {
                    for tile in TILES {
                        kernels.push(kernel(arch, types, trans_a, trans_b, tile));
                    }
                }
            }
        }
    }

    kernels
}

fn kernel(
    arch: &str,
    (a, b, d, compute): TypeConfig,
    trans_a: Transpose,
    trans_b: Transpose,
    (mt_m, mt_n, depth_u, mi, gsu, wgm): TileConfig,
) -> KernelSpec {
    // Narrower inputs pack more elements along k in one instruction.
    let mi_k = match (mi, a.size().min(b.size())) {
        (16, 4) => 4,
        (16, 2) => 16,
        (16, _) => 32,
        (_, 4) => 2,
        (_, 2) => 8,
        _ => 16,
    };

    let mut kernel = KernelSpec::new(
        trans_a,
        trans_b,
        a,
        b,
        d,
        compute,
        MacroTile::new(mt_m, mt_n, depth_u),
        MatrixInstruction::new(mi, mi, mi_k),
        arch,
    )
    .with_global_split_u(gsu)
    .with_workgroup_mapping(wgm);

    if a.is_float8() || b.is_float8() {
        kernel = kernel.with_scale_ab();
    }

    if gsu == 1 && !d.is_integer() {
        let bias = match d {
            DataType::F32 => vec![DataType::F32],
            d => vec![d, DataType::F32],
        };
        kernel = kernel
            .with_bias(bias)
            .with_activation()
            .with_scale_alpha_vec();
    }

    kernel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float8_kernels_only_on_gfx942() {
        let kernels = builtin_kernels();

        assert!(
            kernels
                .iter()
                .filter(|kernel| kernel.a.is_float8() || kernel.b.is_float8())
                .all(|kernel| kernel.arch == "gfx942" && kernel.scale_ab)
        );
        assert_eq!(kernels.len(), (4 + 7) * 4 * TILES.len());
    }

    #[test]
    fn split_kernels_have_no_epilogue_features() {
        for kernel in builtin_kernels().iter().filter(|k| k.global_split_u > 1) {
            assert!(kernel.bias_types.is_empty());
            assert!(!kernel.activation);
            assert!(!kernel.scale_alpha_vec);
        }
    }
}
