use gemmtune_runtime::server::{Handle, Kernel, ServerError};
use gemmtune_runtime::storage::ComputeStorage;
use rayon::prelude::*;

use crate::catalog::KernelSpec;
use crate::components::{DataType, GemmProblem, Operand};

use super::elem::{decode, decode_at, encode};
use super::epilogue::{GemmArgs, store_output};
use super::host::{Accumulate, HostOperands, load_operands};

/// How the value of a scale buffer is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleMode {
    /// The buffer holds a dequantization factor.
    Dequant,
    /// The buffer holds `dividend / amax`, the input is multiplied by it and the result divided.
    AmaxDivisor,
    /// The buffer holds `amax / dividend`, the input is divided by it and the result multiplied.
    AmaxMultiplier,
}

/// A scalar `f32` scale buffer.
#[derive(new, Clone, Debug)]
pub struct ScaleBinding {
    pub handle: Handle,
    pub mode: ScaleMode,
}

/// Device buffers a GEMM kernel reads and writes.
#[derive(Clone, Debug)]
pub struct GemmBindings {
    pub a: Handle,
    pub b: Handle,
    pub c: Handle,
    pub d: Handle,
    pub scale_a: Option<ScaleBinding>,
    pub scale_b: Option<ScaleBinding>,
    pub scale_c: Option<Handle>,
    pub scale_d: Option<Handle>,
    /// `f32` per row of `D`.
    pub scale_alpha_vec: Option<Handle>,
    pub bias: Option<Handle>,
    /// Receives the `f32` absolute maximum of `D`.
    pub amax_d: Option<Handle>,
    pub workspace: Option<Handle>,
}

/// GEMM executed tile by tile following the static tiling of a catalog kernel.
///
/// Each workgroup computes a `MT m x MT n` tile of one batch, walking `k` by `depth U` steps.
/// With a global split `GSU > 1`, `k` is split into `GSU` ranges whose partial sums are written
/// to the workspace, then reduced in order before the epilogue.
#[derive(new)]
pub struct GemmKernel {
    kernel: KernelSpec,
    problem: GemmProblem,
    bindings: GemmBindings,
    alpha: f32,
    beta: f32,
}

impl Kernel for GemmKernel {
    fn name(&self) -> String {
        self.kernel.name()
    }

    fn execute(self: Box<Self>, storage: &mut dyn ComputeStorage) -> Result<(), ServerError> {
        let args = self.args(storage)?;

        let acc = match self.problem.elems.compute.data_type() {
            DataType::F64 => self.accumulate::<f64>(storage, &args)?,
            DataType::I32 => self.accumulate::<i32>(storage, &args)?,
            _ => self.accumulate::<f32>(storage, &args)?,
        };

        let problem = &self.problem;
        let c = match args.beta != 0.0 {
            true => decode(
                problem.elems.c,
                self.read(storage, &self.bindings.c, problem.num_bytes(Operand::C), "C")?,
            ),
            false => Vec::new(),
        };
        let mut d = self
            .read(storage, &self.bindings.d, problem.num_bytes(Operand::D), "D")?
            .to_vec();

        let amax = store_output(problem, &args, &acc, &c, &mut d);
        storage.write(self.bindings.d.storage(), 0, &d)?;

        if let Some(amax_d) = &self.bindings.amax_d {
            storage.write(amax_d.storage(), 0, &encode(DataType::F32, &[amax]))?;
        }

        Ok(())
    }
}

impl GemmKernel {
    fn error(&self, reason: String) -> ServerError {
        ServerError::execution(self.kernel.name(), reason)
    }

    fn read<'a>(
        &self,
        storage: &'a dyn ComputeStorage,
        handle: &Handle,
        len: usize,
        name: &str,
    ) -> Result<&'a [u8], ServerError> {
        let bytes = storage.read(handle.storage())?;
        match bytes.len() >= len {
            true => Ok(bytes),
            false => Err(self.error(format!(
                "Buffer {name} holds {} bytes, {len} bytes are required",
                bytes.len()
            ))),
        }
    }

    fn scalar(&self, storage: &dyn ComputeStorage, handle: &Handle, name: &str) -> Result<f64, ServerError> {
        let bytes = self.read(storage, handle, DataType::F32.size(), name)?;
        decode_at(DataType::F32, bytes, 0)
            .ok_or_else(|| self.error(format!("Scale {name} is empty")))
    }

    fn vector(
        &self,
        storage: &dyn ComputeStorage,
        handle: &Handle,
        ty: DataType,
        name: &str,
    ) -> Result<Vec<f64>, ServerError> {
        let len = self.problem.m * ty.size();
        let bytes = self.read(storage, handle, len, name)?;
        Ok(decode(ty, &bytes[..len]))
    }

    /// `(quant, dequant)` factors of an input.
    fn input_scale(
        &self,
        storage: &dyn ComputeStorage,
        binding: Option<&ScaleBinding>,
        name: &str,
    ) -> Result<(f64, f64), ServerError> {
        let Some(binding) = binding else {
            return Ok((1.0, 1.0));
        };
        let value = self.scalar(storage, &binding.handle, name)?;

        Ok(match binding.mode {
            ScaleMode::Dequant => (1.0, value),
            ScaleMode::AmaxDivisor => (value, recip_or_one(value)),
            ScaleMode::AmaxMultiplier => (recip_or_one(value), value),
        })
    }

    fn args(&self, storage: &dyn ComputeStorage) -> Result<GemmArgs, ServerError> {
        let bindings = &self.bindings;
        let epilogue = &self.problem.epilogue;
        let mut args = GemmArgs::new(self.alpha as f64, self.beta as f64);

        (args.quant_a, args.scale_a) =
            self.input_scale(storage, bindings.scale_a.as_ref(), "scale_a")?;
        (args.quant_b, args.scale_b) =
            self.input_scale(storage, bindings.scale_b.as_ref(), "scale_b")?;
        if let Some(scale_c) = &bindings.scale_c {
            args.scale_c = self.scalar(storage, scale_c, "scale_c")?;
        }
        if let Some(scale_d) = &bindings.scale_d {
            args.scale_d = self.scalar(storage, scale_d, "scale_d")?;
        }
        if let Some(sav) = &bindings.scale_alpha_vec {
            args.scale_alpha_vec =
                Some(self.vector(storage, sav, DataType::F32, "scale_alpha_vec")?);
        }
        if let Some(bias_type) = epilogue.bias_type(self.problem.elems.d) {
            let bias = bindings
                .bias
                .as_ref()
                .ok_or_else(|| self.error("Bias buffer is required".to_string()))?;
            args.bias = Some(self.vector(storage, bias, bias_type, "bias")?);
        }
        args.activation = epilogue.activation();
        args.activation_args = epilogue.args;

        Ok(args)
    }

    fn accumulate<A: Accumulate>(
        &self,
        storage: &mut dyn ComputeStorage,
        args: &GemmArgs,
    ) -> Result<Vec<f64>, ServerError> {
        let problem = &self.problem;
        let operands = {
            let a = self.read(storage, &self.bindings.a, problem.num_bytes(Operand::A), "A")?;
            let b = self.read(storage, &self.bindings.b, problem.num_bytes(Operand::B), "B")?;
            load_operands::<A>(problem, a, b, args.quant_a, args.quant_b)
        };

        let partials = partial_sums(&self.kernel, problem, &operands);
        let splits = self.kernel.global_split_u.max(1) as usize;
        if splits == 1 {
            return Ok(partials.into_iter().flatten().map(A::to_f64).collect());
        }

        let workspace = self
            .bindings
            .workspace
            .as_ref()
            .ok_or_else(|| self.error("Split kernels require a workspace".to_string()))?;
        let required = self.kernel.workspace_size(problem) as usize;
        let mut offset = 0;
        for partial in &partials {
            let bytes: &[u8] = bytemuck::cast_slice(partial);
            storage.write(workspace.storage(), offset, bytes)?;
            offset += bytes.len() as u64;
        }

        let bytes = self.read(storage, workspace, required, "workspace")?;
        let values: Vec<A> = bytemuck::pod_collect_to_vec(&bytes[..required]);
        let size = problem.m * problem.n;

        let mut out = Vec::with_capacity(problem.batch * size);
        for batch in 0..problem.batch {
            for index in 0..size {
                let mut sum = A::default();
                for split in 0..splits {
                    sum = sum.add(values[(batch * splits + split) * size + index]);
                }
                out.push(sum.to_f64());
            }
        }

        Ok(out)
    }
}

fn recip_or_one(value: f64) -> f64 {
    match value {
        0.0 => 1.0,
        value => 1.0 / value,
    }
}

/// Order in which output tiles are assigned to workgroups: `wgm` tile rows are walked together
/// column by column.
pub(crate) fn tile_order(tiles_m: usize, tiles_n: usize, wgm: usize) -> Vec<(usize, usize)> {
    let wgm = wgm.max(1);
    let mut order = Vec::with_capacity(tiles_m * tiles_n);

    for group in (0..tiles_m).step_by(wgm) {
        for tile_n in 0..tiles_n {
            for tile_m in group..(group + wgm).min(tiles_m) {
                order.push((tile_m, tile_n));
            }
        }
    }

    order
}

/// Partial sums of every `(batch, split)`, each holding `m x n` values row by row.
fn partial_sums<A: Accumulate>(
    kernel: &KernelSpec,
    problem: &GemmProblem,
    operands: &HostOperands<A>,
) -> Vec<Vec<A>> {
    let (m, n, k) = (problem.m, problem.n, problem.k);
    let mt_m = kernel.tile.m.max(1) as usize;
    let mt_n = kernel.tile.n.max(1) as usize;
    let splits = kernel.global_split_u.max(1) as usize;
    let k_per_split = k.div_ceil(splits);
    let tiles = tile_order(
        m.div_ceil(mt_m),
        n.div_ceil(mt_n),
        kernel.workgroup_mapping as usize,
    );

    (0..problem.batch * splits)
        .into_par_iter()
        .map(|index| {
            let (batch, split) = (index / splits, index % splits);
            let k_start = (split * k_per_split).min(k);
            let k_end = ((split + 1) * k_per_split).min(k);

            let computed: Vec<_> = tiles
                .par_iter()
                .map(|&(tile_m, tile_n)| {
                    let rows = tile_m * mt_m..((tile_m + 1) * mt_m).min(m);
                    let cols = tile_n * mt_n..((tile_n + 1) * mt_n).min(n);
                    let tile = compute_tile(
                        kernel,
                        problem,
                        operands,
                        batch,
                        rows.clone(),
                        cols.clone(),
                        k_start..k_end,
                    );
                    (rows, cols, tile)
                })
                .collect();

            let mut out = vec![A::default(); m * n];
            for (rows, cols, tile) in computed {
                let width = cols.len();
                for (ii, i) in rows.enumerate() {
                    for (jj, j) in cols.clone().enumerate() {
                        out[i * n + j] = tile[ii * width + jj];
                    }
                }
            }
            out
        })
        .collect()
}

fn compute_tile<A: Accumulate>(
    kernel: &KernelSpec,
    problem: &GemmProblem,
    operands: &HostOperands<A>,
    batch: usize,
    rows: core::ops::Range<usize>,
    cols: core::ops::Range<usize>,
    depth: core::ops::Range<usize>,
) -> Vec<A> {
    let (m, n, k) = (problem.m, problem.n, problem.k);
    let depth_u = kernel.tile.depth_u.max(1) as usize;
    let width = cols.len();
    let mut acc = vec![A::default(); rows.len() * width];

    let mut l0 = depth.start;
    while l0 < depth.end {
        let l1 = (l0 + depth_u).min(depth.end);

        for (ii, i) in rows.clone().enumerate() {
            let row = &operands.a[(batch * m + i) * k + l0..(batch * m + i) * k + l1];
            for (jj, j) in cols.clone().enumerate() {
                let col = &operands.bt[(batch * n + j) * k + l0..(batch * n + j) * k + l1];
                let mut sum = A::default();
                for (x, y) in row.iter().zip(col) {
                    sum = sum.fma(*x, *y);
                }
                acc[ii * width + jj] = acc[ii * width + jj].add(sum);
            }
        }

        l0 = l1;
    }

    acc
}
