use core::fmt::Display;

use gemmtune_gemm::Gemm;
use gemmtune_gemm::GemmInputs;
use gemmtune_gemm::components::{ComputeType, DataType, Epilogue, GemmError, Transpose};
use gemmtune_gemm::heuristic::GemmPreference;
use gemmtune_gemm::kernels::elem::encode;
use gemmtune_runtime::client::ComputeClient;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Largest finite value of the float8 type of `A`, which the amax of `B` is scaled to.
const FLOAT8_MAX: f32 = 240.0;

/// Sizes and scalars of the float8 `A` times f16 `B` GEMM.
#[derive(Clone, Debug)]
pub struct SampleArgs {
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub batch: usize,
    pub alpha: f32,
    pub beta: f32,
    pub workspace_bytes: u64,
    pub seed: u64,
}

impl Default for SampleArgs {
    fn default() -> Self {
        Self {
            m: 2048,
            n: 2048,
            k: 2048,
            batch: 1,
            alpha: 1.0,
            beta: 1.0,
            workspace_bytes: 32 * 1024 * 1024,
            seed: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SampleOutcome {
    /// The heuristic found no kernel for the problem on the device.
    NoSolution,
    Solved {
        kernel: String,
        /// Scale computed for `B` from its amax.
        scale_b: f32,
    },
}

impl Display for SampleOutcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SampleOutcome::NoSolution => f.write_str("No valid solution found!"),
            SampleOutcome::Solved { kernel, scale_b } => {
                write!(f, "Solved with {kernel}, scale of B {scale_b}")
            }
        }
    }
}

/// Run `D = alpha * A * (scale_b * B) + beta * C` with `A` in float8, `B`, `C` and `D` in f16 and
/// f32 accumulation, where the scale of `B` is computed on the device from the amax of `B`.
///
/// The best kernel of the heuristic is used, with a workspace of `workspace_bytes`.
pub fn run_sample(client: &ComputeClient, args: &SampleArgs) -> Result<SampleOutcome, GemmError> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let SampleArgs { m, n, k, batch, .. } = *args;

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

    let mut random = |ty: DataType, len: usize| {
        let values: Vec<f64> = (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect();
        encode(ty, &values)
    };
    let a = client.create(&random(DataType::F8Fnuz, m * k * batch))?;
    let b = client.create(&random(DataType::F16, k * n * batch))?;
    let c = client.create(&random(DataType::F16, m * n * batch))?;
    let d = client.empty(m * n * batch * DataType::F16.size())?;
    let scale_b = client.empty(size_of::<f32>())?;

    gemm.set_amax_data(false, false, 0.0, true, true, FLOAT8_MAX)?;
    let inputs = GemmInputs::new(a, b, c, d, args.alpha, args.beta).with_scale_b(scale_b.clone());
    gemm.set_problem(m, n, k, batch, Epilogue::default(), inputs)?;

    let preference = GemmPreference::default().with_max_workspace_bytes(args.workspace_bytes);
    let Some(result) = gemm.algo_get_heuristic(1, &preference)?.into_iter().next() else {
        log::warn!("No valid solution found!");
        return Ok(SampleOutcome::NoSolution);
    };

    let workspace = client.empty(args.workspace_bytes as usize)?;
    gemm.initialize(&result.algo, Some(workspace))?;
    gemm.run()?;
    client.sync()?;

    let scale = client.read_as::<f32>(&scale_b)?;
    Ok(SampleOutcome::Solved {
        kernel: result.algo.name,
        scale_b: scale.first().copied().unwrap_or_default(),
    })
}
