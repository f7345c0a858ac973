use std::sync::Arc;

use gemmtune_common::benchmark::{
    Benchmark, BenchmarkComputations, BenchmarkDurations, TimingMethod,
};
use gemmtune_gemm::catalog::KernelCatalog;
use gemmtune_gemm::components::{DataType, GemmError, GemmProblem, Operand};
use gemmtune_gemm::heuristic::{Algo, ExactSolutionTable, GemmPreference, rejections};
use gemmtune_gemm::kernels::elem::decode;
use gemmtune_gemm::kernels::{GemmArgs, approx_eq, reference_gemm, tolerance};
use gemmtune_gemm::{Gemm, GemmInputs};
use gemmtune_runtime::client::ComputeClient;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{
    BenchError, BenchmarkReport, DataInit, KernelOutcome, KernelReport, Measurement,
    ProblemReport, Validation,
};
use crate::config::{BenchmarkConfig, ExpandedGroup, GlobalParameters};

/// Benchmark every problem of the configuration on the client.
///
/// Each problem runs its custom kernels, or the best kernel of the heuristic when the group lists
/// none. Kernels that can't solve a problem on the client's device are reported as rejected.
pub fn run_benchmarks(
    config: &BenchmarkConfig,
    catalog: Arc<KernelCatalog>,
    client: &ComputeClient,
) -> Result<BenchmarkReport, BenchError> {
    let groups = config.validate(&catalog)?;
    let global = &config.global_parameters;
    let inits = Inits::new(global)?;
    let preference = GemmPreference::default().with_max_workspace_bytes(global.workspace_limit());

    let mut report = BenchmarkReport::default();
    let mut seed = 0;

    for group in &groups {
        for problem in &group.problems {
            seed += 1;
            let mut rng = StdRng::seed_from_u64(seed);
            let data = HostData::generate(problem, group, &inits, &mut rng);
            let problem_report =
                run_problem(client, &catalog, group, problem, &data, global, &preference)?;

            log::info!("{problem_report}");
            report.problems.push(problem_report);
        }
    }

    Ok(report)
}

fn run_problem(
    client: &ComputeClient,
    catalog: &Arc<KernelCatalog>,
    group: &ExpandedGroup,
    problem: &GemmProblem,
    data: &HostData,
    global: &GlobalParameters,
    preference: &GemmPreference,
) -> Result<ProblemReport, BenchError> {
    let arch = client.properties().arch.clone();
    let mut report = ProblemReport {
        problem: group.problem,
        group: group.group,
        size: [problem.m, problem.n, problem.batch, problem.k],
        bias: problem.epilogue.bias_type(problem.elems.d),
        activation: problem.epilogue.activation(),
        kernels: Vec::new(),
        rejections: Vec::new(),
    };

    let mut candidates = Vec::new();
    if group.kernels.is_empty() {
        let gemm = Gemm::from_problem(
            client,
            catalog.clone(),
            ExactSolutionTable::installed(),
            problem.clone(),
            data.upload(client)?,
        )?;
        let results = gemm.algo_get_heuristic(1, preference)?;
        candidates.extend(results.into_iter().map(|result| (result.algo, result.workspace_size)));
    } else {
        for name in &group.kernels {
            let Some((index, kernel)) = catalog
                .index_of(name)
                .and_then(|index| catalog.kernel(index).map(|kernel| (index, kernel)))
            else {
                continue;
            };
            let checked = kernel
                .supports(problem, &arch)
                .and_then(|_| kernel.check_workspace(problem, preference.max_workspace_bytes));
            match checked {
                Ok(workspace) => candidates.push((Algo::new(index, name.clone()), workspace)),
                Err(reason) => {
                    if global.print_rejections() {
                        log::warn!("{name} rejected: {reason}");
                    }
                    report
                        .kernels
                        .push(KernelReport::new(name.clone(), KernelOutcome::Rejected(reason)));
                }
            }
        }
    }

    if candidates.is_empty() && group.kernels.is_empty() && global.print_rejections() {
        report.rejections = rejections(problem, catalog, &arch, preference);
    }

    for (algo, workspace) in candidates {
        let measurement = measure(client, catalog, problem, data, global, &algo, workspace)?;
        report
            .kernels
            .push(KernelReport::new(algo.name, KernelOutcome::Measured(measurement)));
    }

    Ok(report)
}

fn measure(
    client: &ComputeClient,
    catalog: &Arc<KernelCatalog>,
    problem: &GemmProblem,
    data: &HostData,
    global: &GlobalParameters,
    algo: &Algo,
    workspace: u64,
) -> Result<Measurement, BenchError> {
    let inputs = data.upload(client)?;
    let d = inputs.d.clone();
    let mut gemm = Gemm::from_problem(client, catalog.clone(), None, problem.clone(), inputs)?;
    let workspace = match workspace {
        0 => None,
        size => Some(client.empty(size as usize).map_err(GemmError::from)?),
    };
    gemm.initialize(algo, workspace)?;

    let benchmark = GemmBenchmark {
        gemm: &gemm,
        name: algo.name.clone(),
        warmups: global.warmups() as usize,
        samples: global.benchmarks() as usize,
        syncs: global.syncs(),
        enqueues: global.enqueues(),
    };
    let durations = benchmark.run()?;
    let calls = global.syncs() * global.enqueues();
    let durations = BenchmarkDurations::new(
        TimingMethod::System,
        durations
            .durations
            .iter()
            .map(|duration| *duration / calls)
            .collect(),
    );
    let computed = BenchmarkComputations::new(&durations);
    let seconds = computed.median.as_secs_f64();
    let gflops = match seconds > 0.0 {
        true => problem.flops() / seconds / 1e9,
        false => 0.0,
    };

    let actual = client.read_one(&d).map_err(GemmError::from)?;
    let validation = validate(problem, data, &actual, global.elements_to_validate());

    Ok(Measurement {
        durations,
        computed,
        gflops,
        validation,
    })
}

fn validate(
    problem: &GemmProblem,
    data: &HostData,
    actual: &[u8],
    elements: Option<usize>,
) -> Validation {
    if elements == Some(0) {
        return Validation::Skipped;
    }

    let ty = problem.elems.d;
    let expected = reference_gemm(problem, &data.a, &data.b, &data.c, &data.d, &data.args);
    let actual = decode(ty, actual);
    let expected = decode(ty, &expected.d);
    let count = elements.unwrap_or(expected.len()).min(expected.len());
    let epsilon = tolerance(ty);

    for index in 0..count {
        let (actual, expected) = (actual.get(index).copied().unwrap_or(f64::NAN), expected[index]);
        if !approx_eq(actual, expected, epsilon) {
            return Validation::Failed {
                index,
                actual,
                expected,
            };
        }
    }

    Validation::Passed { elements: count }
}

/// Runs the kernel `syncs * enqueues` times per sample.
struct GemmBenchmark<'a> {
    gemm: &'a Gemm,
    name: String,
    warmups: usize,
    samples: usize,
    syncs: u32,
    enqueues: u32,
}

impl Benchmark for GemmBenchmark<'_> {
    type Input = ();
    type Output = ();
    type Error = GemmError;

    fn prepare(&self) -> Self::Input {}

    fn execute(&self, _input: Self::Input) -> Result<Self::Output, Self::Error> {
        for _ in 0..self.syncs {
            for _ in 0..self.enqueues {
                self.gemm.run()?;
            }
            self.sync()?;
        }
        Ok(())
    }

    fn num_samples(&self) -> usize {
        self.samples
    }

    fn num_warmups(&self) -> usize {
        self.warmups
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn sync(&self) -> Result<(), Self::Error> {
        Ok(self.gemm.client().sync()?)
    }
}

/// The initialization of every buffer and scalar.
struct Inits {
    a: DataInit,
    b: DataInit,
    c: DataInit,
    d: DataInit,
    alpha: DataInit,
    beta: DataInit,
    bias: DataInit,
    scale_alpha_vec: DataInit,
}

impl Inits {
    fn new(global: &GlobalParameters) -> Result<Self, BenchError> {
        Ok(Self {
            a: DataInit::configured(global.data_init_type_a, DataInit::Random, "A")?,
            b: DataInit::configured(global.data_init_type_b, DataInit::Random, "B")?,
            c: DataInit::configured(global.data_init_type_c, DataInit::Random, "C")?,
            d: DataInit::configured(global.data_init_type_d, DataInit::Zero, "D")?,
            alpha: DataInit::configured(global.data_init_type_alpha, DataInit::Two, "Alpha")?,
            beta: DataInit::configured(global.data_init_type_beta, DataInit::Two, "Beta")?,
            bias: DataInit::configured(global.data_init_type_bias, DataInit::Random, "Bias")?,
            scale_alpha_vec: DataInit::configured(
                global.data_init_type_scale_alpha_vec,
                DataInit::Random,
                "ScaleAlphaVec",
            )?,
        })
    }
}

/// Host content of the buffers of a problem and the arguments of its reference.
struct HostData {
    a: Vec<u8>,
    b: Vec<u8>,
    c: Vec<u8>,
    d: Vec<u8>,
    bias: Option<Vec<u8>>,
    scale_alpha_vec: Option<Vec<u8>>,
    args: GemmArgs,
}

impl HostData {
    fn generate(problem: &GemmProblem, group: &ExpandedGroup, inits: &Inits, rng: &mut StdRng) -> Self {
        let alpha = inits.alpha.scalar(rng) as f32;
        let beta = match group.uses_beta {
            true => inits.beta.scalar(rng) as f32,
            false => 0.0,
        };
        let mut args = GemmArgs::new(alpha as f64, beta as f64);
        args.activation = problem.epilogue.activation();
        args.activation_args = problem.epilogue.args;

        let bias = problem.epilogue.bias_type(problem.elems.d).map(|ty| {
            let bias = inits.bias.vector(ty, problem.m, rng);
            args.bias = Some(decode(ty, &bias));
            bias
        });
        let scale_alpha_vec = problem.scaling.scale_alpha_vec.then(|| {
            let sav = inits.scale_alpha_vec.vector(DataType::F32, problem.m, rng);
            args.scale_alpha_vec = Some(decode(DataType::F32, &sav));
            sav
        });

        Self {
            a: inits.a.operand(problem, Operand::A, rng),
            b: inits.b.operand(problem, Operand::B, rng),
            c: inits.c.operand(problem, Operand::C, rng),
            d: inits.d.operand(problem, Operand::D, rng),
            bias,
            scale_alpha_vec,
            args,
        }
    }

    fn upload(&self, client: &ComputeClient) -> Result<GemmInputs, GemmError> {
        let mut inputs = GemmInputs::new(
            client.create(&self.a)?,
            client.create(&self.b)?,
            client.create(&self.c)?,
            client.create(&self.d)?,
            self.args.alpha as f32,
            self.args.beta as f32,
        );
        if let Some(bias) = &self.bias {
            inputs = inputs.with_bias(client.create(bias)?);
        }
        if let Some(sav) = &self.scale_alpha_vec {
            inputs = inputs.with_scale_alpha_vec(client.create(sav)?);
        }

        Ok(inputs)
    }
}
