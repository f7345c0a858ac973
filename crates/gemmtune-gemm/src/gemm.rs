use std::sync::Arc;

use gemmtune_runtime::client::ComputeClient;
use gemmtune_runtime::config::Logger;
use gemmtune_runtime::config::execution::ExecutionLogLevel;
use gemmtune_runtime::server::Handle;

use crate::catalog::{KernelCatalog, KernelSpec};
use crate::components::{
    ComputeType, DataType, Epilogue, FormattedConfigError, GemmAvailabilityError, GemmElems,
    GemmError, GemmProblem, GemmScaling, Operand, Transpose,
};
use crate::heuristic::{
    Algo, ExactSolutionTable, GemmPreference, HeuristicResult, SelectionTarget, select,
};
use crate::kernels::{AmaxScaleKernel, GemmBindings, GemmKernel, ScaleBinding, ScaleMode};
use crate::kernels::host::OperandLayout;

static LOGGER: spin::Mutex<Option<Logger>> = spin::Mutex::new(None);

fn log_execution(level: ExecutionLogLevel, message: impl FnOnce() -> String) {
    let mut logger = LOGGER.lock();
    let logger = logger.get_or_insert_with(Logger::new);

    let enabled = match logger.log_level_execution() {
        ExecutionLogLevel::Disabled => false,
        ExecutionLogLevel::Basic => level == ExecutionLogLevel::Basic,
        ExecutionLogLevel::Full => true,
    };
    if enabled {
        logger.log_execution(&message());
    }
}

/// Device buffers and scalars of a GEMM.
///
/// `alpha` and `beta` are host scalars. Every scale is a device buffer holding one `f32`, except
/// `scale_alpha_vec` which holds one `f32` per row of `D`.
#[derive(Clone, Debug)]
pub struct GemmInputs {
    pub a: Handle,
    pub b: Handle,
    pub c: Handle,
    pub d: Handle,
    pub alpha: f32,
    pub beta: f32,
    pub scale_a: Option<Handle>,
    pub scale_b: Option<Handle>,
    pub scale_c: Option<Handle>,
    pub scale_d: Option<Handle>,
    pub scale_alpha_vec: Option<Handle>,
    pub bias: Option<Handle>,
    pub amax_d: Option<Handle>,
}

impl GemmInputs {
    pub fn new(a: Handle, b: Handle, c: Handle, d: Handle, alpha: f32, beta: f32) -> Self {
        Self {
            a,
            b,
            c,
            d,
            alpha,
            beta,
            scale_a: None,
            scale_b: None,
            scale_c: None,
            scale_d: None,
            scale_alpha_vec: None,
            bias: None,
            amax_d: None,
        }
    }

    pub fn with_scale_a(mut self, scale: Handle) -> Self {
        self.scale_a = Some(scale);
        self
    }

    pub fn with_scale_b(mut self, scale: Handle) -> Self {
        self.scale_b = Some(scale);
        self
    }

    pub fn with_scale_c(mut self, scale: Handle) -> Self {
        self.scale_c = Some(scale);
        self
    }

    pub fn with_scale_d(mut self, scale: Handle) -> Self {
        self.scale_d = Some(scale);
        self
    }

    pub fn with_scale_alpha_vec(mut self, scale: Handle) -> Self {
        self.scale_alpha_vec = Some(scale);
        self
    }

    pub fn with_bias(mut self, bias: Handle) -> Self {
        self.bias = Some(bias);
        self
    }

    pub fn with_amax_d(mut self, amax: Handle) -> Self {
        self.amax_d = Some(amax);
        self
    }

    /// Scaling features enabled by the bound buffers.
    pub fn scaling(&self) -> GemmScaling {
        GemmScaling {
            scale_ab: self.scale_a.is_some() || self.scale_b.is_some(),
            scale_cd: self.scale_c.is_some() || self.scale_d.is_some(),
            scale_alpha_vec: self.scale_alpha_vec.is_some(),
            amax_d: self.amax_d.is_some(),
        }
    }
}

/// Scale of an input computed from its absolute maximum before the product.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmaxScale {
    /// The scale is `dividend / amax` when set, `amax / dividend` otherwise.
    pub divisor: bool,
    pub dividend: f32,
}

impl AmaxScale {
    fn mode(&self) -> ScaleMode {
        match self.divisor {
            true => ScaleMode::AmaxDivisor,
            false => ScaleMode::AmaxMultiplier,
        }
    }
}

struct Initialized {
    kernel: KernelSpec,
    workspace: Option<Handle>,
}

/// A GEMM bound to a client, following the call sequence of the vendor extension API:
/// `new`, `set_problem`, `algo_get_heuristic`, `initialize`, `run`.
///
/// Changing the problem or the algorithm requires calling [initialize](Gemm::initialize) again.
pub struct Gemm {
    client: ComputeClient,
    catalog: Arc<KernelCatalog>,
    library: Option<Arc<ExactSolutionTable>>,
    trans_a: Transpose,
    trans_b: Transpose,
    elems: GemmElems,
    amax_a: Option<AmaxScale>,
    amax_b: Option<AmaxScale>,
    problem: Option<(GemmProblem, GemmInputs)>,
    initialized: Option<Initialized>,
}

impl Gemm {
    /// Create a GEMM of the given types, selecting from the builtin catalog and the installed
    /// solution library.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: ComputeClient,
        trans_a: Transpose,
        trans_b: Transpose,
        a: DataType,
        b: DataType,
        c: DataType,
        d: DataType,
        compute: ComputeType,
    ) -> Self {
        Self {
            client,
            catalog: KernelCatalog::shared_builtin(),
            library: ExactSolutionTable::installed(),
            trans_a,
            trans_b,
            elems: GemmElems::new(a, b, c, d, compute),
            amax_a: None,
            amax_b: None,
            problem: None,
            initialized: None,
        }
    }

    /// Create a GEMM of the types and transposes of `problem`, and set it.
    pub fn from_problem(
        client: &ComputeClient,
        catalog: Arc<KernelCatalog>,
        library: Option<Arc<ExactSolutionTable>>,
        problem: GemmProblem,
        inputs: GemmInputs,
    ) -> Result<Self, GemmError> {
        let elems = problem.elems;
        let mut gemm = Self::new(
            client.clone(),
            problem.trans_a,
            problem.trans_b,
            elems.a,
            elems.b,
            elems.c,
            elems.d,
            elems.compute,
        )
        .with_catalog(catalog)
        .with_library(library);
        gemm.set_problem_descriptor(problem, inputs)?;

        Ok(gemm)
    }

    pub fn with_catalog(mut self, catalog: Arc<KernelCatalog>) -> Self {
        self.catalog = catalog;
        self.initialized = None;
        self
    }

    pub fn with_library(mut self, library: Option<Arc<ExactSolutionTable>>) -> Self {
        self.library = library;
        self
    }

    pub fn client(&self) -> &ComputeClient {
        &self.client
    }

    /// The problem set with [set_problem](Gemm::set_problem).
    pub fn problem(&self) -> Option<&GemmProblem> {
        self.problem.as_ref().map(|(problem, _)| problem)
    }

    /// The buffers set with the problem.
    pub fn inputs(&self) -> Option<&GemmInputs> {
        self.problem.as_ref().map(|(_, inputs)| inputs)
    }

    /// The kernel bound by [initialize](Gemm::initialize).
    pub fn kernel(&self) -> Option<&KernelSpec> {
        self.initialized.as_ref().map(|init| &init.kernel)
    }

    /// Compute the scale of `A` and `B` from their absolute maximum on every run.
    ///
    /// The scale is written to the `scale_a`/`scale_b` buffer of the inputs, which must then be
    /// provided.
    #[allow(clippy::too_many_arguments)]
    pub fn set_amax_data(
        &mut self,
        amax_scale_a: bool,
        is_scale_amax_divisor_a: bool,
        amax_dividend_a: f32,
        amax_scale_b: bool,
        is_scale_amax_divisor_b: bool,
        amax_dividend_b: f32,
    ) -> Result<(), GemmError> {
        let amax = |enabled: bool, divisor: bool, dividend: f32, name: &'static str| {
            if !enabled {
                return Ok(None);
            }
            match dividend.is_finite() && dividend != 0.0 {
                true => Ok(Some(AmaxScale { divisor, dividend })),
                false => Err(FormattedConfigError::new(move || {
                    format!("Amax dividend of {name} must be finite and non-zero, got {dividend}")
                })),
            }
        };

        self.amax_a = amax(amax_scale_a, is_scale_amax_divisor_a, amax_dividend_a, "A")?;
        self.amax_b = amax(amax_scale_b, is_scale_amax_divisor_b, amax_dividend_b, "B")?;
        self.initialized = None;

        Ok(())
    }

    /// Set a packed problem of the types given at creation.
    pub fn set_problem(
        &mut self,
        m: usize,
        n: usize,
        k: usize,
        batch: usize,
        epilogue: Epilogue,
        inputs: GemmInputs,
    ) -> Result<(), GemmError> {
        let problem = GemmProblem::new(m, n, k, batch, self.trans_a, self.trans_b, self.elems)
            .with_epilogue(epilogue);
        self.set_problem_descriptor(problem, inputs)
    }

    /// Set a problem with explicit leading dimensions and batch strides.
    ///
    /// The scaling features of the problem are derived from the buffers bound in `inputs`.
    pub fn set_problem_descriptor(
        &mut self,
        problem: GemmProblem,
        inputs: GemmInputs,
    ) -> Result<(), GemmError> {
        self.initialized = None;
        self.problem = None;

        let problem = problem.with_scaling(inputs.scaling());
        problem.validate()?;
        self.check_inputs(&problem, &inputs)?;

        self.problem = Some((problem, inputs));
        Ok(())
    }

    fn check_inputs(&self, problem: &GemmProblem, inputs: &GemmInputs) -> Result<(), GemmError> {
        fn check(name: &'static str, handle: &Handle, required: usize) -> Result<(), GemmError> {
            let provided = handle.size();
            match provided >= required as u64 {
                true => Ok(()),
                false => Err(GemmAvailabilityError::BufferTooSmall {
                    name,
                    required: required as u64,
                    provided,
                }
                .into()),
            }
        }
        fn required<'a>(name: &'static str, handle: &'a Option<Handle>) -> Result<&'a Handle, GemmError> {
            handle
                .as_ref()
                .ok_or_else(|| GemmAvailabilityError::MissingBuffer { name }.into())
        }

        check("A", &inputs.a, problem.num_bytes(Operand::A))?;
        check("B", &inputs.b, problem.num_bytes(Operand::B))?;
        if inputs.beta != 0.0 {
            check("C", &inputs.c, problem.num_bytes(Operand::C))?;
        }
        check("D", &inputs.d, problem.num_bytes(Operand::D))?;

        let scalar = DataType::F32.size();
        if self.amax_a.is_some() {
            required("scale_a", &inputs.scale_a)?;
        }
        if self.amax_b.is_some() {
            required("scale_b", &inputs.scale_b)?;
        }
        for (name, scale) in [
            ("scale_a", &inputs.scale_a),
            ("scale_b", &inputs.scale_b),
            ("scale_c", &inputs.scale_c),
            ("scale_d", &inputs.scale_d),
            ("amax_d", &inputs.amax_d),
        ] {
            if let Some(scale) = scale {
                check(name, scale, scalar)?;
            }
        }
        if let Some(sav) = &inputs.scale_alpha_vec {
            check("scale_alpha_vec", sav, problem.m * scalar)?;
        }
        if let Some(bias_type) = problem.epilogue.bias_type(problem.elems.d) {
            let bias = required("bias", &inputs.bias)?;
            check("bias", bias, problem.m * bias_type.size())?;
        }

        Ok(())
    }

    /// Up to `requested` kernels able to solve the problem, best first.
    ///
    /// An empty list means no kernel of the catalog fits the problem and the preference.
    pub fn algo_get_heuristic(
        &self,
        requested: usize,
        preference: &GemmPreference,
    ) -> Result<Vec<HeuristicResult>, GemmError> {
        let (problem, _) = self
            .problem
            .as_ref()
            .ok_or(GemmError::ProblemNotSet("algo_get_heuristic"))?;
        let properties = self.client.properties();
        let target = SelectionTarget::new(&properties.arch, properties.compute_units);

        let results = select(
            problem,
            &self.catalog,
            self.library.as_deref(),
            target,
            preference,
            requested,
        );

        log_execution(ExecutionLogLevel::Full, || {
            format!(
                "Heuristic returned {} kernel(s) for {}x{}x{}x{}",
                results.len(),
                problem.m,
                problem.n,
                problem.k,
                problem.batch
            )
        });

        Ok(results)
    }

    /// Bind the kernel of `algo` and the workspace to the problem.
    ///
    /// Fails when the kernel can't solve the problem or the workspace is too small for it.
    pub fn initialize(&mut self, algo: &Algo, workspace: Option<Handle>) -> Result<(), GemmError> {
        self.initialized = None;
        let (problem, _) = self
            .problem
            .as_ref()
            .ok_or(GemmError::ProblemNotSet("initialize"))?;

        let kernel = self
            .catalog
            .kernel(algo.index)
            .filter(|kernel| kernel.name() == algo.name)
            .or_else(|| self.catalog.get(&algo.name))
            .ok_or_else(|| GemmAvailabilityError::KernelUnknown {
                name: algo.name.clone(),
            })?;

        kernel
            .supports(problem, &self.client.properties().arch)
            .map_err(|reason| GemmAvailabilityError::KernelRejected {
                kernel: algo.name.clone(),
                reason,
            })?;

        let required = kernel.workspace_size(problem);
        let provided = workspace.as_ref().map(|ws| ws.size()).unwrap_or(0);
        if required > provided {
            return Err(GemmAvailabilityError::WorkspaceTooSmall { required, provided }.into());
        }

        self.initialized = Some(Initialized {
            kernel: kernel.clone(),
            workspace,
        });

        Ok(())
    }

    /// Enqueue the GEMM on the client's stream.
    ///
    /// Errors raised while the kernels execute are reported by the next
    /// [sync](ComputeClient::sync).
    pub fn run(&self) -> Result<(), GemmError> {
        let init = self.initialized.as_ref().ok_or(GemmError::NotInitialized)?;
        let (problem, inputs) = self
            .problem
            .as_ref()
            .ok_or(GemmError::ProblemNotSet("run"))?;

        for (operand, amax, input, scale) in [
            (Operand::A, self.amax_a, &inputs.a, &inputs.scale_a),
            (Operand::B, self.amax_b, &inputs.b, &inputs.scale_b),
        ] {
            if let (Some(amax), Some(scale)) = (amax, scale) {
                self.client.launch(Box::new(AmaxScaleKernel::new(
                    input.clone(),
                    problem.data_type(operand),
                    OperandLayout::of(problem, operand),
                    scale.clone(),
                    amax.divisor,
                    amax.dividend,
                )))?;
            }
        }

        let input_scale = |scale: &Option<Handle>, amax: Option<AmaxScale>| {
            scale.as_ref().map(|handle| {
                let mode = amax.map(|amax| amax.mode()).unwrap_or(ScaleMode::Dequant);
                ScaleBinding::new(handle.clone(), mode)
            })
        };
        let bindings = GemmBindings {
            a: inputs.a.clone(),
            b: inputs.b.clone(),
            c: inputs.c.clone(),
            d: inputs.d.clone(),
            scale_a: input_scale(&inputs.scale_a, self.amax_a),
            scale_b: input_scale(&inputs.scale_b, self.amax_b),
            scale_c: inputs.scale_c.clone(),
            scale_d: inputs.scale_d.clone(),
            scale_alpha_vec: inputs.scale_alpha_vec.clone(),
            bias: inputs.bias.clone(),
            amax_d: inputs.amax_d.clone(),
            workspace: init.workspace.clone(),
        };

        self.client.launch(Box::new(GemmKernel::new(
            init.kernel.clone(),
            problem.clone(),
            bindings,
            inputs.alpha,
            inputs.beta,
        )))?;

        log_execution(ExecutionLogLevel::Basic, || {
            format!(
                "{} on {}x{}x{}x{}",
                init.kernel.name(),
                problem.m,
                problem.n,
                problem.k,
                problem.batch
            )
        });

        Ok(())
    }
}
