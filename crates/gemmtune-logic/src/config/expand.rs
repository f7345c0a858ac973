use std::path::Path;

use gemmtune_gemm::catalog::KernelCatalog;
use gemmtune_gemm::components::{Epilogue, GemmProblem, GemmScaling, Operand};
use gemmtune_gemm::heuristic::ExactSize;

use super::{ActivationSetting, BenchmarkConfig, BenchmarkGroup, ConfigError, ProblemType};

/// The concrete problems of one group of a benchmark problem.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpandedGroup {
    /// Position of the problem in `BenchmarkProblems`.
    pub problem: usize,
    /// Position of the group after the problem type.
    pub group: usize,
    /// Kernels to benchmark, the heuristic choice when empty.
    pub kernels: Vec<String>,
    /// Every size crossed with every bias type and activation.
    pub problems: Vec<GemmProblem>,
    /// Whether `C` is read.
    pub uses_beta: bool,
}

impl BenchmarkConfig {
    /// Parse a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load the configuration file at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Every problem of the configuration, grouped as declared.
    ///
    /// Sizes are checked against the problem type, kernels aren't.
    pub fn expand(&self) -> Result<Vec<ExpandedGroup>, ConfigError> {
        let mut expanded = Vec::new();

        for (index, problem) in self.benchmark_problems.iter().enumerate() {
            let problem_type = &problem.problem_type;
            if !problem_type.operation_type.eq_ignore_ascii_case("gemm") {
                return Err(ConfigError::UnsupportedOperation {
                    problem: index,
                    operation: problem_type.operation_type.clone(),
                });
            }

            for (group_index, group) in problem.groups.iter().enumerate() {
                expanded.push(ExpandedGroup {
                    problem: index,
                    group: group_index,
                    kernels: group.custom_kernels.clone(),
                    problems: expand_group(index, problem_type, group)?,
                    uses_beta: problem_type.uses_beta(),
                });
            }
        }

        Ok(expanded)
    }

    /// Expand the configuration and check that every custom kernel exists in the catalog and
    /// can solve every problem of its group.
    ///
    /// Kernels are checked on the architecture of `LibraryLogic` when given, on their own
    /// architecture otherwise.
    pub fn validate(&self, catalog: &KernelCatalog) -> Result<Vec<ExpandedGroup>, ConfigError> {
        let expanded = self.expand()?;
        let arch = self
            .library_logic
            .as_ref()
            .and_then(|logic| logic.architecture_name.as_deref());

        for group in &expanded {
            for name in &group.kernels {
                let kernel = catalog.get(name).ok_or_else(|| ConfigError::UnknownKernel {
                    kernel: name.clone(),
                })?;
                let arch = arch.unwrap_or(&kernel.arch);

                for problem in &group.problems {
                    kernel
                        .supports(problem, arch)
                        .map_err(|reason| ConfigError::KernelRejected {
                            kernel: name.clone(),
                            m: problem.m,
                            n: problem.n,
                            batch: problem.batch,
                            k: problem.k,
                            reason,
                        })?;
                }
            }
        }

        Ok(expanded)
    }
}

fn expand_group(
    index: usize,
    problem_type: &ProblemType,
    group: &BenchmarkGroup,
) -> Result<Vec<GemmProblem>, ConfigError> {
    let elems = problem_type
        .elems()
        .map_err(|field| ConfigError::MissingField {
            problem: index,
            field,
        })?;

    let bias_types = match problem_type.uses_bias() {
        true => {
            let types = match group.bias_type_args() {
                Some(types) => types.to_vec(),
                None => problem_type.bias_data_type_list.clone(),
            };
            match types.is_empty() {
                true => vec![Some(elems.d)],
                false => types.into_iter().map(Some).collect(),
            }
        }
        false => vec![None],
    };
    let activations = group
        .activation_args()
        .unwrap_or_else(|| vec![ActivationSetting::default()]);
    let scaling = GemmScaling {
        scale_alpha_vec: problem_type.uses_scale_alpha_vec(),
        ..Default::default()
    };

    let mut problems = Vec::new();
    for size in group.problem_sizes() {
        for size in size.expand()? {
            check_size(problem_type, size)?;
            let [m, n, batch, k] = size;

            for bias in &bias_types {
                for setting in &activations {
                    let epilogue = Epilogue::new(*bias, setting.activation).with_args(setting.args);
                    let problem = GemmProblem::new(
                        m,
                        n,
                        k,
                        batch,
                        problem_type.trans_a(),
                        problem_type.trans_b(),
                        elems,
                    )
                    .with_epilogue(epilogue)
                    .with_scaling(scaling);
                    check_buffers(&problem, size)?;
                    problems.push(problem);
                }
            }
        }
    }

    Ok(problems)
}

fn check_buffers(problem: &GemmProblem, size: ExactSize) -> Result<(), ConfigError> {
    for operand in [Operand::A, Operand::B, Operand::C, Operand::D] {
        if problem.checked_num_bytes(operand).is_none() {
            return Err(ConfigError::InvalidSize {
                size: format!("{size:?}"),
                reason: format!("{operand:?} is larger than the address space"),
            });
        }
    }

    Ok(())
}

fn check_size(problem_type: &ProblemType, size: ExactSize) -> Result<(), ConfigError> {
    let [m, n, batch, k] = size;
    let invalid = |reason: &str| ConfigError::InvalidSize {
        size: format!("{size:?}"),
        reason: reason.to_string(),
    };

    if m == 0 || n == 0 || k == 0 {
        return Err(invalid("m, n and k must be positive"));
    }
    if batch == 0 {
        return Err(invalid("batch must be at least 1"));
    }
    if batch > 1 && !problem_type.is_batched() {
        return Err(invalid("batch must be 1 when the problem isn't batched"));
    }

    let integer_inputs = [problem_type.data_type_a, problem_type.data_type_b, problem_type.data_type]
        .into_iter()
        .flatten()
        .any(|ty| ty.is_integer());
    if integer_inputs && k % 4 != 0 {
        return Err(invalid("k must be a multiple of 4 for int8 inputs"));
    }

    Ok(())
}
