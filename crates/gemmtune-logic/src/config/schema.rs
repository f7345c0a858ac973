use std::collections::BTreeMap;

use gemmtune_gemm::components::{
    Activation, ActivationArgs, ComputeType, DataType, GemmElems, Transpose,
};
use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;

use super::ProblemSize;

/// Keys of a mapping that aren't part of the schema, kept as parsed.
pub type Extra = BTreeMap<String, Value>;

/// A benchmark configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BenchmarkConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_parameters: Option<TestParameters>,
    pub global_parameters: GlobalParameters,
    pub benchmark_problems: Vec<BenchmarkProblem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_logic: Option<LibraryLogic>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Parameters of the test runner.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestParameters {
    /// Test marks, such as the architectures to skip.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A boolean written either as `true`/`false` or as `1`/`0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Int(u8),
}

impl Flag {
    pub fn is_set(&self) -> bool {
        match self {
            Flag::Bool(value) => *value,
            Flag::Int(value) => *value != 0,
        }
    }
}

fn is_set(flag: &Option<Flag>) -> bool {
    flag.as_ref().is_some_and(Flag::is_set)
}

/// Knobs shared by every benchmark of the configuration.
///
/// Only the knobs used by the harness are typed; every other one is kept in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GlobalParameters {
    /// Number of elements of `D` compared with the reference, `-1` for all of them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_elements_to_validate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_benchmarks: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_warmups: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syncs_per_benchmark: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enqueues_per_sync: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_init_type_a: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_init_type_b: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_init_type_c: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_init_type_d: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_init_type_alpha: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_init_type_beta: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_init_type_bias: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_init_type_scale_alpha_vec: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub print_solution_rejection_reason: Option<Flag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workspace_size: Option<u64>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl GlobalParameters {
    /// Number of elements to validate, `None` meaning every element.
    pub fn elements_to_validate(&self) -> Option<usize> {
        match self.num_elements_to_validate {
            Some(count) if count >= 0 => Some(count as usize),
            Some(_) => None,
            None => Some(0),
        }
    }

    pub fn benchmarks(&self) -> u32 {
        self.num_benchmarks.unwrap_or(1).max(1)
    }

    pub fn warmups(&self) -> u32 {
        self.num_warmups.unwrap_or(0)
    }

    pub fn syncs(&self) -> u32 {
        self.syncs_per_benchmark.unwrap_or(1).max(1)
    }

    pub fn enqueues(&self) -> u32 {
        self.enqueues_per_sync.unwrap_or(1).max(1)
    }

    pub fn print_rejections(&self) -> bool {
        is_set(&self.print_solution_rejection_reason)
    }

    /// Largest workspace a kernel may use, 32 MiB unless configured.
    pub fn workspace_limit(&self) -> u64 {
        self.max_workspace_size.unwrap_or(32 * 1024 * 1024)
    }
}

/// The types, transposes and epilogue shared by every size of a problem.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProblemType {
    pub operation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
    #[serde(rename = "DataTypeA", skip_serializing_if = "Option::is_none")]
    pub data_type_a: Option<DataType>,
    #[serde(rename = "DataTypeB", skip_serializing_if = "Option::is_none")]
    pub data_type_b: Option<DataType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_data_type: Option<DataType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_data_type: Option<DataType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_precision_accumulate: Option<Flag>,
    #[serde(rename = "TransposeA", skip_serializing_if = "Option::is_none")]
    pub transpose_a: Option<Flag>,
    #[serde(rename = "TransposeB", skip_serializing_if = "Option::is_none")]
    pub transpose_b: Option<Flag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_beta: Option<Flag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batched: Option<Flag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_bias: Option<Flag>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bias_data_type_list: Vec<DataType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation: Option<Flag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_scale_alpha_vec: Option<Flag>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ProblemType {
    /// The element types, or the name of the missing type field.
    pub fn elems(&self) -> Result<GemmElems, &'static str> {
        let a = self
            .data_type_a
            .or(self.data_type)
            .ok_or("DataTypeA")?;
        let b = self
            .data_type_b
            .or(self.data_type)
            .ok_or("DataTypeB")?;
        let d = self
            .dest_data_type
            .or(self.data_type)
            .ok_or("DestDataType")?;
        let compute = match self.compute_data_type {
            Some(compute) => ComputeType::from(compute),
            None => ComputeType::from(self.data_type.unwrap_or(a)),
        };

        Ok(GemmElems::new(a, b, d, d, compute))
    }

    pub fn trans_a(&self) -> Transpose {
        is_set(&self.transpose_a).into()
    }

    pub fn trans_b(&self) -> Transpose {
        is_set(&self.transpose_b).into()
    }

    pub fn is_batched(&self) -> bool {
        is_set(&self.batched)
    }

    /// `C` is read unless `UseBeta` is explicitly disabled.
    pub fn uses_beta(&self) -> bool {
        self.use_beta.as_ref().is_none_or(Flag::is_set)
    }

    pub fn uses_bias(&self) -> bool {
        is_set(&self.use_bias)
    }

    pub fn uses_activation(&self) -> bool {
        is_set(&self.activation)
    }

    pub fn uses_scale_alpha_vec(&self) -> bool {
        is_set(&self.use_scale_alpha_vec)
    }
}

/// A problem type followed by the groups of sizes benchmarked for it.
///
/// Written as a sequence whose first element is the problem type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BenchmarkProblem {
    pub problem_type: ProblemType,
    pub groups: Vec<BenchmarkGroup>,
}

impl Serialize for BenchmarkProblem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.groups.len() + 1))?;
        seq.serialize_element(&self.problem_type)?;
        for group in &self.groups {
            seq.serialize_element(group)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for BenchmarkProblem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut values = Vec::<Value>::deserialize(deserializer)?.into_iter();
        let problem_type = values
            .next()
            .ok_or_else(|| D::Error::custom("a benchmark problem starts with its ProblemType"))?;
        let problem_type = serde_yaml::from_value(problem_type).map_err(D::Error::custom)?;
        let groups = values
            .map(serde_yaml::from_value)
            .collect::<Result<_, _>>()
            .map_err(D::Error::custom)?;

        Ok(Self {
            problem_type,
            groups,
        })
    }
}

/// Kernels benchmarked on a set of sizes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BenchmarkGroup {
    /// Names of the kernels to benchmark, the heuristic choice when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_kernels: Vec<String>,
    #[serde(
        with = "serde_yaml::with::singleton_map_recursive",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub benchmark_final_parameters: Vec<FinalParameter>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl BenchmarkGroup {
    /// Every size of the group, in order.
    pub fn problem_sizes(&self) -> impl Iterator<Item = &ProblemSize> {
        self.benchmark_final_parameters
            .iter()
            .filter_map(|param| match param {
                FinalParameter::ProblemSizes(sizes) => Some(sizes.iter()),
                _ => None,
            })
            .flatten()
    }

    /// Bias types listed in `BiasTypeArgs`, if any.
    pub fn bias_type_args(&self) -> Option<&[DataType]> {
        self.benchmark_final_parameters
            .iter()
            .find_map(|param| match param {
                FinalParameter::BiasTypeArgs(types) => Some(types.as_slice()),
                _ => None,
            })
    }

    /// Activations listed in `ActivationArgs`, if any.
    pub fn activation_args(&self) -> Option<Vec<ActivationSetting>> {
        self.benchmark_final_parameters
            .iter()
            .find_map(|param| match param {
                FinalParameter::ActivationArgs(args) => {
                    Some(args.iter().map(|items| ActivationSetting::from_items(items)).collect())
                }
                _ => None,
            })
    }
}

/// A list of values the benchmarks iterate over.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FinalParameter {
    ProblemSizes(Vec<ProblemSize>),
    BiasTypeArgs(Vec<DataType>),
    /// One entry per activation, each a list of `Enum`, `Arg0` and `Arg1` items.
    ActivationArgs(Vec<Vec<ActivationArgItem>>),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ActivationArgItem {
    Enum(Activation),
    Arg0(f32),
    Arg1(f32),
}

/// An activation with its arguments.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ActivationSetting {
    pub activation: Activation,
    pub args: ActivationArgs,
}

impl ActivationSetting {
    fn from_items(items: &[ActivationArgItem]) -> Self {
        items
            .iter()
            .fold(Self::default(), |mut setting, item| {
                match item {
                    ActivationArgItem::Enum(activation) => setting.activation = *activation,
                    ActivationArgItem::Arg0(alpha) => setting.args.alpha = *alpha,
                    ActivationArgItem::Arg1(beta) => setting.args.beta = *beta,
                }
                setting
            })
    }
}

/// The device the logic produced by the configuration is meant for.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LibraryLogic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub device_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture_name: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}
