use core::fmt::Display;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::components::{Activation, DataType, GemmProblem, Transpose};

use super::Rejection;

/// Size of the output tile computed by one workgroup, and the depth of one step along `k`.
#[derive(new, Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct MacroTile {
    pub m: u32,
    pub n: u32,
    pub depth_u: u32,
}

/// Shape of the matrix instruction the kernel is built with.
#[derive(new, Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatrixInstruction {
    pub m: u32,
    pub n: u32,
    pub k: u32,
}

/// Static capabilities of a kernel.
///
/// Kernels are identified by their name, which encodes every field:
///
/// `Cijk_Ailk_Bljk_HHS_BH_BiasHS_Act_SAV_MT128x128x64_MI32x32x8_GSU1_WGM8_ISAgfx942`
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KernelSpec {
    pub trans_a: Transpose,
    pub trans_b: Transpose,
    pub a: DataType,
    pub b: DataType,
    /// Type of both `C` and `D`.
    pub d: DataType,
    /// Type of the accumulators.
    pub compute: DataType,
    pub batched: bool,
    pub high_precision_accumulate: bool,
    pub bias_types: Vec<DataType>,
    pub activation: bool,
    pub scale_alpha_vec: bool,
    pub scale_ab: bool,
    pub tile: MacroTile,
    pub matrix_instruction: MatrixInstruction,
    /// Number of partial sums `k` is split into.
    pub global_split_u: u32,
    /// Number of tile rows grouped together when walking the output.
    pub workgroup_mapping: u32,
    pub arch: String,
}

/// Errors raised when parsing a kernel name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelNameError {
    #[error("Kernel name {0} doesn't start with Cijk")]
    Prefix(String),

    #[error("Invalid {field} segment {value:?} in kernel name")]
    Segment { field: &'static str, value: String },

    #[error("Missing {0} segment in kernel name")]
    Missing(&'static str),

    #[error("Kernel name declares high precision accumulate as {declared}, its types imply {expected}")]
    InconsistentAccumulate { declared: bool, expected: bool },
}

impl KernelSpec {
    /// A batched kernel without epilogue features and without split-U.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        trans_a: Transpose,
        trans_b: Transpose,
        a: DataType,
        b: DataType,
        d: DataType,
        compute: DataType,
        tile: MacroTile,
        matrix_instruction: MatrixInstruction,
        arch: impl Into<String>,
    ) -> Self {
        Self {
            trans_a,
            trans_b,
            a,
            b,
            d,
            compute,
            batched: true,
            high_precision_accumulate: implied_accumulate(a, b, compute),
            bias_types: Vec::new(),
            activation: false,
            scale_alpha_vec: false,
            scale_ab: false,
            tile,
            matrix_instruction,
            global_split_u: 1,
            workgroup_mapping: 1,
            arch: arch.into(),
        }
    }

    pub fn with_bias(mut self, bias_types: Vec<DataType>) -> Self {
        self.bias_types = bias_types;
        self
    }

    pub fn with_activation(mut self) -> Self {
        self.activation = true;
        self
    }

    pub fn with_scale_alpha_vec(mut self) -> Self {
        self.scale_alpha_vec = true;
        self
    }

    pub fn with_scale_ab(mut self) -> Self {
        self.scale_ab = true;
        self
    }

    pub fn with_global_split_u(mut self, global_split_u: u32) -> Self {
        self.global_split_u = global_split_u.max(1);
        self
    }

    pub fn with_workgroup_mapping(mut self, workgroup_mapping: u32) -> Self {
        self.workgroup_mapping = workgroup_mapping.max(1);
        self
    }

    pub fn unbatched(mut self) -> Self {
        self.batched = false;
        self
    }

    /// The identifying name of the kernel.
    pub fn name(&self) -> String {
        let mut name = String::from("Cijk");

        name.push_str(match self.trans_a {
            Transpose::N => "_Ailk",
            Transpose::T => "_Alik",
        });
        name.push_str(match self.trans_b {
            Transpose::N => "_Bljk",
            Transpose::T => "_Bjlk",
        });

        name.push('_');
        name.push_str(self.a.code());
        if self.a != self.b {
            name.push_str(self.b.code());
        }
        name.push_str(self.d.code());
        name.push_str(self.compute.code());

        if self.batched || self.high_precision_accumulate {
            name.push('_');
            if self.batched {
                name.push('B');
            }
            if self.high_precision_accumulate {
                name.push('H');
            }
        }

        if !self.bias_types.is_empty() {
            name.push_str("_Bias");
            for ty in &self.bias_types {
                name.push_str(ty.code());
            }
        }
        if self.activation {
            name.push_str("_Act");
        }
        if self.scale_alpha_vec {
            name.push_str("_SAV");
        }
        if self.scale_ab {
            name.push_str("_SAB");
        }

        let (tile, mi) = (self.tile, self.matrix_instruction);
        name.push_str(&format!(
            "_MT{}x{}x{}_MI{}x{}x{}_GSU{}_WGM{}_ISA{}",
            tile.m,
            tile.n,
            tile.depth_u,
            mi.m,
            mi.n,
            mi.k,
            self.global_split_u,
            self.workgroup_mapping,
            self.arch
        ));

        name
    }

    /// Bytes of scratch memory needed for the problem.
    pub fn workspace_size(&self, problem: &GemmProblem) -> u64 {
        match self.global_split_u {
            0 | 1 => 0,
            gsu => [problem.n, problem.batch, gsu as usize, self.compute.size()]
                .into_iter()
                .fold(problem.m as u64, |bytes, factor| {
                    bytes.saturating_mul(factor as u64)
                }),
        }
    }

    /// `k` must be a multiple of this value.
    pub fn k_multiple(&self) -> usize {
        match self.a.is_integer() || self.b.is_integer() {
            true => 4,
            false => 1,
        }
    }

    /// Whether the kernel targets the given architecture, ignoring feature suffixes.
    pub fn matches_arch(&self, arch: &str) -> bool {
        base_arch(&self.arch) == base_arch(arch)
    }

    /// Check that the kernel can solve the problem on a device of the given architecture.
    pub fn supports(&self, problem: &GemmProblem, arch: &str) -> Result<(), Rejection> {
        if !self.matches_arch(arch) {
            return Err(Rejection::Arch {
                kernel: self.arch.clone(),
                device: arch.to_string(),
            });
        }

        if self.trans_a != problem.trans_a || self.trans_b != problem.trans_b {
            return Err(Rejection::Transpose {
                kernel_a: self.trans_a,
                kernel_b: self.trans_b,
                problem_a: problem.trans_a,
                problem_b: problem.trans_b,
            });
        }

        let elems = &problem.elems;
        let compute = elems.compute.data_type();
        if self.a != elems.a
            || self.b != elems.b
            || self.d != elems.d
            || elems.c != elems.d
            || self.compute != compute
        {
            return Err(Rejection::Types {
                kernel: format!("{}{}{}{}", self.a, self.b, self.d, self.compute),
                problem: format!("{}{}{}{}{}", elems.a, elems.b, elems.c, elems.d, compute),
            });
        }

        if problem.is_batched() && !self.batched {
            return Err(Rejection::Batched {
                batch: problem.batch,
            });
        }

        let multiple = self.k_multiple();
        if problem.k % multiple != 0 {
            return Err(Rejection::KAlignment {
                k: problem.k,
                multiple,
            });
        }

        if let Some(bias) = problem.epilogue.bias_type(elems.d)
            && !self.bias_types.contains(&bias)
        {
            return Err(Rejection::BiasType(bias));
        }

        let activation = problem.epilogue.activation();
        if activation != Activation::None && !self.activation {
            return Err(Rejection::Activation(activation));
        }

        if problem.scaling.scale_alpha_vec && !self.scale_alpha_vec {
            return Err(Rejection::ScaleAlphaVec);
        }

        if problem.scaling.scale_ab && !self.scale_ab {
            return Err(Rejection::ScaleAB);
        }

        Ok(())
    }

    /// Check the workspace needed for the problem against a limit, returning the needed size.
    pub fn check_workspace(&self, problem: &GemmProblem, available: u64) -> Result<u64, Rejection> {
        let required = self.workspace_size(problem);
        match required <= available {
            true => Ok(required),
            false => Err(Rejection::Workspace {
                required,
                available,
            }),
        }
    }
}

fn implied_accumulate(a: DataType, b: DataType, compute: DataType) -> bool {
    a.size().min(b.size()) < compute.size()
}

fn base_arch(arch: &str) -> &str {
    arch.split(':').next().unwrap_or(arch)
}

impl Display for KernelSpec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<KernelSpec> for String {
    fn from(value: KernelSpec) -> Self {
        value.name()
    }
}

impl TryFrom<String> for KernelSpec {
    type Error = KernelNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for KernelSpec {
    type Err = KernelNameError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let (body, arch) = name
            .rsplit_once("_ISA")
            .ok_or(KernelNameError::Missing("ISA"))?;
        if arch.is_empty() {
            return Err(segment_error("ISA", arch));
        }

        let mut segments = body.split('_');
        if segments.next() != Some("Cijk") {
            return Err(KernelNameError::Prefix(name.to_string()));
        }

        let trans_a = match segments.next() {
            Some("Ailk") => Transpose::N,
            Some("Alik") => Transpose::T,
            Some(other) => return Err(segment_error("A", other)),
            None => return Err(KernelNameError::Missing("A")),
        };
        let trans_b = match segments.next() {
            Some("Bljk") => Transpose::N,
            Some("Bjlk") => Transpose::T,
            Some(other) => return Err(segment_error("B", other)),
            None => return Err(KernelNameError::Missing("B")),
        };

        let types = segments.next().ok_or(KernelNameError::Missing("types"))?;
        let (a, b, d, compute) = match tokenize_types(types).as_deref() {
            Some([a, d, compute]) => (*a, *a, *d, *compute),
            Some([a, b, d, compute]) => (*a, *b, *d, *compute),
            _ => return Err(segment_error("types", types)),
        };

        let mut spec = KernelSpec::new(
            trans_a,
            trans_b,
            a,
            b,
            d,
            compute,
            MacroTile::new(0, 0, 0),
            MatrixInstruction::new(0, 0, 0),
            arch,
        );
        spec.batched = false;
        let mut declared_accumulate = false;
        let mut tile = None;
        let mut mi = None;
        let mut gsu = None;
        let mut wgm = None;

        for segment in segments {
            if let Some(codes) = segment.strip_prefix("Bias") {
                spec.bias_types = tokenize_types(codes)
                    .filter(|types| !types.is_empty())
                    .ok_or_else(|| segment_error("Bias", segment))?;
            } else if segment == "Act" {
                spec.activation = true;
            } else if segment == "SAV" {
                spec.scale_alpha_vec = true;
            } else if segment == "SAB" {
                spec.scale_ab = true;
            } else if let Some(dims) = segment.strip_prefix("MT") {
                let [m, n, depth_u] = parse_dims(dims).ok_or_else(|| segment_error("MT", segment))?;
                tile = Some(MacroTile::new(m, n, depth_u));
            } else if let Some(dims) = segment.strip_prefix("MI") {
                let [m, n, k] = parse_dims(dims).ok_or_else(|| segment_error("MI", segment))?;
                mi = Some(MatrixInstruction::new(m, n, k));
            } else if let Some(value) = segment.strip_prefix("GSU") {
                gsu = Some(parse_positive(value).ok_or_else(|| segment_error("GSU", segment))?);
            } else if let Some(value) = segment.strip_prefix("WGM") {
                wgm = Some(parse_positive(value).ok_or_else(|| segment_error("WGM", segment))?);
            } else if !segment.is_empty() && segment.chars().all(|c| c == 'B' || c == 'H') {
                spec.batched = segment.contains('B');
                declared_accumulate = segment.contains('H');
            } else {
                return Err(segment_error("unknown", segment));
            }
        }

        spec.tile = tile.ok_or(KernelNameError::Missing("MT"))?;
        spec.matrix_instruction = mi.ok_or(KernelNameError::Missing("MI"))?;
        spec.global_split_u = gsu.ok_or(KernelNameError::Missing("GSU"))?;
        spec.workgroup_mapping = wgm.ok_or(KernelNameError::Missing("WGM"))?;

        if declared_accumulate != spec.high_precision_accumulate {
            return Err(KernelNameError::InconsistentAccumulate {
                declared: declared_accumulate,
                expected: spec.high_precision_accumulate,
            });
        }

        Ok(spec)
    }
}

fn segment_error(field: &'static str, value: &str) -> KernelNameError {
    KernelNameError::Segment {
        field,
        value: value.to_string(),
    }
}

/// Split concatenated type codes, matching longer codes first.
fn tokenize_types(codes: &str) -> Option<Vec<DataType>> {
    let mut rest = codes;
    let mut types = Vec::new();

    while !rest.is_empty() {
        let ty = DataType::ALL_BY_CODE_LEN
            .into_iter()
            .find(|ty| rest.starts_with(ty.code()))?;
        rest = &rest[ty.code().len()..];
        types.push(ty);
    }

    Some(types)
}

fn parse_dims(dims: &str) -> Option<[u32; 3]> {
    let mut values = dims.split('x').map(parse_positive);
    let dims = [values.next()??, values.next()??, values.next()??];
    values.next().is_none().then_some(dims)
}

fn parse_positive(value: &str) -> Option<u32> {
    value.parse().ok().filter(|value| *value > 0)
}
