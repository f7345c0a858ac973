use core::fmt::Display;

use gemmtune_runtime::tune::{AutotuneKey, anchor};
use serde::{Deserialize, Serialize};

use crate::components::{Activation, DataType, GemmElems, GemmKind, GemmProblem, GemmScaling, Transpose};

#[derive(new, Hash, Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
/// Autotune key representative of GEMM versions
pub struct GemmAutotuneKey {
    pub definition: GemmProblemDefinition,
    pub analysis: GemmAutotuneAnalysis,
}

/// Largest anchored batch, batches above it share their tuning.
const MAX_BATCH_ANCHOR: usize = 64;

#[derive(new, Hash, Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct GemmProblemDefinition {
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub batch: usize,
    pub trans_a: Transpose,
    pub trans_b: Transpose,
    pub elems: GemmElems,
    pub bias: Option<DataType>,
    pub activation: Activation,
    pub scaling: GemmScaling,
}

#[derive(Hash, Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum GemmGlobalScale {
    Large,
    Medium,
    Small,
}

#[derive(Hash, Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct GemmAutotuneAnalysis {
    pub scale_global: GemmGlobalScale,
    pub kind: GemmKind,
}

impl GemmGlobalScale {
    pub fn from_size(m: usize, n: usize, k: usize) -> Self {
        if m < 512 && k < 512 && n < 512 {
            GemmGlobalScale::Small
        } else if m < 2048 && k < 2048 && n < 2048 {
            GemmGlobalScale::Medium
        } else {
            GemmGlobalScale::Large
        }
    }
}

/// Whether split-k kernels are worth benchmarking: the output is small compared to the depth.
pub fn should_tune_split_k(key: &GemmAutotuneKey) -> bool {
    let definition = &key.definition;
    matches!(key.analysis.kind, GemmKind::General)
        && definition.m.saturating_mul(definition.n) <= definition.k.saturating_mul(64)
}

impl GemmAutotuneKey {
    /// Create the autotune key based on the shape, the layout and the types of the problem.
    ///
    /// Sizes are anchored to powers of two so that close problems share their tuning.
    pub fn generate(problem: &GemmProblem) -> Self {
        let definition = GemmProblemDefinition::new(
            anchor(problem.m, None, None, None),
            anchor(problem.n, None, None, None),
            anchor(problem.k, None, None, None),
            anchor(problem.batch, Some(MAX_BATCH_ANCHOR), None, None),
            problem.trans_a,
            problem.trans_b,
            problem.elems,
            problem.epilogue.bias_type(problem.elems.d),
            problem.epilogue.activation(),
            problem.scaling,
        );
        let analysis = GemmAutotuneAnalysis {
            scale_global: GemmGlobalScale::from_size(problem.m, problem.n, problem.k),
            kind: problem.kind(),
        };

        Self::new(definition, analysis)
    }
}

impl Display for GemmAutotuneKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let def = &self.definition;
        let elems = &def.elems;
        write!(
            f,
            "m={} n={} k={} batch={} {}{} {}{}{}{}/{:?}",
            def.m,
            def.n,
            def.k,
            def.batch,
            def.trans_a,
            def.trans_b,
            elems.a,
            elems.b,
            elems.c,
            elems.d,
            elems.compute
        )?;
        if let Some(bias) = def.bias {
            write!(f, " bias={bias}")?;
        }
        if def.activation != Activation::None {
            write!(f, " act={}", def.activation)?;
        }
        write!(
            f,
            " {:?} {:?}",
            self.analysis.scale_global, self.analysis.kind
        )
    }
}

impl AutotuneKey for GemmAutotuneKey {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Epilogue;
    use pretty_assertions::assert_eq;

    fn problem(m: usize, n: usize, k: usize) -> GemmProblem {
        GemmProblem::new(
            m,
            n,
            k,
            1,
            Transpose::N,
            Transpose::T,
            GemmElems::uniform(DataType::F16),
        )
    }

    #[test]
    fn close_sizes_share_a_key() {
        assert_eq!(
            GemmAutotuneKey::generate(&problem(1000, 600, 700)),
            GemmAutotuneKey::generate(&problem(1023, 513, 513)),
        );
        assert_ne!(
            GemmAutotuneKey::generate(&problem(1000, 600, 700)),
            GemmAutotuneKey::generate(&problem(1024, 600, 700)),
        );
    }

    #[test]
    fn epilogue_is_part_of_the_key() {
        let plain = problem(256, 256, 256);
        let relu = plain
            .clone()
            .with_epilogue(Epilogue::new(None, Activation::Relu));

        let key = GemmAutotuneKey::generate(&relu);
        assert_ne!(GemmAutotuneKey::generate(&plain), key);
        assert_eq!(
            key.to_string(),
            "m=256 n=256 k=256 batch=1 NT HHHH/F32 act=relu Small General"
        );
    }

    #[test]
    fn split_k_is_tuned_for_deep_problems() {
        assert!(should_tune_split_k(&GemmAutotuneKey::generate(&problem(64, 64, 8192))));
        assert!(!should_tune_split_k(&GemmAutotuneKey::generate(&problem(4096, 4096, 256))));
    }
}
