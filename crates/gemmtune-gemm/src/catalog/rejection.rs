use crate::components::{Activation, DataType, Transpose};

/// Why a kernel can't solve a problem.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("transposes {problem_a}{problem_b} unsupported, kernel is {kernel_a}{kernel_b}")]
    Transpose {
        kernel_a: Transpose,
        kernel_b: Transpose,
        problem_a: Transpose,
        problem_b: Transpose,
    },

    #[error("types {problem} unsupported, kernel computes {kernel}")]
    Types { kernel: String, problem: String },

    #[error("batch of {batch} requires a batched kernel")]
    Batched { batch: usize },

    #[error("bias of type {0} unsupported")]
    BiasType(DataType),

    #[error("activation {0} unsupported")]
    Activation(Activation),

    #[error("scale alpha vector unsupported")]
    ScaleAlphaVec,

    #[error("scaling of A and B unsupported")]
    ScaleAB,

    #[error("kernel targets {kernel}, device is {device}")]
    Arch { kernel: String, device: String },

    #[error("k={k} must be a multiple of {multiple} for the matrix instruction")]
    KAlignment { k: usize, multiple: usize },

    #[error("workspace of {required} bytes exceeds the limit of {available} bytes")]
    Workspace { required: u64, available: u64 },
}
