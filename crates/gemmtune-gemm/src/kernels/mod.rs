/// Amax of an input and the scale derived from it.
pub mod amax;
/// Element encoding of every storage type.
pub mod elem;
/// Output stage applied to the accumulators.
pub mod epilogue;
/// Operand loading in the accumulation precision.
pub mod host;
/// Untiled GEMM used for validation.
pub mod reference;
/// GEMM following the tiling of a catalog kernel.
pub mod tiled;

pub use amax::*;
pub use epilogue::*;
pub use reference::*;
pub use tiled::*;
