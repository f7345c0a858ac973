mod builtin;
#[allow(clippy::module_inception)]
mod catalog;
mod rejection;
mod spec;

pub(crate) use builtin::builtin_kernels;
pub use catalog::*;
pub use rejection::*;
pub use spec::*;
