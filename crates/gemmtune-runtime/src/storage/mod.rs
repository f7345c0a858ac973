mod base;
mod bytes_cpu;

pub use base::*;
pub use bytes_cpu::*;
