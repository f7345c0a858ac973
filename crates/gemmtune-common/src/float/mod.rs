mod fp8;

pub use fp8::*;
