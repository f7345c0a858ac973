/// Autotune config module.
pub mod autotune;
/// Execution config module.
pub mod execution;
/// Solution library config module.
pub mod library;

mod base;
mod logger;

pub use base::*;
pub use logger::*;
