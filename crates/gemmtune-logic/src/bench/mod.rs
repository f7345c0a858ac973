mod data_init;
mod error;
mod harness;
mod report;

pub use data_init::*;
pub use error::*;
pub use harness::*;
pub use report::*;
