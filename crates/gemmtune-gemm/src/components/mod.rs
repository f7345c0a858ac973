mod epilogue;
mod error;
mod problem;
mod types;

pub use epilogue::*;
pub use error::*;
pub use problem::*;
pub use types::*;
