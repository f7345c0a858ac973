mod create;
mod error;
mod format;
mod load;
mod logic;
mod master;

pub use create::*;
pub use error::*;
pub use format::*;
pub use load::*;
pub use logic::*;
pub use master::*;
