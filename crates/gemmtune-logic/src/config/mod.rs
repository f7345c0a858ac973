mod error;
mod expand;
mod schema;
mod size;

pub use error::*;
pub use expand::*;
pub use schema::*;
pub use size::*;
