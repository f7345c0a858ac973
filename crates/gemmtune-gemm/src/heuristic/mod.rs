mod library;
mod selector;

pub use library::*;
pub use selector::*;
