mod catalog;
mod resolver;
mod target;
mod tree;

pub use catalog::*;
pub use resolver::*;
pub use target::*;
pub use tree::*;
