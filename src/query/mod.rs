pub mod parser;
pub mod resolve;
pub mod script;

pub use parser::*;
pub use resolve::*;
pub use script::*;
