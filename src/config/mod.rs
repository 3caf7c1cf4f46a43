/// Configuration management
pub mod connector;

pub use connector::*;
