pub mod result;
pub mod row;
pub mod row_stream;
pub mod uel_cache;
pub mod value_codec;

pub use result::*;
pub use row::*;
pub use row_stream::*;
pub use uel_cache::*;
pub use value_codec::*;
