pub mod demo;
pub mod format;
pub mod locator;
pub mod special;
pub mod store;
pub mod symbol;
pub mod writer;

pub use format::StoreFile;
pub use locator::resolve_store_path;
pub use special::SpecialValue;
pub use store::{RawRecords, SymbolStore};
pub use symbol::{RawRecord, Symbol, SymbolKind, SymbolNr, ValueSlot};
pub use writer::StoreWriter;
