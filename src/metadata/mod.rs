/// Metadata module: column schemas derived from stored symbols

pub mod schema;

pub use schema::{build_schema, dimension_column_names, Column, ColumnType, TableSchema};
