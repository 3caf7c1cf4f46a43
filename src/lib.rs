//! # Symbol SQL Connector
//!
//! Exposes the symbols of a binary symbol store (sets, parameters, variables,
//! equations) as relational tables, queried with a narrow SELECT/FROM/WHERE
//! sub-language.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use symbol_sql_connector::{ConnectorConfig, SymbolConnector};
//!
//! let connector = SymbolConnector::new(ConnectorConfig::default().with_source_dir("data"));
//!
//! let (schema, handle) = connector
//!     .extract_query(r#"SELECT i, j, "Value" FROM "d <models/trnsport.sym>" WHERE i='seattle'"#)
//!     .unwrap();
//! println!("columns: {:?}", schema.names());
//!
//! for row in connector.get_data(handle).unwrap() {
//!     println!("{:?}", row.unwrap());
//! }
//! ```
//!
//! ## Features
//!
//! - **Column layout per symbol kind**: dimension columns followed by value / special-value pairs
//! - **Field references by name or position** (`@N`)
//! - **Filtered scans**: dimension filters pushed into the store read, rows streamed through a bounded queue
//! - **Special values**: `UNdef`, `NA`, `+Inf`, `-Inf`, `Eps` and acronyms as companion text columns
//! - **Arrow export** of row streams

pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod metadata;
pub mod query;
pub mod result_format;
pub mod storage;

// Public API - Main types users need
pub use config::ConnectorConfig;
pub use engine::{QueryHandle, SymbolConnector};
pub use error::{ConnectorError, ConnectorResult, ErrorKind};
pub use execution::{Cell, Row, RowStream};
pub use metadata::{Column, ColumnType, TableSchema};
pub use query::{parse_query, FieldRef, ParsedQuery, WhereCondition};
pub use storage::{StoreFile, StoreWriter, SymbolKind, SymbolStore};
