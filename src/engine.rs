use crate::config::ConnectorConfig;
use crate::error::{ConnectorError, ConnectorResult};
use crate::execution::row_stream::{RowStream, ScanPlan};
use crate::metadata::schema::{build_schema, TableSchema};
use crate::query::parser::{parse_query, ParsedQuery};
use crate::query::resolve::resolve_fields;
use crate::storage::format::StoreFile;
use crate::storage::locator::resolve_store_path;
use crate::storage::store::SymbolStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Main connector interface: query extraction and row retrieval
pub struct SymbolConnector {
    config: ConnectorConfig,
}

/// An extracted query, ready to be scanned once
pub struct QueryHandle {
    store: Arc<dyn SymbolStore>,
    plan: ScanPlan,
    output_schema: TableSchema,
}

impl QueryHandle {
    /// Schema as returned to the caller (`@N` aliases applied)
    pub fn schema(&self) -> &TableSchema {
        &self.output_schema
    }

    pub fn plan(&self) -> &ScanPlan {
        &self.plan
    }
}

impl SymbolConnector {
    pub fn new(config: ConnectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Resolve a store locator under the configured source folder
    pub fn locate(&self, file: &str) -> ConnectorResult<PathBuf> {
        resolve_store_path(self.config.source_dir.as_deref(), file)
    }

    /// Open a fresh handle; every query gets its own reader
    pub fn open_store(&self, file: &str) -> ConnectorResult<Arc<dyn SymbolStore>> {
        let path = self.locate(file)?;
        info!(store = %path.display(), "Opening symbol store");
        Ok(Arc::new(StoreFile::open(&path)?))
    }

    /// Parse `query`, open its store and validate every field reference.
    ///
    /// No rows are read yet; all pre-scan errors surface here.
    pub fn extract_query(&self, query: &str) -> ConnectorResult<(TableSchema, QueryHandle)> {
        let parsed = parse_query(query)?;
        let store = self.open_store(&parsed.source_file)?;
        self.prepare(store, &parsed)
    }

    /// Bind a parsed query to an already opened store
    pub fn prepare(
        &self,
        store: Arc<dyn SymbolStore>,
        parsed: &ParsedQuery,
    ) -> ConnectorResult<(TableSchema, QueryHandle)> {
        let symbol_nr = store
            .find_symbol(&parsed.table)
            .ok_or_else(|| ConnectorError::table_not_found(&parsed.table))?;
        let schema = build_schema(store.symbol_info(symbol_nr)?);
        let resolved = resolve_fields(&schema, &parsed.fields, &parsed.conditions)?;
        let plan = ScanPlan::from_columns(symbol_nr, schema, &resolved.selected, &resolved.conditions)?;

        info!(
            table = %parsed.table,
            store = %store.locator(),
            fields = resolved.selected.len(),
            filters = resolved.conditions.len(),
            "Extracted query"
        );

        let output_schema = resolved.output_schema;
        Ok((
            output_schema.clone(),
            QueryHandle {
                store,
                plan,
                output_schema,
            },
        ))
    }

    /// Start the scan of an extracted query
    pub fn get_data(&self, handle: QueryHandle) -> ConnectorResult<RowStream> {
        let stream = RowStream::open(
            handle.store,
            handle.plan,
            self.config.effective_queue_capacity(),
        )?;
        Ok(stream.with_schema(handle.output_schema))
    }

    /// `extract_query` followed by `get_data`
    pub fn query(&self, query: &str) -> ConnectorResult<RowStream> {
        let (_, handle) = self.extract_query(query)?;
        self.get_data(handle)
    }

    /// Every symbol of a store with its schema, in store order
    pub fn list_tables(&self, file: &str) -> ConnectorResult<Vec<TableSchema>> {
        let store = self.open_store(file)?;
        let tables: Vec<TableSchema> = store.symbols().iter().map(build_schema).collect();
        debug!(store = %store.locator(), tables = tables.len(), "Listed tables");
        Ok(tables)
    }
}

impl Default for SymbolConnector {
    fn default() -> Self {
        Self::new(ConnectorConfig::default())
    }
}
