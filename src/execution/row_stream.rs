/// Row stream over one symbol
///
/// Two strategies:
/// - unfiltered: pull-driven sequential read on the caller's thread
/// - filtered: the store's native filtered read runs on a producer thread and
///   pushes decoded rows into a bounded channel; the consumer drains the channel
///   and only then sees the producer's error, if any
///
/// Either way rows come out in store order and a failure ends the stream after
/// exactly one `Err`.
use crate::config::DEFAULT_QUEUE_CAPACITY;
use crate::error::{ConnectorError, ConnectorResult};
use crate::execution::row::{Cell, Row};
use crate::execution::uel_cache::UelCache;
use crate::execution::value_codec::ValueCodec;
use crate::metadata::schema::TableSchema;
use crate::query::parser::{FieldRef, WhereCondition};
use crate::query::resolve::ResolvedCondition;
use crate::storage::store::{RawRecords, SymbolStore};
use crate::storage::symbol::{RawRecord, Symbol, SymbolKind, SymbolNr, ValueSlot};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Text of a set element that carries no explanatory text
pub const SET_ELEMENT_MARKER: &str = "Y";

/// Validated scan inputs: selected columns and per-dimension filters
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    pub symbol_nr: SymbolNr,
    pub schema: TableSchema,
    selected: Vec<bool>,
    native_filter: Vec<String>,
    post_filter_dims: Vec<usize>,
    filtered: bool,
}

impl ScanPlan {
    /// Plan from canonical column names
    pub fn new(
        symbol_nr: SymbolNr,
        schema: TableSchema,
        selected_fields: &HashSet<String>,
        conditions: &[WhereCondition],
    ) -> ConnectorResult<Self> {
        let mut selected = Vec::with_capacity(selected_fields.len());
        for name in selected_fields {
            let column = schema.index_of(name).ok_or_else(|| {
                ConnectorError::field_not_found(format!("The field \"{}\" is not valid", name), name.clone())
            })?;
            selected.push(column);
        }

        let mut resolved = Vec::with_capacity(conditions.len());
        for condition in conditions {
            let column = match &condition.field {
                FieldRef::Name(name) => schema.index_of(name),
                FieldRef::Position(position) => (*position < schema.len()).then_some(*position),
            }
            .ok_or_else(|| {
                ConnectorError::field_not_found(
                    format!("The field \"{}\" is not valid", condition.field),
                    condition.field.token(),
                )
            })?;
            resolved.push(ResolvedCondition {
                column,
                value: condition.value.clone(),
            });
        }

        Self::from_columns(symbol_nr, schema, &selected, &resolved)
    }

    /// Plan from already resolved column indices
    pub fn from_columns(
        symbol_nr: SymbolNr,
        schema: TableSchema,
        selected_columns: &[usize],
        conditions: &[ResolvedCondition],
    ) -> ConnectorResult<Self> {
        let mut selected = vec![false; schema.len()];
        for &column in selected_columns {
            let slot = selected.get_mut(column).ok_or_else(|| {
                ConnectorError::field_not_found(
                    format!("The field position \"@{}\" is not valid", column),
                    format!("@{}", column),
                )
            })?;
            *slot = true;
        }

        let mut native_filter = vec![String::new(); schema.dimension_count];
        let mut post_filter_dims = Vec::new();
        for condition in conditions {
            let name = schema
                .column(condition.column)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| format!("@{}", condition.column));
            if !schema.is_dimension(condition.column) {
                return Err(ConnectorError::unsupported_filter(
                    format!("The field \"{}\" is not a dimension and cannot be filtered", name),
                    name,
                ));
            }
            if condition.value.is_empty() {
                // the native filter reads "" as unconstrained
                if !post_filter_dims.contains(&condition.column) {
                    post_filter_dims.push(condition.column);
                }
            } else {
                native_filter[condition.column] = condition.value.clone();
            }
        }

        Ok(Self {
            symbol_nr,
            schema,
            selected,
            native_filter,
            post_filter_dims,
            filtered: !conditions.is_empty(),
        })
    }

    pub fn is_selected(&self, column: usize) -> bool {
        self.selected.get(column).copied().unwrap_or(false)
    }

    /// One equality string per dimension, `""` for unconstrained
    pub fn native_filter(&self) -> &[String] {
        &self.native_filter
    }

    /// Dimensions whose label must be empty, checked after decoding
    pub fn post_filter_dims(&self) -> &[usize] {
        &self.post_filter_dims
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered
    }
}

/// Turns raw records into rows for one plan
pub struct RowDecoder {
    store: Arc<dyn SymbolStore>,
    symbol: Symbol,
    schema: TableSchema,
    selected: Vec<bool>,
    post_filter_dims: Vec<usize>,
    cache: UelCache,
    discarded: u64,
}

impl RowDecoder {
    pub fn new(store: Arc<dyn SymbolStore>, plan: &ScanPlan) -> ConnectorResult<Self> {
        let symbol = store.symbol_info(plan.symbol_nr)?.clone();
        if symbol.kind != plan.schema.kind || symbol.dimension_count() != plan.schema.dimension_count {
            return Err(ConnectorError::internal(format!(
                "schema of {} does not match symbol {}",
                plan.schema.table, symbol.name
            )));
        }
        Ok(Self {
            cache: UelCache::new(symbol.dimension_count()),
            store,
            symbol,
            schema: plan.schema.clone(),
            selected: plan.selected.clone(),
            post_filter_dims: plan.post_filter_dims.clone(),
            discarded: 0,
        })
    }

    /// Decode one record; `Ok(None)` when a post-filter discards it
    pub fn decode(&mut self, record: &RawRecord) -> ConnectorResult<Option<Row>> {
        let mut row = Row::new(self.schema.len());

        for dim in 0..self.schema.dimension_count {
            let key = *record.keys.get(dim).ok_or_else(|| {
                ConnectorError::storage_io_with_path(
                    format!("record of {} has fewer keys than dimensions", self.symbol.name),
                    self.store.locator(),
                )
            })?;
            let label = self.cache.resolve(self.store.as_ref(), dim, key)?;
            if !label.is_empty() && self.post_filter_dims.contains(&dim) {
                trace!(symbol = %self.symbol.name, dim, "Post-filter discarded record");
                self.discarded += 1;
                return Ok(None);
            }
            if self.selected[dim] {
                row.set(dim, Cell::Text(label.to_string()));
            }
        }

        match self.symbol.kind {
            SymbolKind::Set => {
                let column = self.schema.dimension_count;
                if self.selected[column] {
                    let index = record.value(ValueSlot::Level) as i32;
                    let text = self.store.element_text(index).unwrap_or(SET_ELEMENT_MARKER);
                    row.set(column, Cell::Text(text.to_string()));
                }
            }
            SymbolKind::Parameter => {
                self.decode_value(&mut row, record, ValueSlot::Level)?;
                if let Some(column) = self.schema.comments_column() {
                    if self.selected[column] {
                        row.set(column, Cell::Text(self.symbol.text.clone()));
                    }
                }
            }
            SymbolKind::Variable | SymbolKind::Equation => {
                for slot in ValueSlot::ALL {
                    self.decode_value(&mut row, record, slot)?;
                }
            }
        }

        Ok(Some(row))
    }

    /// Fill the number / special-text column pair of one value slot
    fn decode_value(&self, row: &mut Row, record: &RawRecord, slot: ValueSlot) -> ConnectorResult<()> {
        let (number_column, special_column) = self.schema.value_columns(slot).ok_or_else(|| {
            ConnectorError::internal(format!("{} has no {} column", self.symbol.kind, slot.label()))
        })?;
        let number_selected = self.selected[number_column];
        let special_selected = self.selected[special_column];
        if !number_selected && !special_selected {
            return Ok(());
        }

        let decoded = ValueCodec::new(self.store.as_ref()).decode(record.value(slot));
        if number_selected {
            if let Some(value) = decoded.numeric_form() {
                row.set(number_column, Cell::Number(value));
            }
        }
        if special_selected {
            if let Some(text) = decoded.text_form() {
                row.set(special_column, Cell::Text(text));
            }
        } else if decoded.is_special() {
            return Err(ConnectorError::ambiguous_special_value(
                &self.schema.columns[number_column].name,
                &self.schema.columns[special_column].name,
            ));
        }
        Ok(())
    }

    /// Records dropped by post-filters so far
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

/// Lazy, order-preserving sequence of rows
pub struct RowStream {
    schema: TableSchema,
    strategy: ScanStrategy,
}

enum ScanStrategy {
    Unfiltered(UnfilteredScan),
    Filtered(FilteredScan),
}

impl RowStream {
    /// Scan the symbol behind `schema` with the default queue bound
    pub fn scan(
        store: Arc<dyn SymbolStore>,
        schema: &TableSchema,
        selected_fields: &HashSet<String>,
        conditions: &[WhereCondition],
    ) -> ConnectorResult<Self> {
        let symbol_nr = store
            .find_symbol(&schema.table)
            .ok_or_else(|| ConnectorError::table_not_found(&schema.table))?;
        let plan = ScanPlan::new(symbol_nr, schema.clone(), selected_fields, conditions)?;
        Self::open(store, plan, DEFAULT_QUEUE_CAPACITY)
    }

    /// Start a scan; the strategy follows `plan.is_filtered()`
    pub fn open(store: Arc<dyn SymbolStore>, plan: ScanPlan, queue_capacity: usize) -> ConnectorResult<Self> {
        let decoder = RowDecoder::new(Arc::clone(&store), &plan)?;
        let schema = plan.schema.clone();

        let strategy = if plan.is_filtered() {
            debug!(
                table = %schema.table,
                native = ?plan.native_filter(),
                post_filters = plan.post_filter_dims().len(),
                "Starting filtered scan"
            );
            ScanStrategy::Filtered(FilteredScan::spawn(store, &plan, decoder, queue_capacity.max(1))?)
        } else {
            debug!(table = %schema.table, "Starting sequential scan");
            ScanStrategy::Unfiltered(UnfilteredScan {
                records: store.read_raw(plan.symbol_nr)?,
                decoder,
                rows: 0,
                finished: false,
            })
        };

        Ok(Self { schema, strategy })
    }

    /// Schema the rows are laid out in
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Replace the reported schema (same layout, e.g. `@N` aliases)
    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn is_filtered(&self) -> bool {
        matches!(self.strategy, ScanStrategy::Filtered(_))
    }
}

impl Iterator for RowStream {
    type Item = ConnectorResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.strategy {
            ScanStrategy::Unfiltered(scan) => scan.next(),
            ScanStrategy::Filtered(scan) => scan.next(),
        }
    }
}

struct UnfilteredScan {
    records: RawRecords,
    decoder: RowDecoder,
    rows: u64,
    finished: bool,
}

impl UnfilteredScan {
    fn finish(&mut self) {
        self.finished = true;
        // releases the store's reader slot
        self.records = Box::new(std::iter::empty());
    }

    fn next(&mut self) -> Option<ConnectorResult<Row>> {
        if self.finished {
            return None;
        }
        loop {
            let record = match self.records.next() {
                Some(Ok(record)) => record,
                Some(Err(err)) => {
                    warn!(rows = self.rows, error = %err, "Sequential scan failed");
                    self.finish();
                    return Some(Err(err));
                }
                None => {
                    debug!(rows = self.rows, "Sequential scan finished");
                    self.finish();
                    return None;
                }
            };
            match self.decoder.decode(&record) {
                Ok(Some(row)) => {
                    self.rows += 1;
                    return Some(Ok(row));
                }
                Ok(None) => continue,
                Err(err) => {
                    warn!(rows = self.rows, error = %err, "Sequential scan failed");
                    self.finish();
                    return Some(Err(err));
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ProducerSummary {
    rows: u64,
    discarded: u64,
}

struct FilteredScan {
    receiver: Option<Receiver<Row>>,
    producer: Option<JoinHandle<ConnectorResult<ProducerSummary>>>,
    cancelled: Arc<AtomicBool>,
}

impl FilteredScan {
    fn spawn(
        store: Arc<dyn SymbolStore>,
        plan: &ScanPlan,
        mut decoder: RowDecoder,
        capacity: usize,
    ) -> ConnectorResult<Self> {
        let (sender, receiver) = mpsc::sync_channel::<Row>(capacity);
        let symbol_nr = plan.symbol_nr;
        let filter = plan.native_filter().to_vec();
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancel = Arc::clone(&cancelled);

        let producer = thread::Builder::new()
            .name("symbol-scan".into())
            .spawn(move || {
                let mut rows = 0u64;
                let mut on_record = |record: RawRecord| -> ConnectorResult<bool> {
                    if cancel.load(Ordering::Acquire) {
                        return Ok(false);
                    }
                    match decoder.decode(&record)? {
                        Some(row) => {
                            if sender.send(row).is_err() {
                                // consumer went away
                                return Ok(false);
                            }
                            rows += 1;
                            Ok(true)
                        }
                        None => Ok(true),
                    }
                };
                store.read_raw_filtered(symbol_nr, &filter, &cancel, &mut on_record)?;
                Ok(ProducerSummary {
                    rows,
                    discarded: decoder.discarded(),
                })
            })
            .map_err(|e| ConnectorError::internal(format!("failed to spawn scan producer: {}", e)))?;

        Ok(Self {
            receiver: Some(receiver),
            producer: Some(producer),
            cancelled,
        })
    }

    fn next(&mut self) -> Option<ConnectorResult<Row>> {
        if let Some(receiver) = &self.receiver {
            if let Ok(row) = receiver.recv() {
                return Some(Ok(row));
            }
        }

        // channel drained and closed: report how the producer ended, once
        self.receiver = None;
        match self.producer.take()?.join() {
            Ok(Ok(summary)) => {
                debug!(rows = summary.rows, discarded = summary.discarded, "Filtered scan finished");
                None
            }
            Ok(Err(err)) => {
                warn!(error = %err, "Filtered scan failed");
                Some(Err(err))
            }
            Err(_) => Some(Err(ConnectorError::internal("filtered scan producer panicked"))),
        }
    }
}

impl Drop for FilteredScan {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        // unblocks a producer waiting on a full channel
        self.receiver = None;
        if let Some(producer) = self.producer.take() {
            let _ = producer.join();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::test_support::MemoryStore;
    use crate::error::ErrorKind;
    use crate::metadata::schema::build_schema;
    use crate::storage::special::{acronym_value, SV_EPS, SV_NA};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn select(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn sample() -> Arc<dyn SymbolStore> {
        Arc::new(MemoryStore::parameter(
            &["i", "j"],
            &[
                (&["a", "x"], 1.0),
                (&["a", ""], 2.0),
                (&["b", "y"], 3.0),
                (&["b", ""], SV_EPS),
            ],
        ))
    }

    fn collect(stream: RowStream) -> Vec<ConnectorResult<Row>> {
        stream.collect()
    }

    #[test]
    fn test_empty_value_goes_to_post_filter() {
        let schema = build_schema(&sample().symbols()[0]);
        let plan = ScanPlan::new(
            0,
            schema,
            &select(&["i"]),
            &[WhereCondition::new("i", "1"), WhereCondition::new("j", "")],
        )
        .unwrap();
        assert_eq!(plan.native_filter(), &["1".to_string(), String::new()]);
        assert_eq!(plan.post_filter_dims(), &[1]);
        assert!(plan.is_filtered());
    }

    #[test]
    fn test_filter_on_value_column_is_unsupported() {
        let schema = build_schema(&sample().symbols()[0]);
        let err = ScanPlan::new(0, schema, &select(&["i"]), &[WhereCondition::new("Value", "1")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFilter);
    }

    #[test]
    fn test_unknown_selected_field() {
        let schema = build_schema(&sample().symbols()[0]);
        let err = ScanPlan::new(0, schema, &select(&["nope"]), &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldNotFound);
    }

    #[test]
    fn test_unfiltered_scan_keeps_store_order_and_selection() {
        let store = sample();
        let schema = build_schema(&store.symbols()[0]);
        let stream = RowStream::scan(store, &schema, &select(&["j", "Value", "Value (SV)"]), &[]).unwrap();
        assert!(!stream.is_filtered());

        let rows: Vec<Row> = collect(stream).into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].get(0), None);
        assert_eq!(rows[0].text(1), Some("x"));
        assert_eq!(rows[0].number(2), Some(1.0));
        assert_eq!(rows[0].get(3), None);
        assert_eq!(rows[3].get(2), None);
        assert_eq!(rows[3].text(3), Some("Eps"));
    }

    #[test]
    fn test_filtered_scan_never_emits_non_empty_post_filtered_label() {
        let store = sample();
        let schema = build_schema(&store.symbols()[0]);
        let stream = RowStream::scan(
            store,
            &schema,
            &select(&["i", "j", "Value", "Value (SV)"]),
            &[WhereCondition::new("j", "")],
        )
        .unwrap();
        assert!(stream.is_filtered());

        let rows: Vec<Row> = collect(stream).into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.text(1) == Some("")));
        assert_eq!(rows[0].text(0), Some("a"));
        assert_eq!(rows[1].text(0), Some("b"));
    }

    #[test]
    fn test_native_filter_matches_labels() {
        let store = sample();
        let schema = build_schema(&store.symbols()[0]);
        let stream = RowStream::scan(store, &schema, &select(&["Value"]), &[WhereCondition::new("i", "b")])
            .unwrap();
        let rows: Vec<ConnectorResult<Row>> = collect(stream);
        // b/y is 3.0, b/"" is Eps with no SV column selected
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_ref().unwrap().number(2), Some(3.0));
        assert_eq!(rows[1].as_ref().unwrap_err().kind(), ErrorKind::AmbiguousSpecialValue);
    }

    #[test]
    fn test_ambiguous_special_value_ends_sequential_scan_after_earlier_rows() {
        let store = sample();
        let schema = build_schema(&store.symbols()[0]);
        let results = collect(RowStream::scan(store, &schema, &select(&["i", "Value"]), &[]).unwrap());
        assert_eq!(results.len(), 4);
        assert!(results[..3].iter().all(|r| r.is_ok()));
        assert_eq!(results[3].as_ref().unwrap_err().kind(), ErrorKind::AmbiguousSpecialValue);
    }

    #[test]
    fn test_acronym_is_special_text() {
        let store: Arc<dyn SymbolStore> = Arc::new(MemoryStore::parameter(
            &["i"],
            &[(&["a"], acronym_value(1)), (&["b"], SV_NA)],
        ));
        let schema = build_schema(&store.symbols()[0]);
        let rows: Vec<Row> = collect(RowStream::scan(store, &schema, &select(&["Value", "Value (SV)"]), &[]).unwrap())
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rows[0].text(2), Some("high"));
        assert_eq!(rows[0].get(1), None);
        assert_eq!(rows[1].text(2), Some("NA"));
    }

    #[test]
    fn test_filtered_scan_drains_before_raising() {
        let mut store = MemoryStore::parameter(
            &["i"],
            &[(&["a"], 1.0), (&["a"], 2.0), (&["a"], 3.0), (&["a"], 4.0)],
        );
        store.fail_after = Some(2);
        let store: Arc<dyn SymbolStore> = Arc::new(store);
        let schema = build_schema(&store.symbols()[0]);
        let plan = ScanPlan::new(0, schema, &select(&["Value"]), &[WhereCondition::new("i", "a")]).unwrap();

        // capacity 1: the producer blocks until the consumer pulls
        let results: Vec<ConnectorResult<Row>> = RowStream::open(store, plan, 1).unwrap().collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().number(1), Some(1.0));
        assert_eq!(results[1].as_ref().unwrap().number(1), Some(2.0));
        assert_eq!(results[2].as_ref().unwrap_err().kind(), ErrorKind::StorageIo);
    }

    #[test]
    fn test_dropping_filtered_stream_early_stops_producer() {
        let rows: Vec<(&[&str], f64)> = (0..100).map(|i| (&["a"][..], i as f64)).collect();
        let store: Arc<dyn SymbolStore> = Arc::new(MemoryStore::parameter(&["i"], &rows));
        let schema = build_schema(&store.symbols()[0]);
        let plan = ScanPlan::new(0, schema, &select(&["Value"]), &[WhereCondition::new("i", "a")]).unwrap();

        let mut stream = RowStream::open(store, plan, 2).unwrap();
        assert!(stream.next().unwrap().is_ok());
        drop(stream);
    }

    #[test]
    fn test_producer_panic_surfaces_once_after_drain() {
        let rows: Vec<(&[&str], f64)> = (0..5).map(|i| (&["a"][..], i as f64)).collect();
        let mut store = MemoryStore::parameter(&["i"], &rows);
        store.panic_after = Some(3);
        let store: Arc<dyn SymbolStore> = Arc::new(store);
        let schema = build_schema(&store.symbols()[0]);
        let plan = ScanPlan::new(0, schema, &select(&["Value"]), &[WhereCondition::new("i", "a")]).unwrap();

        let mut stream = RowStream::open(store, plan, 1).unwrap();
        for expected in 0..3 {
            assert_eq!(stream.next().unwrap().unwrap().number(1), Some(expected as f64));
        }
        let err = stream.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_dropping_filtered_stream_cancels_non_matching_read() {
        // one match, then a long run the native filter skips
        let mut rows: Vec<(&[&str], f64)> = vec![(&["a"][..], 0.0)];
        rows.extend((1..200).map(|i| (&["b"][..], i as f64)));
        let mut store = MemoryStore::parameter(&["i"], &rows);
        store.delay = Some(Duration::from_millis(5));
        let pulled: Arc<AtomicUsize> = Arc::clone(&store.pulled);
        let store: Arc<dyn SymbolStore> = Arc::new(store);
        let schema = build_schema(&store.symbols()[0]);
        let plan = ScanPlan::new(0, schema, &select(&["Value"]), &[WhereCondition::new("i", "a")]).unwrap();

        let mut stream = RowStream::open(Arc::clone(&store), plan, 1).unwrap();
        assert_eq!(stream.next().unwrap().unwrap().number(1), Some(0.0));
        drop(stream);

        assert!(pulled.load(Ordering::SeqCst) < 200);
        // reader slot released with the producer
        assert!(store.read_raw(0).is_ok());
    }
}
