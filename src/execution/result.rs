/// Row to Arrow conversion
use crate::error::{ConnectorError, ConnectorResult};
use crate::execution::row::{Cell, Row};
use crate::execution::row_stream::RowStream;
use crate::metadata::schema::{ColumnType, TableSchema};
use arrow::array::{ArrayRef, Float64Builder, StringBuilder};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Convert rows laid out in `schema` to one RecordBatch; absent cells become nulls
pub fn rows_to_record_batch(schema: &TableSchema, rows: &[Row]) -> ConnectorResult<RecordBatch> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.len());

    for (index, column) in schema.columns.iter().enumerate() {
        let array: ArrayRef = match column.column_type {
            ColumnType::Number => {
                let mut b = Float64Builder::with_capacity(rows.len());
                for row in rows {
                    match row.get(index) {
                        Some(Cell::Number(v)) => b.append_value(*v),
                        None => b.append_null(),
                        Some(Cell::Text(_)) => return Err(type_mismatch(&column.name)),
                    }
                }
                Arc::new(b.finish())
            }
            ColumnType::Text => {
                let mut b = StringBuilder::with_capacity(rows.len(), rows.len() * 8);
                for row in rows {
                    match row.get(index) {
                        Some(Cell::Text(s)) => b.append_value(s),
                        None => b.append_null(),
                        Some(Cell::Number(_)) => return Err(type_mismatch(&column.name)),
                    }
                }
                Arc::new(b.finish())
            }
        };
        columns.push(array);
    }

    RecordBatch::try_new(schema.to_arrow_schema(), columns)
        .map_err(|e| ConnectorError::internal(format!("Failed to create RecordBatch: {}", e)))
}

fn type_mismatch(column: &str) -> ConnectorError {
    ConnectorError::internal(format!("cell type does not match column {}", column))
}

impl RowStream {
    /// Batches of at most `batch_size` rows.
    ///
    /// A mid-scan error first flushes the rows read before it as a final
    /// batch, then comes out once as `Err`. An empty stream yields one empty batch.
    pub fn into_record_batches(self, batch_size: usize) -> RecordBatches {
        let batch_size = batch_size.max(1);
        RecordBatches {
            schema: self.schema().clone(),
            stream: Some(self),
            pending: Vec::with_capacity(batch_size),
            batch_size,
            error: None,
            emitted: false,
        }
    }
}

/// Arrow batches drawn from a [`RowStream`]
pub struct RecordBatches {
    schema: TableSchema,
    stream: Option<RowStream>,
    pending: Vec<Row>,
    batch_size: usize,
    error: Option<ConnectorError>,
    emitted: bool,
}

impl RecordBatches {
    fn flush(&mut self) -> ConnectorResult<RecordBatch> {
        self.emitted = true;
        let batch = rows_to_record_batch(&self.schema, &self.pending);
        self.pending.clear();
        batch
    }
}

impl Iterator for RecordBatches {
    type Item = ConnectorResult<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(stream) = self.stream.as_mut() {
            match stream.next() {
                Some(Ok(row)) => {
                    self.pending.push(row);
                    if self.pending.len() == self.batch_size {
                        return Some(self.flush());
                    }
                }
                Some(Err(err)) => {
                    self.stream = None;
                    self.error = Some(err);
                }
                None => self.stream = None,
            }
        }

        if !self.pending.is_empty() || (!self.emitted && self.error.is_none()) {
            return Some(self.flush());
        }
        self.error.take().map(Err)
    }
}
