/// Store handle abstraction
///
/// The row stream only talks to a store through these primitives: symbol lookup,
/// sequential raw reads, native filtered reads with a callback, label and text
/// resolution, acronym lookup and special-value classification.
use crate::error::{ConnectorError, ConnectorResult};
use crate::storage::special::SpecialValue;
use crate::storage::symbol::{RawRecord, Symbol, SymbolNr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Fallible sequence of raw records, owned independently of the store handle
pub type RawRecords = Box<dyn Iterator<Item = ConnectorResult<RawRecord>> + Send>;

pub trait SymbolStore: Send + Sync {
    /// Human-readable location, used in logs and errors
    fn locator(&self) -> &str;

    /// All symbols, in store order
    fn symbols(&self) -> &[Symbol];

    /// Find a symbol by name (exact match first, then case-insensitive)
    fn find_symbol(&self, name: &str) -> Option<SymbolNr> {
        let symbols = self.symbols();
        symbols
            .iter()
            .position(|s| s.name == name)
            .or_else(|| symbols.iter().position(|s| s.name.eq_ignore_ascii_case(name)))
    }

    fn symbol_info(&self, nr: SymbolNr) -> ConnectorResult<&Symbol> {
        self.symbols().get(nr).ok_or_else(|| {
            ConnectorError::storage_io_with_path(
                format!("symbol number {} out of range", nr),
                self.locator(),
            )
        })
    }

    /// Start a sequential raw read of a symbol
    fn read_raw(&self, nr: SymbolNr) -> ConnectorResult<RawRecords>;

    /// Native filtered read.
    ///
    /// `filter` holds one string per dimension; an empty string leaves that
    /// dimension unconstrained. `on_record` is invoked for every matching record
    /// and returns `false` to stop the read early. `cancel` is checked before
    /// each record, matching or not; once set the read stops.
    fn read_raw_filtered(
        &self,
        nr: SymbolNr,
        filter: &[String],
        cancel: &AtomicBool,
        on_record: &mut dyn FnMut(RawRecord) -> ConnectorResult<bool>,
    ) -> ConnectorResult<()> {
        for record in self.read_raw(nr)? {
            if cancel.load(Ordering::Acquire) {
                break;
            }
            let record = record?;
            let matches = filter.iter().enumerate().all(|(dim, wanted)| {
                wanted.is_empty()
                    || record
                        .keys
                        .get(dim)
                        .and_then(|key| self.uel_label(*key))
                        .map_or(false, |label| label == wanted)
            });
            if matches && !on_record(record)? {
                break;
            }
        }
        Ok(())
    }

    /// Label of a unique element key
    fn uel_label(&self, key: i32) -> Option<&str>;

    /// Element text referenced by a set record's level slot
    fn element_text(&self, index: i32) -> Option<&str>;

    /// Acronym name when `raw` is an acronym reference
    fn acronym_name(&self, raw: f64) -> Option<&str>;

    fn map_value(&self, raw: f64) -> SpecialValue {
        SpecialValue::classify(raw)
    }
}

/// Enforces a single active reader per store handle
#[derive(Debug, Default, Clone)]
pub struct ReaderSlot {
    active: Arc<AtomicBool>,
}

impl ReaderSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot; fails while another read is in flight
    pub fn acquire(&self, locator: &str) -> ConnectorResult<ReaderGuard> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ConnectorError::storage_io_with_path("reader already active", locator))?;
        Ok(ReaderGuard {
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Releases the reader slot on drop
#[derive(Debug)]
pub struct ReaderGuard {
    active: Arc<AtomicBool>,
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}
