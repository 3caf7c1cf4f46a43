/// Per-dimension memo of UEL key -> label lookups
///
/// Scoped to one row stream; never shared between scans.
use crate::error::{ConnectorError, ConnectorResult};
use crate::storage::store::SymbolStore;
use fxhash::FxHashMap;
use std::collections::hash_map::Entry;

#[derive(Debug, Default)]
pub struct UelCache {
    dimensions: Vec<FxHashMap<i32, String>>,
    hits: u64,
    misses: u64,
}

impl UelCache {
    pub fn new(dimension_count: usize) -> Self {
        Self {
            dimensions: (0..dimension_count).map(|_| FxHashMap::default()).collect(),
            hits: 0,
            misses: 0,
        }
    }

    /// Label of `key` in `dimension`; the first lookup goes to the store
    pub fn resolve(
        &mut self,
        store: &dyn SymbolStore,
        dimension: usize,
        key: i32,
    ) -> ConnectorResult<&str> {
        if dimension >= self.dimensions.len() {
            self.dimensions.resize_with(dimension + 1, FxHashMap::default);
        }

        match self.dimensions[dimension].entry(key) {
            Entry::Occupied(entry) => {
                self.hits += 1;
                Ok(entry.into_mut().as_str())
            }
            Entry::Vacant(entry) => {
                let label = store.uel_label(key).ok_or_else(|| {
                    ConnectorError::storage_io_with_path(
                        format!("unknown label key {} in dimension {}", key, dimension),
                        store.locator(),
                    )
                })?;
                self.misses += 1;
                Ok(entry.insert(label.to_string()).as_str())
            }
        }
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn len(&self) -> usize {
        self.dimensions.iter().map(|d| d.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
