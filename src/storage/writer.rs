//! Binary symbol store: write side. See `format` for the layout.

use super::format::{record_len, STORE_MAGIC, STORE_VERSION};
use super::special::{acronym_value, normalize};
use super::symbol::{RawRecord, SymbolKind, SymbolNr, ValueSlot, VALUE_SLOTS};
use crate::error::{ConnectorError, ConnectorResult};
use fxhash::FxHashMap;
use std::fs;
use std::path::Path;

/// Default record values of variables and equations: level, marginal, lower, upper, scale
pub const DEFAULT_VARIABLE_VALUES: [f64; VALUE_SLOTS] = [0.0, 0.0, f64::NEG_INFINITY, f64::INFINITY, 1.0];

struct PendingSymbol {
    name: String,
    kind: SymbolKind,
    domains: Vec<String>,
    text: String,
    records: Vec<RawRecord>,
}

/// Builds a store file in memory and writes it out
#[derive(Default)]
pub struct StoreWriter {
    uels: Vec<String>,
    uel_keys: FxHashMap<String, i32>,
    texts: Vec<String>,
    acronyms: Vec<String>,
    symbols: Vec<PendingSymbol>,
}

impl StoreWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a label, returning its 1-based key
    pub fn add_uel(&mut self, label: &str) -> i32 {
        if let Some(key) = self.uel_keys.get(label) {
            return *key;
        }
        self.uels.push(label.to_string());
        let key = self.uels.len() as i32;
        self.uel_keys.insert(label.to_string(), key);
        key
    }

    /// Register an acronym, returning the value that references it
    pub fn add_acronym(&mut self, name: &str) -> f64 {
        self.acronyms.push(name.to_string());
        acronym_value(self.acronyms.len() as u32)
    }

    pub fn add_symbol(
        &mut self,
        name: &str,
        kind: SymbolKind,
        domains: &[&str],
        text: &str,
    ) -> ConnectorResult<SymbolNr> {
        if self.symbols.iter().any(|s| s.name.eq_ignore_ascii_case(name)) {
            return Err(ConnectorError::internal(format!("duplicate symbol {}", name)));
        }
        self.symbols.push(PendingSymbol {
            name: name.to_string(),
            kind,
            domains: domains.iter().map(|d| d.to_string()).collect(),
            text: text.to_string(),
            records: Vec::new(),
        });
        Ok(self.symbols.len() - 1)
    }

    /// Add a set element with optional element text
    pub fn add_set_element(
        &mut self,
        nr: SymbolNr,
        labels: &[&str],
        text: Option<&str>,
    ) -> ConnectorResult<()> {
        let text_index = match text {
            Some(text) => {
                self.texts.push(text.to_string());
                self.texts.len() as f64
            }
            None => 0.0,
        };
        let mut values = [0.0; VALUE_SLOTS];
        values[ValueSlot::Level.index()] = text_index;
        self.push_record(nr, SymbolKind::Set, labels, values)
    }

    /// Add a parameter record
    pub fn add_value(&mut self, nr: SymbolNr, labels: &[&str], value: f64) -> ConnectorResult<()> {
        let mut values = [0.0; VALUE_SLOTS];
        values[ValueSlot::Level.index()] = value;
        self.push_record(nr, SymbolKind::Parameter, labels, values)
    }

    /// Add a variable or equation record
    pub fn add_values(
        &mut self,
        nr: SymbolNr,
        labels: &[&str],
        values: [f64; VALUE_SLOTS],
    ) -> ConnectorResult<()> {
        let kind = self.pending(nr)?.kind;
        if !matches!(kind, SymbolKind::Variable | SymbolKind::Equation) {
            return Err(ConnectorError::internal(format!(
                "symbol {} is a {}, not a variable or equation",
                self.symbols[nr].name, kind
            )));
        }
        self.push_record(nr, kind, labels, values)
    }

    fn pending(&self, nr: SymbolNr) -> ConnectorResult<&PendingSymbol> {
        self.symbols
            .get(nr)
            .ok_or_else(|| ConnectorError::internal(format!("symbol number {} out of range", nr)))
    }

    fn push_record(
        &mut self,
        nr: SymbolNr,
        expected: SymbolKind,
        labels: &[&str],
        values: [f64; VALUE_SLOTS],
    ) -> ConnectorResult<()> {
        let pending = self.pending(nr)?;
        if pending.kind != expected {
            return Err(ConnectorError::internal(format!(
                "symbol {} is a {}, not a {}",
                pending.name, pending.kind, expected
            )));
        }
        if pending.domains.len() != labels.len() {
            return Err(ConnectorError::internal(format!(
                "symbol {} has {} dimensions, got {} labels",
                pending.name,
                pending.domains.len(),
                labels.len()
            )));
        }

        let keys = labels.iter().map(|l| self.add_uel(l)).collect();
        let values = values.map(normalize);
        self.symbols[nr].records.push(RawRecord::new(keys, values));
        Ok(())
    }

    /// Serialize the whole store
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut header = Vec::new();

        put_u32(&mut header, self.uels.len() as u32);
        for uel in &self.uels {
            put_string(&mut header, uel);
        }

        put_u32(&mut header, self.texts.len() as u32);
        for text in &self.texts {
            put_string(&mut header, text);
        }

        put_u32(&mut header, self.acronyms.len() as u32);
        for (i, name) in self.acronyms.iter().enumerate() {
            put_u32(&mut header, i as u32 + 1);
            put_string(&mut header, name);
        }

        put_u32(&mut header, self.symbols.len() as u32);
        let mut offset = 0u64;
        for symbol in &self.symbols {
            put_string(&mut header, &symbol.name);
            header.push(symbol.kind.code());
            put_u32(&mut header, symbol.domains.len() as u32);
            for domain in &symbol.domains {
                put_string(&mut header, domain);
            }
            put_string(&mut header, &symbol.text);
            put_u64(&mut header, symbol.records.len() as u64);
            put_u64(&mut header, offset);
            offset += (symbol.records.len() * record_len(symbol.domains.len())) as u64;
        }

        let mut out = Vec::with_capacity(16 + header.len() + offset as usize);
        out.extend_from_slice(&STORE_MAGIC);
        put_u32(&mut out, STORE_VERSION);
        put_u64(&mut out, header.len() as u64);
        out.extend_from_slice(&header);

        for symbol in &self.symbols {
            for record in &symbol.records {
                for key in &record.keys {
                    out.extend_from_slice(&key.to_le_bytes());
                }
                for value in &record.values {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
        }
        out
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> ConnectorResult<()> {
        let path = path.as_ref();
        fs::write(path, self.to_bytes()).map_err(|e| {
            ConnectorError::storage_io_with_path(
                format!("failed to write store: {}", e),
                path.display().to_string(),
            )
        })
    }
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_string(out: &mut Vec<u8>, s: &str) {
    put_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}
