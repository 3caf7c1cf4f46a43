//! Binary symbol store: read side.
//!
//! ## Layout (little-endian)
//! ```text
//! magic: "SYMS" (4B)
//! version: u32
//! header_len: u64
//! header:
//!   uels:     count u32, string x count           (key k = position + 1)
//!   texts:    count u32, string x count           (text index i = position + 1)
//!   acronyms: count u32, (index u32, string) x count
//!   symbols:  count u32, entry x count
//!     entry:  name string, kind u8, dim u32, domain string x dim,
//!             text string, record_count u64, data_offset u64
//! records (offsets relative to the end of the header):
//!   key i32 x dim, value f64 x 5
//! string: len u32, utf8 bytes
//! ```
//!
//! The header is loaded on open; records are streamed from disk per read.

use super::special::{acronym_index, SpecialValue};
use super::store::{RawRecords, ReaderGuard, ReaderSlot, SymbolStore};
use super::symbol::{RawRecord, Symbol, SymbolKind, SymbolNr, VALUE_SLOTS};
use crate::error::{ConnectorError, ConnectorResult};
use fxhash::FxHashMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic bytes of a store file
pub const STORE_MAGIC: [u8; 4] = *b"SYMS";

/// Current format version
pub const STORE_VERSION: u32 = 1;

/// magic + version + header_len
pub const PREAMBLE_LEN: u64 = 16;

/// Byte size of one record of a `dim`-dimensional symbol
pub fn record_len(dim: usize) -> usize {
    dim * 4 + VALUE_SLOTS * 8
}

/// Store file opened for reading
#[derive(Debug)]
pub struct StoreFile {
    path: PathBuf,
    locator: String,
    uels: Vec<String>,
    texts: Vec<String>,
    acronyms: FxHashMap<u32, String>,
    symbols: Vec<Symbol>,
    /// Absolute file position of each symbol's first record
    record_starts: Vec<u64>,
    reader: ReaderSlot,
}

/// Parsed header contents
#[derive(Debug, Default)]
pub(crate) struct StoreHeader {
    pub uels: Vec<String>,
    pub texts: Vec<String>,
    pub acronyms: Vec<(u32, String)>,
    pub symbols: Vec<Symbol>,
    pub offsets: Vec<u64>,
}

impl StoreFile {
    pub fn open<P: AsRef<Path>>(path: P) -> ConnectorResult<Self> {
        let path = path.as_ref().to_path_buf();
        let locator = path.display().to_string();
        let io_err = |e: io::Error| {
            ConnectorError::storage_io_with_path(format!("failed to open store: {}", e), &locator)
        };

        let mut file = File::open(&path).map_err(io_err)?;
        let file_len = file.metadata().map_err(io_err)?.len();
        let mut preamble = [0u8; PREAMBLE_LEN as usize];
        file.read_exact(&mut preamble).map_err(io_err)?;

        if preamble[0..4] != STORE_MAGIC {
            return Err(ConnectorError::storage_io_with_path("invalid store magic", &locator));
        }
        let version = u32::from_le_bytes(le_bytes(&preamble[4..8]));
        if version != STORE_VERSION {
            return Err(ConnectorError::storage_io_with_path(
                format!("unsupported store version {}", version),
                &locator,
            ));
        }
        let header_len = u64::from_le_bytes(le_bytes(&preamble[8..16]));
        if header_len > file_len.saturating_sub(PREAMBLE_LEN) {
            return Err(ConnectorError::storage_io_with_path(
                format!("store header length {} exceeds file size {}", header_len, file_len),
                &locator,
            ));
        }

        let mut header_bytes = vec![0u8; header_len as usize];
        file.read_exact(&mut header_bytes).map_err(io_err)?;
        let header = parse_header(&header_bytes).map_err(io_err)?;

        let data_start = PREAMBLE_LEN + header_len;
        let record_starts = header
            .symbols
            .iter()
            .zip(&header.offsets)
            .map(|(symbol, &offset)| {
                data_start.checked_add(offset).ok_or_else(|| {
                    ConnectorError::storage_io_with_path(
                        format!("symbol {}: data offset {} out of range", symbol.name, offset),
                        &locator,
                    )
                })
            })
            .collect::<ConnectorResult<Vec<u64>>>()?;

        debug!(
            store = %locator,
            symbols = header.symbols.len(),
            uels = header.uels.len(),
            "Opened symbol store"
        );

        Ok(Self {
            uels: header.uels,
            texts: header.texts,
            acronyms: header.acronyms.into_iter().collect(),
            symbols: header.symbols,
            record_starts,
            reader: ReaderSlot::new(),
            path,
            locator,
        })
    }
}

impl SymbolStore for StoreFile {
    fn locator(&self) -> &str {
        &self.locator
    }

    fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    fn read_raw(&self, nr: SymbolNr) -> ConnectorResult<RawRecords> {
        let symbol = self.symbol_info(nr)?;
        let guard = self.reader.acquire(&self.locator)?;

        let io_err = |e: io::Error| {
            ConnectorError::storage_io_with_path(format!("failed to start read: {}", e), &self.locator)
                .with_context(format!("symbol {}", symbol.name))
        };
        let mut file = File::open(&self.path).map_err(io_err)?;
        file.seek(SeekFrom::Start(self.record_starts[nr])).map_err(io_err)?;

        Ok(Box::new(RecordReader {
            reader: BufReader::new(file),
            dim: symbol.dimension_count(),
            remaining: symbol.record_count,
            locator: self.locator.clone(),
            failed: false,
            _guard: guard,
        }))
    }

    fn uel_label(&self, key: i32) -> Option<&str> {
        if key < 1 {
            return None;
        }
        self.uels.get(key as usize - 1).map(String::as_str)
    }

    fn element_text(&self, index: i32) -> Option<&str> {
        if index < 1 {
            return None;
        }
        self.texts.get(index as usize - 1).map(String::as_str)
    }

    fn acronym_name(&self, raw: f64) -> Option<&str> {
        acronym_index(raw).and_then(|index| self.acronyms.get(&index).map(String::as_str))
    }

    fn map_value(&self, raw: f64) -> SpecialValue {
        SpecialValue::classify(raw)
    }
}

/// Streams the records of one symbol from disk
struct RecordReader {
    reader: BufReader<File>,
    dim: usize,
    remaining: u64,
    locator: String,
    failed: bool,
    _guard: ReaderGuard,
}

impl RecordReader {
    fn read_record(&mut self) -> io::Result<RawRecord> {
        let mut buf = vec![0u8; record_len(self.dim)];
        self.reader.read_exact(&mut buf)?;

        let mut keys = Vec::with_capacity(self.dim);
        for chunk in buf[..self.dim * 4].chunks_exact(4) {
            keys.push(i32::from_le_bytes(le_bytes(chunk)));
        }
        let mut values = [0.0; VALUE_SLOTS];
        for (slot, chunk) in buf[self.dim * 4..].chunks_exact(8).enumerate() {
            values[slot] = f64::from_le_bytes(le_bytes(chunk));
        }
        Ok(RawRecord::new(keys, values))
    }
}

impl Iterator for RecordReader {
    type Item = ConnectorResult<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }
        match self.read_record() {
            Ok(record) => {
                self.remaining -= 1;
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(ConnectorError::storage_io_with_path(
                    format!("failed to read record: {}", e),
                    &self.locator,
                )))
            }
        }
    }
}

/// First `N` bytes as a fixed array; callers slice exactly `N` bytes
fn le_bytes<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Read cursor over the header bytes
struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize, what: &str) -> io::Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(truncated(what));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Item count of a section whose items take at least `min_item_len` bytes each
    fn count(&mut self, what: &str, min_item_len: usize) -> io::Result<usize> {
        let count = self.u32(what)? as usize;
        if count.saturating_mul(min_item_len) > self.remaining() {
            return Err(truncated(what));
        }
        Ok(count)
    }

    fn u8(&mut self, what: &str) -> io::Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u32(&mut self, what: &str) -> io::Result<u32> {
        Ok(u32::from_le_bytes(le_bytes(self.take(4, what)?)))
    }

    fn u64(&mut self, what: &str) -> io::Result<u64> {
        Ok(u64::from_le_bytes(le_bytes(self.take(8, what)?)))
    }

    fn string(&mut self, what: &str) -> io::Result<String> {
        let len = self.u32(what)? as usize;
        let bytes = self.take(len, what)?;
        std::str::from_utf8(bytes).map(str::to_string).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("store header: invalid UTF-8 in {}: {}", what, e),
            )
        })
    }
}

fn truncated(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("store header truncated reading {}", what),
    )
}

pub(crate) fn parse_header(data: &[u8]) -> io::Result<StoreHeader> {
    let mut cursor = ByteCursor::new(data);
    let mut header = StoreHeader::default();

    // every string carries at least its u32 length
    let uel_count = cursor.count("uel count", 4)?;
    for _ in 0..uel_count {
        header.uels.push(cursor.string("uel")?);
    }

    let text_count = cursor.count("text count", 4)?;
    for _ in 0..text_count {
        header.texts.push(cursor.string("element text")?);
    }

    let acronym_count = cursor.count("acronym count", 8)?;
    for _ in 0..acronym_count {
        let index = cursor.u32("acronym index")?;
        header.acronyms.push((index, cursor.string("acronym name")?));
    }

    let symbol_count = cursor.count("symbol count", 29)?;
    for _ in 0..symbol_count {
        let name = cursor.string("symbol name")?;
        let code = cursor.u8("symbol kind")?;
        let kind = SymbolKind::from_code(code).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("symbol {}: unknown kind code {}", name, code),
            )
        })?;
        let dim = cursor.count("dimension", 4)?;
        let mut domains = Vec::with_capacity(dim);
        for _ in 0..dim {
            domains.push(cursor.string("domain name")?);
        }
        let text = cursor.string("symbol text")?;
        let record_count = cursor.u64("record count")?;
        let offset = cursor.u64("data offset")?;

        let mut symbol = Symbol::new(name, kind, domains).with_text(text);
        symbol.record_count = record_count;
        header.symbols.push(symbol);
        header.offsets.push(offset);
    }

    Ok(header)
}
