//! Symbol metadata and raw records as the store hands them out.

use serde::{Deserialize, Serialize};

/// Position of a symbol inside its store
pub type SymbolNr = usize;

/// Number of value slots carried by every raw record
pub const VALUE_SLOTS: usize = 5;

/// Kind of a stored symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Set,
    Parameter,
    Variable,
    Equation,
}

impl SymbolKind {
    /// On-disk code of the kind
    pub fn code(self) -> u8 {
        match self {
            SymbolKind::Set => 0,
            SymbolKind::Parameter => 1,
            SymbolKind::Variable => 2,
            SymbolKind::Equation => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SymbolKind::Set),
            1 => Some(SymbolKind::Parameter),
            2 => Some(SymbolKind::Variable),
            3 => Some(SymbolKind::Equation),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SymbolKind::Set => "Set",
            SymbolKind::Parameter => "Parameter",
            SymbolKind::Variable => "Variable",
            SymbolKind::Equation => "Equation",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One value slot of a variable or equation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSlot {
    Level,
    Marginal,
    Lower,
    Upper,
    Scale,
}

impl ValueSlot {
    pub const ALL: [ValueSlot; VALUE_SLOTS] = [
        ValueSlot::Level,
        ValueSlot::Marginal,
        ValueSlot::Lower,
        ValueSlot::Upper,
        ValueSlot::Scale,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Column label used for this slot
    pub fn label(self) -> &'static str {
        match self {
            ValueSlot::Level => "Level",
            ValueSlot::Marginal => "Marginal",
            ValueSlot::Lower => "Lower",
            ValueSlot::Upper => "Upper",
            ValueSlot::Scale => "Scale",
        }
    }
}

/// A symbol as described by the store header. Immutable once read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// One entry per dimension, `*` for the universe
    pub domain_names: Vec<String>,
    /// Explanatory text
    pub text: String,
    pub record_count: u64,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, domain_names: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            domain_names,
            text: String::new(),
            record_count: 0,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn dimension_count(&self) -> usize {
        self.domain_names.len()
    }

    /// A parameter with explanatory text; only scalars expose it as a column
    pub fn has_scalar_text(&self) -> bool {
        self.kind == SymbolKind::Parameter && !self.text.is_empty()
    }
}

/// Undecoded record: one UEL key per dimension plus the value slots
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub keys: Vec<i32>,
    pub values: [f64; VALUE_SLOTS],
}

impl RawRecord {
    pub fn new(keys: Vec<i32>, values: [f64; VALUE_SLOTS]) -> Self {
        Self { keys, values }
    }

    pub fn value(&self, slot: ValueSlot) -> f64 {
        self.values[slot.index()]
    }
}
